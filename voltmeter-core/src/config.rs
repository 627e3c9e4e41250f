//! Board configuration for the bench supply voltmeter.
//!
//! The constants describe the default wiring: a 3.265 V external reference on
//! AREF, a 100.50 kΩ / 8.21 kΩ input divider on channel A0, and a /64 ADC
//! clock (16 MHz / 64 = 250 kHz). [`VoltmeterConfig`] bundles them into a
//! value that targets can adjust with `const` builders before handing it to
//! the sampler and converter.

use core::{fmt, time::Duration};

use crate::converter::{DividerRatio, OffsetMode, RoundingMode, Scaling, StepConvention};
use crate::sampler::{Channel, ReferenceMode};

/// Voltage on the AREF pin. Set 1.10 or 2.56 to select the internal reference.
pub const REFERENCE_VOLTAGE: f32 = 3.265;

/// Internal reference levels offered by the supported parts.
pub const INTERNAL_REFERENCE_LEVELS: [f32; 2] = [1.10, 2.56];

/// ADC clock division factor.
pub const ADC_PRESCALE: u16 = 64;

/// Native converter resolution.
pub const BASE_RESOLUTION_BITS: u8 = 10;

/// Oversampling depth used by the default voltage readings.
pub const EXTRA_RESOLUTION_BITS: u8 = 4;

/// Upper bound on oversampling depth; 1023 × 4096 still fits a `u32`.
pub const MAX_EXTRA_BITS: u8 = 6;

/// Divider top resistor in kΩ. Keeps input current under 1 mA at 30 V.
pub const R1_DIVIDER_KOHM: f32 = 100.50;

/// Divider bottom resistor in kΩ. The ADC wants source impedance under 10 kΩ.
pub const R2_DIVIDER_KOHM: f32 = 8.21;

/// Analog input wired to the divider (A0).
pub const VOLTMETER_CHANNEL: Channel = 0;

/// Calibration offset for single-sample readings, in volts.
pub const VOLTMETER_ERROR: f32 = 0.021;

/// Calibration offset for oversampled readings, in volts.
pub const OVERSAMPLED_VOLTMETER_ERROR: f32 = 0.001;

/// Settling wait after the throwaway conversion. Zero skips the wait.
pub const DEFAULT_SETTLING_TIME: Duration = Duration::ZERO;

/// Reasons a [`VoltmeterConfig`] is rejected at startup.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Reference voltage is zero, negative, or not finite.
    InvalidReferenceVoltage,
    /// A divider resistor is zero, negative, or not finite.
    InvalidDividerResistor,
    /// A calibration offset is not finite.
    InvalidCalibrationOffset,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidReferenceVoltage => {
                f.write_str("reference voltage must be positive and finite")
            }
            ConfigError::InvalidDividerResistor => {
                f.write_str("divider resistors must be positive and finite")
            }
            ConfigError::InvalidCalibrationOffset => {
                f.write_str("calibration offsets must be finite")
            }
        }
    }
}

impl core::error::Error for ConfigError {}

/// Complete voltmeter configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoltmeterConfig {
    pub reference_voltage: f32,
    /// Forces a reference mode instead of deriving it from the voltage.
    pub reference_override: Option<ReferenceMode>,
    /// Requested clock division factor; unsupported values fall back to 128.
    pub clock_divider: u16,
    /// Requested oversampling depth; values above 6 are clamped.
    pub extra_bits: u8,
    pub divider_r1_kohm: f32,
    pub divider_r2_kohm: f32,
    pub channel: Channel,
    pub settling_time: Duration,
    pub rounding: RoundingMode,
    pub offset_mode: OffsetMode,
    pub calibration_offset: f32,
    pub oversampled_calibration_offset: f32,
    pub step_convention: StepConvention,
}

impl VoltmeterConfig {
    /// Board defaults.
    pub const DEFAULT: VoltmeterConfig = VoltmeterConfig {
        reference_voltage: REFERENCE_VOLTAGE,
        reference_override: None,
        clock_divider: ADC_PRESCALE,
        extra_bits: EXTRA_RESOLUTION_BITS,
        divider_r1_kohm: R1_DIVIDER_KOHM,
        divider_r2_kohm: R2_DIVIDER_KOHM,
        channel: VOLTMETER_CHANNEL,
        settling_time: DEFAULT_SETTLING_TIME,
        rounding: RoundingMode::Truncate,
        offset_mode: OffsetMode::Disabled,
        calibration_offset: VOLTMETER_ERROR,
        oversampled_calibration_offset: OVERSAMPLED_VOLTMETER_ERROR,
        step_convention: StepConvention::FullScaleMinusOne,
    };

    #[must_use]
    pub const fn with_reference_voltage(mut self, volts: f32) -> Self {
        self.reference_voltage = volts;
        self
    }

    #[must_use]
    pub const fn with_reference_override(mut self, mode: ReferenceMode) -> Self {
        self.reference_override = Some(mode);
        self
    }

    #[must_use]
    pub const fn with_clock_divider(mut self, factor: u16) -> Self {
        self.clock_divider = factor;
        self
    }

    #[must_use]
    pub const fn with_extra_bits(mut self, bits: u8) -> Self {
        self.extra_bits = bits;
        self
    }

    #[must_use]
    pub const fn with_divider_resistors(mut self, r1_kohm: f32, r2_kohm: f32) -> Self {
        self.divider_r1_kohm = r1_kohm;
        self.divider_r2_kohm = r2_kohm;
        self
    }

    #[must_use]
    pub const fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub const fn with_settling_time(mut self, settling_time: Duration) -> Self {
        self.settling_time = settling_time;
        self
    }

    #[must_use]
    pub const fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Selects whether calibration offsets are subtracted, and their values.
    #[must_use]
    pub const fn with_offset_mode(
        mut self,
        mode: OffsetMode,
        base_volts: f32,
        oversampled_volts: f32,
    ) -> Self {
        self.offset_mode = mode;
        self.calibration_offset = base_volts;
        self.oversampled_calibration_offset = oversampled_volts;
        self
    }

    #[must_use]
    pub const fn with_step_convention(mut self, convention: StepConvention) -> Self {
        self.step_convention = convention;
        self
    }

    /// Reference mode written during initialization.
    #[must_use]
    pub fn reference_mode(&self) -> ReferenceMode {
        self.reference_override
            .unwrap_or_else(|| ReferenceMode::for_voltage(self.reference_voltage))
    }

    /// Default divider ratio `R2 / (R1 + R2)`.
    #[must_use]
    pub const fn divider_ratio(&self) -> DividerRatio {
        DividerRatio::from_resistors(self.divider_r1_kohm, self.divider_r2_kohm)
    }

    /// Scaling parameters used by the voltage converter.
    #[must_use]
    pub const fn scaling(&self) -> Scaling {
        Scaling {
            reference_voltage: self.reference_voltage,
            convention: self.step_convention,
            rounding: self.rounding,
            offset_mode: self.offset_mode,
            base_offset: self.calibration_offset,
            oversampled_offset: self.oversampled_calibration_offset,
        }
    }

    /// Checks the values that would make every reading meaningless.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.reference_voltage) {
            return Err(ConfigError::InvalidReferenceVoltage);
        }
        if !is_positive(self.divider_r1_kohm) || !is_positive(self.divider_r2_kohm) {
            return Err(ConfigError::InvalidDividerResistor);
        }
        if !self.calibration_offset.is_finite() || !self.oversampled_calibration_offset.is_finite()
        {
            return Err(ConfigError::InvalidCalibrationOffset);
        }
        Ok(())
    }
}

impl Default for VoltmeterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(VoltmeterConfig::DEFAULT.validate(), Ok(()));
        assert_eq!(
            VoltmeterConfig::DEFAULT.reference_mode(),
            ReferenceMode::External
        );
    }

    #[test]
    fn internal_reference_voltage_selects_internal_mode() {
        let config = VoltmeterConfig::DEFAULT.with_reference_voltage(1.10);
        assert_eq!(config.reference_mode(), ReferenceMode::Internal);
    }

    #[test]
    fn reference_override_wins() {
        let config =
            VoltmeterConfig::DEFAULT.with_reference_override(ReferenceMode::Default);
        assert_eq!(config.reference_mode(), ReferenceMode::Default);
    }

    #[test]
    fn validate_rejects_bad_reference() {
        for volts in [0.0, -3.3, f32::NAN, f32::INFINITY] {
            let config = VoltmeterConfig::DEFAULT.with_reference_voltage(volts);
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidReferenceVoltage)
            );
        }
    }

    #[test]
    fn validate_rejects_bad_resistors() {
        let config = VoltmeterConfig::DEFAULT.with_divider_resistors(100.5, 0.0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidDividerResistor));

        let config = VoltmeterConfig::DEFAULT.with_divider_resistors(-1.0, 8.21);
        assert_eq!(config.validate(), Err(ConfigError::InvalidDividerResistor));
    }

    #[test]
    fn validate_rejects_non_finite_offset() {
        let config =
            VoltmeterConfig::DEFAULT.with_offset_mode(OffsetMode::Subtract, f32::NAN, 0.001);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCalibrationOffset)
        );
    }

    #[test]
    fn default_divider_ratio_matches_resistors() {
        let ratio = VoltmeterConfig::DEFAULT.divider_ratio().get();
        let expected = 8.21 / (100.50 + 8.21);
        let delta = ratio - expected;
        assert!(delta < 1e-6 && delta > -1e-6, "ratio {ratio}");
        assert!(ratio > 0.0 && ratio < 1.0);
    }
}

//! Code-to-voltage conversion for a resistive input divider.
//!
//! A reading is scaled as
//!
//! ```text
//! volts = (code + rounding) * step(resolution) / ratio - offset
//! ```
//!
//! where `step` is the reference voltage divided by the code span of the
//! resolution in use. Half-LSB rounding and calibration offset subtraction are
//! independent switches on [`Scaling`]; both default to off.

use crate::config::{BASE_RESOLUTION_BITS, VoltmeterConfig};
use crate::sampler::{AdcPlatform, AdcSampler, Channel, ExtraBits, SamplerConfig};

/// Attenuation `R2 / (R1 + R2)` of the input divider.
///
/// Physically valid dividers satisfy `0 < ratio < 1`. The converter does not
/// check this; a bad ratio yields a meaningless voltage.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct DividerRatio(f32);

impl DividerRatio {
    /// No attenuation; the ADC pin sees the measured voltage directly.
    pub const UNITY: DividerRatio = DividerRatio(1.0);

    #[must_use]
    pub const fn new(ratio: f32) -> Self {
        Self(ratio)
    }

    /// Ratio of a two-resistor divider. Units only need to match.
    #[must_use]
    pub const fn from_resistors(r1: f32, r2: f32) -> Self {
        Self(r2 / (r1 + r2))
    }

    #[must_use]
    pub const fn get(self) -> f32 {
        self.0
    }
}

/// Denominator used when computing the voltage of one code step.
///
/// The two conventions differ by roughly 0.1 % at 10 bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepConvention {
    /// `reference / (2^bits - 1)`: the top code reads exactly the reference.
    FullScaleMinusOne,
    /// `reference / 2^bits`: each code is one bin of width `reference / 2^bits`.
    FullScale,
}

impl StepConvention {
    /// Number of steps spanning the reference at `resolution_bits`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub const fn divisor(self, resolution_bits: u8) -> f32 {
        let span = (1u32 << resolution_bits) as f32;
        match self {
            StepConvention::FullScaleMinusOne => span - 1.0,
            StepConvention::FullScale => span,
        }
    }
}

/// Whether a half LSB is added before scaling.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoundingMode {
    /// Scale the code as-is (lower edge of the code bin).
    Truncate,
    /// Scale `code + 0.5` (centre of the code bin).
    HalfLsb,
}

/// Whether the calibration offset is subtracted from the scaled voltage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffsetMode {
    Disabled,
    Subtract,
}

/// Voltage of one code step for `reference` at `resolution_bits`.
#[must_use]
pub const fn voltage_step(reference: f32, resolution_bits: u8, convention: StepConvention) -> f32 {
    reference / convention.divisor(resolution_bits)
}

/// Which sampler path produced a reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadingKind {
    Raw,
    Oversampled,
}

impl ReadingKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ReadingKind::Raw => "raw",
            ReadingKind::Oversampled => "oversampled",
        }
    }
}

/// A code together with the voltage it scales to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reading {
    pub kind: ReadingKind,
    pub channel: Channel,
    pub code: u32,
    pub resolution_bits: u8,
    pub volts: f32,
}

/// Fixed linear transform from code to volts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scaling {
    pub reference_voltage: f32,
    pub convention: StepConvention,
    pub rounding: RoundingMode,
    pub offset_mode: OffsetMode,
    /// Offset subtracted from single-sample readings.
    pub base_offset: f32,
    /// Offset subtracted from oversampled readings.
    pub oversampled_offset: f32,
}

impl Scaling {
    /// Voltage of one step at the base resolution.
    #[must_use]
    pub const fn base_step(&self) -> f32 {
        voltage_step(self.reference_voltage, BASE_RESOLUTION_BITS, self.convention)
    }

    /// Voltage of one step at the oversampled resolution.
    #[must_use]
    pub const fn oversampled_step(&self, extra: ExtraBits) -> f32 {
        voltage_step(
            self.reference_voltage,
            extra.resolution_bits(),
            self.convention,
        )
    }

    /// Scales a base-resolution code.
    #[must_use]
    pub fn base_volts(&self, code: u16, ratio: DividerRatio) -> f32 {
        self.scale(
            f32::from(code),
            self.base_step(),
            ratio,
            self.base_offset,
        )
    }

    /// Scales a code produced with `extra` bits of oversampling.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn oversampled_volts(&self, code: u32, extra: ExtraBits, ratio: DividerRatio) -> f32 {
        // Codes stay below 2^16, well inside f32's exact integer range.
        self.scale(
            code as f32,
            self.oversampled_step(extra),
            ratio,
            self.oversampled_offset,
        )
    }

    fn scale(&self, code: f32, step: f32, ratio: DividerRatio, offset: f32) -> f32 {
        let code = match self.rounding {
            RoundingMode::Truncate => code,
            RoundingMode::HalfLsb => code + 0.5,
        };
        let volts = code * step / ratio.get();
        match self.offset_mode {
            OffsetMode::Disabled => volts,
            OffsetMode::Subtract => volts - offset,
        }
    }
}

impl Default for Scaling {
    fn default() -> Self {
        VoltmeterConfig::DEFAULT.scaling()
    }
}

/// Reads the divider input through an [`AdcSampler`] and scales it to volts.
pub struct VoltageConverter<P> {
    sampler: AdcSampler<P>,
    scaling: Scaling,
    default_channel: Channel,
    default_ratio: DividerRatio,
}

impl<P> VoltageConverter<P>
where
    P: AdcPlatform,
{
    /// Builds the sampler and converter for `platform` from `config`.
    ///
    /// The sampler is not initialized; call [`VoltageConverter::initialize`].
    pub fn new(platform: P, config: &VoltmeterConfig) -> Self {
        let sampler = AdcSampler::new(platform, SamplerConfig::from_config(config));
        Self::from_sampler(sampler, config)
    }

    /// Wraps an existing sampler, taking scaling and defaults from `config`.
    pub fn from_sampler(sampler: AdcSampler<P>, config: &VoltmeterConfig) -> Self {
        Self {
            sampler,
            scaling: config.scaling(),
            default_channel: config.channel,
            default_ratio: config.divider_ratio(),
        }
    }

    /// Initializes the underlying sampler.
    pub fn initialize(&mut self) {
        self.sampler.initialize();
    }

    /// Reads a single settled sample and scales it.
    pub fn read_voltage(&mut self, channel: Channel, ratio: DividerRatio) -> f32 {
        self.read(channel, ReadingKind::Raw, ratio).volts
    }

    /// [`VoltageConverter::read_voltage`] on the configured channel and divider.
    pub fn read_voltage_default(&mut self) -> f32 {
        self.read_voltage(self.default_channel, self.default_ratio)
    }

    /// Reads an oversampled code at the configured depth and scales it.
    ///
    /// Costs `4^extra_bits` conversions instead of two.
    pub fn read_oversampling_voltage(&mut self, channel: Channel, ratio: DividerRatio) -> f32 {
        self.read(channel, ReadingKind::Oversampled, ratio).volts
    }

    /// [`VoltageConverter::read_oversampling_voltage`] on the configured
    /// channel and divider.
    pub fn read_oversampling_voltage_default(&mut self) -> f32 {
        self.read_oversampling_voltage(self.default_channel, self.default_ratio)
    }

    /// Takes a reading and returns the code alongside the voltage.
    pub fn read(&mut self, channel: Channel, kind: ReadingKind, ratio: DividerRatio) -> Reading {
        match kind {
            ReadingKind::Raw => {
                let code = self.sampler.read_raw(channel);
                Reading {
                    kind,
                    channel,
                    code: u32::from(code),
                    resolution_bits: BASE_RESOLUTION_BITS,
                    volts: self.scaling.base_volts(code, ratio),
                }
            }
            ReadingKind::Oversampled => {
                let extra = self.sampler.config().extra_bits;
                let code = self.sampler.read_oversampled(channel, extra.get());
                Reading {
                    kind,
                    channel,
                    code,
                    resolution_bits: extra.resolution_bits(),
                    volts: self.scaling.oversampled_volts(code, extra, ratio),
                }
            }
        }
    }

    pub const fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    pub const fn default_channel(&self) -> Channel {
        self.default_channel
    }

    pub const fn default_ratio(&self) -> DividerRatio {
        self.default_ratio
    }

    pub const fn sampler(&self) -> &AdcSampler<P> {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut AdcSampler<P> {
        &mut self.sampler
    }

    /// Consumes the converter and returns the sampler.
    pub fn into_sampler(self) -> AdcSampler<P> {
        self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f32, expected: f32, tolerance: f32) -> bool {
        let delta = actual - expected;
        delta < tolerance && delta > -tolerance
    }

    fn scaling(reference: f32) -> Scaling {
        VoltmeterConfig::DEFAULT
            .with_reference_voltage(reference)
            .scaling()
    }

    #[test]
    fn base_step_uses_full_scale_minus_one_by_default() {
        let step = scaling(3.3).base_step();
        assert!(close(step, 3.3 / 1023.0, 1e-9), "step {step}");
        assert!(close(step, 0.003_226, 1e-6));
    }

    #[test]
    fn full_scale_convention_divides_by_power_of_two() {
        let step = voltage_step(3.3, 10, StepConvention::FullScale);
        assert!(close(step, 3.3 / 1024.0, 1e-9));
        let step = voltage_step(3.3, 14, StepConvention::FullScale);
        assert!(close(step, 3.3 / 16_384.0, 1e-9));
    }

    #[test]
    fn code_512_through_bench_divider() {
        let scaling = scaling(3.3);
        let base = scaling.base_volts(512, DividerRatio::UNITY);
        assert!(close(base, 1.6516, 1e-3), "base {base}");

        let ratio = DividerRatio::from_resistors(100.50, 8.21);
        assert!(close(ratio.get(), 0.075_52, 1e-4));
        let volts = scaling.base_volts(512, ratio);
        assert!(close(volts, 21.87, 0.01), "volts {volts}");
    }

    #[test]
    fn half_lsb_rounding_shifts_by_half_a_step() {
        let plain = scaling(3.3);
        let rounded = VoltmeterConfig::DEFAULT
            .with_reference_voltage(3.3)
            .with_rounding(RoundingMode::HalfLsb)
            .scaling();

        let delta = rounded.base_volts(100, DividerRatio::UNITY)
            - plain.base_volts(100, DividerRatio::UNITY);
        assert!(close(delta, plain.base_step() / 2.0, 1e-7));
    }

    #[test]
    fn offset_subtraction_is_independent_of_rounding() {
        let scaling = VoltmeterConfig::DEFAULT
            .with_offset_mode(OffsetMode::Subtract, 0.021, 0.001)
            .scaling();
        assert!(close(scaling.base_volts(0, DividerRatio::UNITY), -0.021, 1e-7));
        assert!(close(
            scaling.oversampled_volts(0, ExtraBits::clamped(4), DividerRatio::UNITY),
            -0.001,
            1e-7
        ));
    }

    #[test]
    fn oversampled_full_scale_reads_reference() {
        let scaling = scaling(3.3);
        let extra = ExtraBits::clamped(4);
        let volts = scaling.oversampled_volts(extra.max_code(), extra, DividerRatio::UNITY);
        assert!(close(volts, 3.3, 1e-5), "volts {volts}");
    }
}

//! ADC sampling shared between firmware and host targets.
//!
//! [`AdcSampler`] configures the converter once and then produces raw or
//! oversampled codes on demand. Register access stays behind [`AdcPlatform`]
//! so each board supplies its own implementation while the discard,
//! accumulate and decimate logic below is written once.
//!
//! Every read begins with a throwaway conversion. When the multiplexer moves
//! to a new channel the sample-and-hold capacitor needs time to charge, and
//! with source impedances above roughly 10 kΩ the first result after a switch
//! is unreliable.

use core::time::Duration;

mod settings;

pub use settings::{ClockDivider, ExtraBits, ReferenceMode};

use crate::config::{BASE_RESOLUTION_BITS, VoltmeterConfig};

/// Logical analog input index. Range checking belongs to the platform.
pub type Channel = u8;

/// Largest code the base converter can produce.
pub const MAX_RAW_CODE: u16 = (1 << BASE_RESOLUTION_BITS) - 1;

/// Abstraction over the converter hardware of a specific MCU.
///
/// Implementations perform blocking conversions; there is no
/// conversion-complete interrupt path.
pub trait AdcPlatform {
    /// Selects the voltage reference feeding the converter.
    fn select_reference(&mut self, mode: ReferenceMode);

    /// Programs the converter clock prescaler.
    fn set_clock_divider(&mut self, divider: ClockDivider);

    /// Runs one conversion on `channel` and returns the right-aligned code.
    fn convert(&mut self, channel: Channel) -> u16;

    /// Waits for the sample-and-hold capacitor to settle after a channel
    /// switch. The sampler skips the call when no settling time is configured.
    fn settle(&mut self, duration: Duration);
}

impl<T> AdcPlatform for &mut T
where
    T: AdcPlatform + ?Sized,
{
    fn select_reference(&mut self, mode: ReferenceMode) {
        (**self).select_reference(mode);
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        (**self).set_clock_divider(divider);
    }

    fn convert(&mut self, channel: Channel) -> u16 {
        (**self).convert(channel)
    }

    fn settle(&mut self, duration: Duration) {
        (**self).settle(duration);
    }
}

/// Settings written to the converter by [`AdcSampler::initialize`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    pub reference: ReferenceMode,
    pub clock_divider: ClockDivider,
    /// Requested divider factor before fallback, kept for diagnostics.
    pub requested_divider: u16,
    pub extra_bits: ExtraBits,
    pub settling_time: Duration,
}

impl SamplerConfig {
    /// Resolves the sampler settings from the board configuration.
    #[must_use]
    pub fn from_config(config: &VoltmeterConfig) -> Self {
        Self {
            reference: config.reference_mode(),
            clock_divider: ClockDivider::from_factor(config.clock_divider),
            requested_divider: config.clock_divider,
            extra_bits: ExtraBits::clamped(config.extra_bits),
            settling_time: config.settling_time,
        }
    }

    /// Returns `true` when the requested divider was not supported.
    #[must_use]
    pub const fn divider_fell_back(&self) -> bool {
        ClockDivider::try_from_factor(self.requested_divider).is_none()
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from_config(&VoltmeterConfig::DEFAULT)
    }
}

/// Owns the converter and produces raw or oversampled codes.
pub struct AdcSampler<P> {
    platform: P,
    config: SamplerConfig,
    initialized: bool,
}

impl<P> AdcSampler<P>
where
    P: AdcPlatform,
{
    /// Wraps `platform`. Call [`AdcSampler::initialize`] before reading.
    pub const fn new(platform: P, config: SamplerConfig) -> Self {
        Self {
            platform,
            config,
            initialized: false,
        }
    }

    /// Selects the reference and programs the clock divider.
    ///
    /// Safe to call more than once; each call writes the same settings again.
    pub fn initialize(&mut self) {
        let SamplerConfig {
            reference,
            clock_divider,
            requested_divider,
            ..
        } = self.config;

        if reference == ReferenceMode::Internal {
            warn!(
                "adc: internal reference selected; AREF must not be driven above the internal level"
            );
        }
        self.platform.select_reference(reference);

        if self.config.divider_fell_back() {
            warn!(
                "adc: clock divider {} unsupported, using {}",
                requested_divider,
                clock_divider.factor()
            );
        }
        self.platform.set_clock_divider(clock_divider);

        self.initialized = true;
        info!(
            "adc: reference={} divider={} extra-bits={}",
            reference.label(),
            clock_divider.factor(),
            self.config.extra_bits.get()
        );
    }

    /// Reads one code from `channel` after discarding a settling conversion.
    ///
    /// Always issues exactly two conversions.
    pub fn read_raw(&mut self, channel: Channel) -> u16 {
        self.discard_and_settle(channel);
        self.convert(channel)
    }

    /// Reads an oversampled code with `extra_bits` of additional resolution.
    ///
    /// `extra_bits` is clamped to [`ExtraBits::MAX`]. Issues `4^extra_bits`
    /// conversions: one discarded, the rest summed and shifted right by
    /// `extra_bits`. With zero extra bits the single conversion is returned
    /// as-is rather than thrown away.
    pub fn read_oversampled(&mut self, channel: Channel, extra_bits: u8) -> u32 {
        let extra = ExtraBits::clamped(extra_bits);
        if extra_bits > extra.get() {
            debug!("adc: extra bits {} clamped to {}", extra_bits, extra.get());
        }

        if extra == ExtraBits::NONE {
            return u32::from(self.convert(channel));
        }

        self.discard_and_settle(channel);

        let mut sum: u32 = 0;
        for _ in 1..extra.sample_count() {
            sum += u32::from(self.convert(channel));
        }

        let code = sum >> extra.get();
        trace!(
            "adc: ch{} oversampled {} samples -> {}",
            channel,
            extra.sample_count(),
            code
        );
        code
    }

    /// Oversampled read using the configured extra resolution.
    pub fn read_oversampled_default(&mut self, channel: Channel) -> u32 {
        self.read_oversampled(channel, self.config.extra_bits.get())
    }

    /// Returns `true` once [`AdcSampler::initialize`] has run.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Active sampler configuration.
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Borrow the underlying platform.
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutably borrow the underlying platform.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Consumes the sampler and returns the platform.
    pub fn release(self) -> P {
        self.platform
    }

    fn discard_and_settle(&mut self, channel: Channel) {
        let _ = self.platform.convert(channel);
        if !self.config.settling_time.is_zero() {
            self.platform.settle(self.config.settling_time);
        }
    }

    fn convert(&mut self, channel: Channel) -> u16 {
        self.platform.convert(channel).min(MAX_RAW_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_factor_accepts_every_supported_divider() {
        for divider in ClockDivider::ALL {
            assert_eq!(ClockDivider::from_factor(divider.factor()), divider);
        }
    }

    #[test]
    fn from_factor_falls_back_to_slowest_divider() {
        for factor in [0, 1, 3, 5, 63, 100, 127, 129, 256, u16::MAX] {
            assert_eq!(ClockDivider::from_factor(factor), ClockDivider::Div128);
            assert_eq!(ClockDivider::from_factor(factor).prescaler_bits(), 0b111);
        }
    }

    #[test]
    fn prescaler_bits_follow_register_table() {
        let expected = [0b001, 0b010, 0b011, 0b100, 0b101, 0b110, 0b111];
        for (divider, bits) in ClockDivider::ALL.iter().zip(expected) {
            assert_eq!(divider.prescaler_bits(), bits, "{divider:?}");
        }
    }

    #[test]
    fn extra_bits_are_clamped_to_six() {
        assert_eq!(ExtraBits::clamped(4).get(), 4);
        assert_eq!(ExtraBits::clamped(6).get(), 6);
        assert_eq!(ExtraBits::clamped(7).get(), 6);
        assert_eq!(ExtraBits::clamped(u8::MAX), ExtraBits::MAX);
    }

    #[test]
    fn extra_bits_sample_count_is_power_of_four() {
        assert_eq!(ExtraBits::clamped(0).sample_count(), 1);
        assert_eq!(ExtraBits::clamped(1).sample_count(), 4);
        assert_eq!(ExtraBits::clamped(4).sample_count(), 256);
        assert_eq!(ExtraBits::MAX.sample_count(), 4096);
        assert_eq!(ExtraBits::clamped(4).max_code(), 16_383);
    }

    #[test]
    fn worst_case_accumulator_fits_in_u32() {
        let worst = u64::from(MAX_RAW_CODE) * u64::from(ExtraBits::MAX.sample_count());
        assert_eq!(worst, 4_190_208);
        assert!(worst < u64::from(u32::MAX));
    }

    #[test]
    fn reference_mode_matches_internal_levels() {
        assert_eq!(ReferenceMode::for_voltage(1.10), ReferenceMode::Internal);
        assert_eq!(ReferenceMode::for_voltage(2.56), ReferenceMode::Internal);
        assert_eq!(ReferenceMode::for_voltage(3.265), ReferenceMode::External);
        assert_eq!(ReferenceMode::for_voltage(5.0), ReferenceMode::External);
    }

    #[test]
    fn sampler_config_records_divider_fallback() {
        let config = VoltmeterConfig::DEFAULT.with_clock_divider(100);
        let sampler = SamplerConfig::from_config(&config);
        assert_eq!(sampler.clock_divider, ClockDivider::Div128);
        assert!(sampler.divider_fell_back());

        let sampler = SamplerConfig::from_config(&VoltmeterConfig::DEFAULT);
        assert_eq!(sampler.clock_divider, ClockDivider::Div64);
        assert!(!sampler.divider_fell_back());
    }
}

//! Host stand-in for the converter hardware.
//!
//! [`SimulatedAdc`] models an ideal 10-bit converter sampling
//! `input_volts * divider_ratio` against the configured reference, with
//! optional uniform dither of a few LSB. It counts conversions and remembers
//! what the sampler programmed so sessions and tests can report on it.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use voltmeter_core::sampler::{AdcPlatform, Channel, ClockDivider, MAX_RAW_CODE, ReferenceMode};

/// Analog inputs on the simulated part.
pub const CHANNEL_COUNT: usize = 8;

/// Bench wiring the simulated converter sees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchSetup {
    pub reference_voltage: f32,
    /// Attenuation between the bench terminals and every ADC pin.
    pub divider_ratio: f32,
    /// Peak uniform noise added to each conversion, in LSB.
    pub noise_lsb: f32,
    pub seed: u64,
}

pub struct SimulatedAdc {
    setup: BenchSetup,
    inputs: [f32; CHANNEL_COUNT],
    rng: SmallRng,
    conversions: u64,
    reference: Option<ReferenceMode>,
    clock_divider: Option<ClockDivider>,
    settled_for: Duration,
}

impl SimulatedAdc {
    pub fn new(setup: BenchSetup) -> Self {
        Self {
            setup,
            inputs: [0.0; CHANNEL_COUNT],
            rng: SmallRng::seed_from_u64(setup.seed),
            conversions: 0,
            reference: None,
            clock_divider: None,
            settled_for: Duration::ZERO,
        }
    }

    /// Applies `volts` to the bench terminal feeding `channel`.
    pub fn set_input(&mut self, channel: Channel, volts: f32) {
        match self.inputs.get_mut(usize::from(channel)) {
            Some(input) => *input = volts,
            None => log::warn!("sim: channel {channel} does not exist"),
        }
    }

    pub fn input(&self, channel: Channel) -> Option<f32> {
        self.inputs.get(usize::from(channel)).copied()
    }

    pub fn setup(&self) -> &BenchSetup {
        &self.setup
    }

    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    pub fn reference(&self) -> Option<ReferenceMode> {
        self.reference
    }

    pub fn clock_divider(&self) -> Option<ClockDivider> {
        self.clock_divider
    }

    /// Total settling time requested so far.
    pub fn settled_for(&self) -> Duration {
        self.settled_for
    }

    /// Noise-free code for `channel`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn ideal_code(&self, channel: Channel) -> u16 {
        let Some(volts) = self.input(channel) else {
            return 0;
        };
        let code = self.fractional_code(volts).round();
        code.clamp(0.0, f32::from(MAX_RAW_CODE)) as u16
    }

    fn fractional_code(&self, volts: f32) -> f32 {
        let pin = volts * self.setup.divider_ratio;
        pin / self.setup.reference_voltage * f32::from(MAX_RAW_CODE)
    }
}

impl AdcPlatform for SimulatedAdc {
    fn select_reference(&mut self, mode: ReferenceMode) {
        log::debug!("sim: reference {mode}");
        self.reference = Some(mode);
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        log::debug!(
            "sim: divider {} (ADPS={:03b})",
            divider.factor(),
            divider.prescaler_bits()
        );
        self.clock_divider = Some(divider);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn convert(&mut self, channel: Channel) -> u16 {
        self.conversions += 1;
        let Some(volts) = self.input(channel) else {
            return 0;
        };

        let mut code = self.fractional_code(volts);
        if self.setup.noise_lsb > 0.0 {
            let noise = self.setup.noise_lsb;
            code += self.rng.gen_range(-noise..=noise);
        }
        code.round().clamp(0.0, f32::from(MAX_RAW_CODE)) as u16
    }

    fn settle(&mut self, duration: Duration) {
        self.settled_for += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench(noise_lsb: f32) -> BenchSetup {
        BenchSetup {
            reference_voltage: 3.3,
            divider_ratio: 8.21 / 108.71,
            noise_lsb,
            seed: 7,
        }
    }

    #[test]
    fn noiseless_conversion_is_ideal() {
        let mut adc = SimulatedAdc::new(bench(0.0));
        adc.set_input(0, 21.87);

        let code = adc.convert(0);
        assert_eq!(code, adc.ideal_code(0));
        assert!((511..=513).contains(&code), "code {code}");
        assert_eq!(adc.conversions(), 1);
    }

    #[test]
    fn inputs_clamp_to_converter_range() {
        let mut adc = SimulatedAdc::new(bench(0.0));
        adc.set_input(0, 100.0);
        adc.set_input(1, -5.0);

        assert_eq!(adc.convert(0), MAX_RAW_CODE);
        assert_eq!(adc.convert(1), 0);
    }

    #[test]
    fn noise_stays_within_bounds() {
        let mut adc = SimulatedAdc::new(bench(2.0));
        adc.set_input(0, 12.0);
        let ideal = i32::from(adc.ideal_code(0));

        for _ in 0..1_000 {
            let code = i32::from(adc.convert(0));
            assert!((code - ideal).abs() <= 3, "code {code} ideal {ideal}");
        }
    }

    #[test]
    fn unknown_channel_reads_zero() {
        let mut adc = SimulatedAdc::new(bench(0.0));
        assert_eq!(adc.convert(42), 0);
        assert_eq!(adc.input(42), None);
    }

    #[test]
    fn records_programmed_settings() {
        let mut adc = SimulatedAdc::new(bench(0.0));
        adc.select_reference(ReferenceMode::External);
        adc.set_clock_divider(ClockDivider::Div64);
        adc.settle(Duration::from_micros(10));
        adc.settle(Duration::from_micros(5));

        assert_eq!(adc.reference(), Some(ReferenceMode::External));
        assert_eq!(adc.clock_divider(), Some(ClockDivider::Div64));
        assert_eq!(adc.settled_for(), Duration::from_micros(15));
    }
}

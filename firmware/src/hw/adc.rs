//! Embassy ADC wrapper implementing the shared sampler platform.

#![cfg(target_os = "none")]

use core::time::Duration;

use embassy_stm32::adc::{Adc, AnyAdcChannel, Resolution, SampleTime};
use embassy_stm32::peripherals::ADC1;
use voltmeter_core::sampler::{AdcPlatform, Channel, ClockDivider, ReferenceMode};

use super::SampleWindow;

/// Number of analog inputs wired on the board (A0, A1).
pub const CHANNEL_COUNT: usize = 2;

/// STM32G0 ADC1 with the board's analog inputs, indexed by [`Channel`].
pub struct G0AdcPlatform<'d> {
    adc: Adc<'d, ADC1>,
    channels: [AnyAdcChannel<ADC1>; CHANNEL_COUNT],
}

impl<'d> G0AdcPlatform<'d> {
    /// Takes the converter and configures it for 10-bit conversions.
    pub fn new(mut adc: Adc<'d, ADC1>, channels: [AnyAdcChannel<ADC1>; CHANNEL_COUNT]) -> Self {
        adc.set_resolution(Resolution::BITS10);
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self { adc, channels }
    }
}

impl AdcPlatform for G0AdcPlatform<'_> {
    fn select_reference(&mut self, mode: ReferenceMode) {
        // VREF+ is strapped to the external reference on this board.
        match mode {
            ReferenceMode::Internal => {
                defmt::warn!("adc: internal reference requested; VREF+ is wired external");
            }
            ReferenceMode::Default | ReferenceMode::External => {
                defmt::debug!("adc: reference {}", mode);
            }
        }
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        let window = SampleWindow::for_divider(divider);
        self.adc.set_sample_time(sample_time(window));
        defmt::debug!(
            "adc: divider {} -> sample window {} tenth-cycles",
            divider.factor(),
            window.tenth_cycles()
        );
    }

    fn convert(&mut self, channel: Channel) -> u16 {
        match self.channels.get_mut(usize::from(channel)) {
            Some(input) => self.adc.blocking_read(input),
            None => {
                defmt::warn!("adc: channel {} is not wired", channel);
                0
            }
        }
    }

    fn settle(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        embassy_time::block_for(embassy_time::Duration::from_micros(micros));
    }
}

const fn sample_time(window: SampleWindow) -> SampleTime {
    match window {
        SampleWindow::Cycles3_5 => SampleTime::CYCLES3_5,
        SampleWindow::Cycles7_5 => SampleTime::CYCLES7_5,
        SampleWindow::Cycles12_5 => SampleTime::CYCLES12_5,
        SampleWindow::Cycles19_5 => SampleTime::CYCLES19_5,
        SampleWindow::Cycles39_5 => SampleTime::CYCLES39_5,
        SampleWindow::Cycles79_5 => SampleTime::CYCLES79_5,
        SampleWindow::Cycles160_5 => SampleTime::CYCLES160_5,
    }
}

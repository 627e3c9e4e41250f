//! Board wiring for the STM32G0 bench voltmeter.
//!
//! The G0 converter has no clock prescaler comparable to the AVR ADPS bits;
//! the closest knob is the sampling window. Each divider step maps to the
//! next longer window so a slower divider still buys settling accuracy.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use voltmeter_core::sampler::ClockDivider;

pub mod adc;

/// Sampling window lengths offered by the G0 ADC, in ADC clock cycles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SampleWindow {
    Cycles3_5,
    Cycles7_5,
    Cycles12_5,
    Cycles19_5,
    Cycles39_5,
    Cycles79_5,
    Cycles160_5,
}

impl SampleWindow {
    /// Window matching the requested divider.
    pub const fn for_divider(divider: ClockDivider) -> Self {
        match divider {
            ClockDivider::Div2 => SampleWindow::Cycles3_5,
            ClockDivider::Div4 => SampleWindow::Cycles7_5,
            ClockDivider::Div8 => SampleWindow::Cycles12_5,
            ClockDivider::Div16 => SampleWindow::Cycles19_5,
            ClockDivider::Div32 => SampleWindow::Cycles39_5,
            ClockDivider::Div64 => SampleWindow::Cycles79_5,
            ClockDivider::Div128 => SampleWindow::Cycles160_5,
        }
    }

    /// Window length in tenths of a cycle.
    pub const fn tenth_cycles(self) -> u16 {
        match self {
            SampleWindow::Cycles3_5 => 35,
            SampleWindow::Cycles7_5 => 75,
            SampleWindow::Cycles12_5 => 125,
            SampleWindow::Cycles19_5 => 195,
            SampleWindow::Cycles39_5 => 395,
            SampleWindow::Cycles79_5 => 795,
            SampleWindow::Cycles160_5 => 1605,
        }
    }
}

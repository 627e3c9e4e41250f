#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use voltmeter_core::sampler::{AdcPlatform, Channel, ClockDivider, ReferenceMode};

/// Every call the sampler made on the platform, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    SelectReference(ReferenceMode),
    SetClockDivider(ClockDivider),
    Convert(Channel),
    Settle(Duration),
}

/// Scripted converter: returns queued codes first, then `steady_code`.
#[derive(Debug, Default)]
pub struct MockPlatform {
    pub script: VecDeque<u16>,
    pub steady_code: u16,
    pub calls: Vec<PlatformCall>,
}

impl MockPlatform {
    pub fn steady(code: u16) -> Self {
        Self {
            steady_code: code,
            ..Self::default()
        }
    }

    pub fn scripted(codes: impl IntoIterator<Item = u16>, steady_code: u16) -> Self {
        Self {
            script: codes.into_iter().collect(),
            steady_code,
            calls: Vec::new(),
        }
    }

    pub fn conversions(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, PlatformCall::Convert(_)))
            .count()
    }

    pub fn settles(&self) -> Vec<Duration> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::Settle(duration) => Some(*duration),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl AdcPlatform for MockPlatform {
    fn select_reference(&mut self, mode: ReferenceMode) {
        self.calls.push(PlatformCall::SelectReference(mode));
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        self.calls.push(PlatformCall::SetClockDivider(divider));
    }

    fn convert(&mut self, channel: Channel) -> u16 {
        self.calls.push(PlatformCall::Convert(channel));
        self.script.pop_front().unwrap_or(self.steady_code)
    }

    fn settle(&mut self, duration: Duration) {
        self.calls.push(PlatformCall::Settle(duration));
    }
}

pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

//! Reading history and logging helpers.
//!
//! Wraps the shared reading ring with an embassy timestamp and mirrors each
//! recorded reading to defmt (or stdout on the host) for bring-up.

#![allow(dead_code)]

use core::time::Duration;

use embassy_time::Instant;
use voltmeter_core::converter::Reading;
use voltmeter_core::telemetry::{ReadingId, ReadingRecord, ReadingRecorder, TelemetryInstant};

/// Embassy instant adapted to the shared telemetry trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let micros = self.0.saturating_duration_since(earlier.0).as_micros();
        Duration::from_micros(micros)
    }
}

/// Reading history kept by the voltmeter task.
pub type FirmwareRecorder = ReadingRecorder<FirmwareInstant>;

/// Records `reading` and logs it.
pub fn record_reading(
    recorder: &mut FirmwareRecorder,
    reading: &Reading,
    timestamp: FirmwareInstant,
) -> ReadingId {
    let id = recorder.record(reading, timestamp);
    if let Some(record) = recorder.latest() {
        log_reading(record);
    }
    id
}

fn log_reading(record: &ReadingRecord<FirmwareInstant>) {
    let timestamp_us = record.timestamp.into_embassy().as_micros();
    let delta_us = record
        .elapsed_since_previous
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));

    emit_log(
        record.kind.label(),
        record.channel,
        record.code,
        record.millivolts(),
        timestamp_us,
        delta_us,
    );
}

#[cfg(target_os = "none")]
fn emit_log(
    kind: &'static str,
    channel: u8,
    code: u32,
    millivolts: i32,
    timestamp_us: u64,
    delta_us: Option<u64>,
) {
    if let Some(delta) = delta_us {
        defmt::info!(
            "telemetry:adc {} ch{} code={} {}mV t={}us Δ={}us",
            kind,
            channel,
            code,
            millivolts,
            timestamp_us,
            delta
        );
    } else {
        defmt::info!(
            "telemetry:adc {} ch{} code={} {}mV t={}us",
            kind,
            channel,
            code,
            millivolts,
            timestamp_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(
    kind: &'static str,
    channel: u8,
    code: u32,
    millivolts: i32,
    timestamp_us: u64,
    delta_us: Option<u64>,
) {
    if let Some(delta) = delta_us {
        println!(
            "telemetry:adc {kind} ch{channel} code={code} {millivolts}mV t={timestamp_us}us Δ={delta}us"
        );
    } else {
        println!("telemetry:adc {kind} ch{channel} code={code} {millivolts}mV t={timestamp_us}us");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltmeter_core::converter::ReadingKind;

    fn micros(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_micros(value))
    }

    fn reading(kind: ReadingKind, code: u32, volts: f32) -> Reading {
        Reading {
            kind,
            channel: 0,
            code,
            resolution_bits: 10,
            volts,
        }
    }

    #[test]
    fn records_elapsed_between_readings() {
        let mut recorder = FirmwareRecorder::new();

        let id1 = record_reading(&mut recorder, &reading(ReadingKind::Raw, 512, 21.87), micros(100));
        assert_eq!(id1, 0);
        assert_eq!(recorder.latest().unwrap().elapsed_since_previous, None);

        let id2 = record_reading(
            &mut recorder,
            &reading(ReadingKind::Oversampled, 8_160, 21.80),
            micros(500_100),
        );
        assert_eq!(id2, 1);

        let elapsed = recorder
            .latest()
            .and_then(|record| record.elapsed_since_previous)
            .expect("missing elapsed");
        assert_eq!(elapsed.as_micros(), 500_000);
    }

    #[test]
    fn instant_difference_saturates() {
        assert_eq!(
            micros(10).saturating_duration_since(micros(50)),
            Duration::ZERO
        );
    }
}

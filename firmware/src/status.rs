#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Atomics hold the last reading of each kind so other tasks can report it
//! without touching the sampler.

use portable_atomic::{AtomicI32, AtomicU32, Ordering};
use voltmeter_core::converter::ReadingKind;

const UNKNOWN_MV: i32 = i32::MIN;

/// Millivolts from the last single-sample reading.
static RAW_MV: AtomicI32 = AtomicI32::new(UNKNOWN_MV);
/// Millivolts from the last oversampled reading.
static OVERSAMPLED_MV: AtomicI32 = AtomicI32::new(UNKNOWN_MV);
/// Total readings taken since boot.
static READINGS: AtomicU32 = AtomicU32::new(0);

fn slot(kind: ReadingKind) -> &'static AtomicI32 {
    match kind {
        ReadingKind::Raw => &RAW_MV,
        ReadingKind::Oversampled => &OVERSAMPLED_MV,
    }
}

/// Stores the latest reading of `kind`.
pub fn record_millivolts(kind: ReadingKind, millivolts: i32) {
    // Clamp away from the sentinel.
    slot(kind).store(millivolts.max(UNKNOWN_MV + 1), Ordering::Relaxed);
    READINGS.fetch_add(1, Ordering::Relaxed);
}

/// Returns the most recent reading of `kind`, if any.
pub fn millivolts(kind: ReadingKind) -> Option<i32> {
    match slot(kind).load(Ordering::Relaxed) {
        UNKNOWN_MV => None,
        value => Some(value),
    }
}

/// Number of readings recorded since boot. Wraps.
pub fn readings_taken() -> u32 {
    READINGS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_readings_per_kind() {
        let before = readings_taken();
        record_millivolts(ReadingKind::Raw, 21_870);
        record_millivolts(ReadingKind::Oversampled, -1);

        assert_eq!(millivolts(ReadingKind::Raw), Some(21_870));
        assert_eq!(millivolts(ReadingKind::Oversampled), Some(-1));
        assert!(readings_taken().wrapping_sub(before) >= 2);

        record_millivolts(ReadingKind::Raw, i32::MIN);
        assert_eq!(millivolts(ReadingKind::Raw), Some(i32::MIN + 1));
    }
}

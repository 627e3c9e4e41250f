//! Reading history shared by firmware and host targets.
//!
//! Every voltage reading can be pushed into a fixed-size ring together with
//! the instant it was taken. The ring keeps the most recent
//! [`READING_RING_CAPACITY`] entries and overwrites the oldest. Readers walk it
//! oldest first.

use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::converter::{Reading, ReadingKind};
use crate::sampler::Channel;

/// Total number of readings retained in memory.
pub const READING_RING_CAPACITY: usize = 64;

/// Monotonic sequence number assigned to each recorded reading.
pub type ReadingId = u32;

/// Trait implemented by monotonic instant wrappers used for reading timestamps.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Reading stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadingRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: ReadingId,
    pub timestamp: TInstant,
    pub kind: ReadingKind,
    pub channel: Channel,
    pub code: u32,
    pub resolution_bits: u8,
    pub volts: f32,
    /// Time since the previous reading of any kind, `None` for the first.
    pub elapsed_since_previous: Option<Duration>,
}

impl<TInstant> ReadingRecord<TInstant>
where
    TInstant: Copy,
{
    /// Voltage rounded to whole millivolts, saturating at the `i32` range.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn millivolts(&self) -> i32 {
        let scaled = self.volts * 1000.0;
        // `as` saturates and maps NaN to zero.
        if scaled >= 0.0 {
            (scaled + 0.5) as i32
        } else {
            (scaled - 0.5) as i32
        }
    }
}

/// Reading ring buffer type alias.
pub type ReadingRing<TInstant, const CAPACITY: usize = READING_RING_CAPACITY> =
    HistoryBuf<ReadingRecord<TInstant>, CAPACITY>;

/// Records readings into a fixed-size ring buffer.
pub struct ReadingRecorder<TInstant, const CAPACITY: usize = READING_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: ReadingRing<TInstant, CAPACITY>,
    last_reading_at: Option<TInstant>,
    next_id: ReadingId,
}

impl<TInstant, const CAPACITY: usize> ReadingRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_reading_at: None,
            next_id: 0,
        }
    }

    /// Stores `reading` taken at `timestamp` and returns its id.
    pub fn record(&mut self, reading: &Reading, timestamp: TInstant) -> ReadingId {
        let elapsed = self
            .last_reading_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_reading_at = Some(timestamp);

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.ring.write(ReadingRecord {
            id,
            timestamp,
            kind: reading.kind,
            channel: reading.channel,
            code: reading.code,
            resolution_bits: reading.resolution_bits,
            volts: reading.volts,
            elapsed_since_previous: elapsed,
        });

        id
    }

    /// Returns an iterator over the recorded readings in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, ReadingRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent reading, if available.
    pub fn latest(&self) -> Option<&ReadingRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the most recent reading of `kind`.
    pub fn latest_of(&self, kind: ReadingKind) -> Option<&ReadingRecord<TInstant>> {
        self.ring
            .oldest_ordered()
            .filter(|record| record.kind == kind)
            .last()
    }

    /// Returns the number of readings currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no readings are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drops every stored reading. Ids keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.last_reading_at = None;
    }
}

impl<TInstant, const CAPACITY: usize> Default for ReadingRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

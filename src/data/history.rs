//! Reading history.
//!
//! Holds the recent readings of every probe in a bounded ring buffer.
//! Long steady stretches collapse into a start and an end point so the
//! buffer covers more time without losing the shape of the curve.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Readings kept by default: 8 hours at one reading per second.
pub const DEFAULT_HISTORY_CAPACITY: usize = 8 * 60 * 60;

/// Probe temperatures at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// When the reading was taken (or, for a coalesced entry, last confirmed).
    pub timestamp: DateTime<Utc>,
    /// Celsius value per probe socket, `None` for an unplugged probe.
    pub probes: Vec<Option<f64>>,
}

impl Reading {
    /// Create a new reading.
    pub fn new(timestamp: DateTime<Utc>, probes: Vec<Option<f64>>) -> Self {
        Self { timestamp, probes }
    }

    /// Create a reading stamped with the current time.
    pub fn now(probes: Vec<Option<f64>>) -> Self {
        Self::new(Utc::now(), probes)
    }

    /// Temperature of one probe, `None` if unplugged or out of range.
    pub fn probe(&self, index: usize) -> Option<f64> {
        self.probes.get(index).copied().flatten()
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Bounded, coalescing reading history.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
    generation: u64,
}

impl HistoryBuffer {
    /// Create an empty buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create an empty buffer holding at most `capacity` readings.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
            generation: 0,
        }
    }

    /// Append a reading.
    ///
    /// When the two newest stored readings carry the same probe values as
    /// `reading`, the newest one has its timestamp moved forward instead of
    /// a new entry being stored. Timestamps never go backwards: a reading
    /// older than the newest entry is stamped with the newest entry's time.
    ///
    /// Returns `true` if a new entry was stored.
    pub fn push(&mut self, mut reading: Reading) -> bool {
        if let Some(last) = self.readings.back() {
            if reading.timestamp < last.timestamp {
                reading.timestamp = last.timestamp;
            }
        }

        if self.is_steady(&reading.probes) {
            if let Some(last) = self.readings.back_mut() {
                last.timestamp = reading.timestamp;
                return false;
            }
        }

        if self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
        true
    }

    fn is_steady(&self, probes: &[Option<f64>]) -> bool {
        let len = self.readings.len();
        len >= 2
            && self.readings[len - 1].probes == probes
            && self.readings[len - 2].probes == probes
    }

    /// The newest reading.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Copy out all readings, oldest first.
    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every reading and start a new generation.
    pub fn clear(&mut self) {
        self.readings.clear();
        self.generation += 1;
    }

    /// Counter bumped on every [`clear`](Self::clear).
    ///
    /// Consumers compare it with the value they last saw to know that
    /// their copy of the history is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

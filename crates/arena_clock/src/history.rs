//! Tick-indexed input history.
//!
//! Prediction replay re-simulates past ticks, and every replay of a tick
//! must see exactly the input that was originally applied at that tick.
//! [`CommandHistory`] keeps a small ring of (tick, value) entries indexed by
//! tick so lookups are O(1) and old entries age out naturally as the ring
//! wraps.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::tick::Tick;

/// Default number of ticks of input retained, roughly one second at 60 Hz.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Errors from [`CommandHistory`] lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The tick was invalid, or no entry at or before it survives in the
    /// ring.
    #[error("no input recorded at or before {0}")]
    NoDataAtTick(Tick),
}

/// A ring buffer of per-tick input values.
///
/// `record` overwrites any earlier value for the same tick, so re-sent input
/// converges on one value per tick. `at_tick` returns the most recent entry
/// at or before the requested tick, which repeats the last known input
/// across ticks where none arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHistory<T> {
    slots: Vec<Option<(Tick, T)>>,
}

impl<T: Clone + Serialize + DeserializeOwned> CommandHistory<T> {
    /// A history retaining [`DEFAULT_HISTORY_CAPACITY`] ticks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// A history retaining `capacity` ticks.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Number of ticks this history retains.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `value` as the input for `tick`, overwriting any earlier value
    /// recorded for the same tick.
    ///
    /// Recording against an invalid tick is ignored.
    pub fn record(&mut self, tick: Tick, value: T) {
        if !tick.is_valid() {
            tracing::debug!("discarding input recorded against an invalid tick");
            return;
        }
        let slot = tick.index() as usize % self.slots.len();
        self.slots[slot] = Some((tick, value));
    }

    /// The most recent input at or before `tick`, together with the tick it
    /// was recorded for.
    ///
    /// # Errors
    ///
    /// [`HistoryError::NoDataAtTick`] if `tick` is invalid or no surviving
    /// entry is at or before it.
    pub fn at_tick(&self, tick: Tick) -> Result<(Tick, &T), HistoryError> {
        if !tick.is_valid() {
            return Err(HistoryError::NoDataAtTick(tick));
        }
        // Walk backwards one tick at a time; each candidate maps to exactly
        // one slot, so at most `capacity` probes.
        for age in 0..self.slots.len() as u32 {
            let candidate = tick.subtract(age);
            let slot = candidate.index() as usize % self.slots.len();
            if let Some((stored, value)) = &self.slots[slot]
                && *stored == candidate
            {
                return Ok((*stored, value));
            }
        }
        Err(HistoryError::NoDataAtTick(tick))
    }

    /// The exact input recorded for `tick`, if it survives in the ring.
    #[must_use]
    pub fn exactly_at(&self, tick: Tick) -> Option<&T> {
        if !tick.is_valid() {
            return None;
        }
        let slot = tick.index() as usize % self.slots.len();
        match &self.slots[slot] {
            Some((stored, value)) if *stored == tick => Some(value),
            _ => None,
        }
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.slots.fill(None);
    }
}

impl<T: Clone + Serialize + DeserializeOwned> Default for CommandHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Move(i8, i8);

    #[test]
    fn test_exact_tick_lookup() {
        let mut history = CommandHistory::new();
        history.record(Tick::new(10), Move(1, 0));
        let (tick, value) = history.at_tick(Tick::new(10)).unwrap();
        assert_eq!(tick, Tick::new(10));
        assert_eq!(*value, Move(1, 0));
    }

    #[test]
    fn test_lookup_falls_back_to_earlier_tick() {
        let mut history = CommandHistory::new();
        history.record(Tick::new(10), Move(1, 0));
        // Ticks 11..=13 have no input; the tick-10 entry is repeated.
        let (tick, value) = history.at_tick(Tick::new(13)).unwrap();
        assert_eq!(tick, Tick::new(10));
        assert_eq!(*value, Move(1, 0));
    }

    #[test]
    fn test_same_tick_record_overwrites() {
        let mut history = CommandHistory::new();
        history.record(Tick::new(5), Move(1, 0));
        history.record(Tick::new(5), Move(0, 1));
        let (_, value) = history.at_tick(Tick::new(5)).unwrap();
        assert_eq!(*value, Move(0, 1));
    }

    #[test]
    fn test_lookup_never_returns_future_input() {
        let mut history = CommandHistory::new();
        history.record(Tick::new(20), Move(1, 1));
        assert_eq!(
            history.at_tick(Tick::new(19)),
            Err(HistoryError::NoDataAtTick(Tick::new(19)))
        );
    }

    #[test]
    fn test_old_entries_age_out() {
        let mut history = CommandHistory::with_capacity(8);
        history.record(Tick::new(0), Move(1, 0));
        // Tick 8 maps to the same slot and evicts tick 0.
        history.record(Tick::new(8), Move(0, 1));
        assert_eq!(history.exactly_at(Tick::new(0)), None);
        assert_eq!(history.exactly_at(Tick::new(8)), Some(&Move(0, 1)));
    }

    #[test]
    fn test_lookup_across_tick_wraparound() {
        let mut history = CommandHistory::new();
        let before_wrap = Tick::new(u32::MAX);
        history.record(before_wrap, Move(1, 0));
        let after_wrap = before_wrap.add(2);
        let (tick, value) = history.at_tick(after_wrap).unwrap();
        assert_eq!(tick, before_wrap);
        assert_eq!(*value, Move(1, 0));
    }

    #[test]
    fn test_invalid_tick_rejected() {
        let mut history = CommandHistory::new();
        history.record(Tick::INVALID, Move(1, 0));
        assert!(history.at_tick(Tick::INVALID).is_err());
        assert!(history.at_tick(Tick::new(100)).is_err());
    }
}

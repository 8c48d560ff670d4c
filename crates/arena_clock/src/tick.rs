//! Simulation tick counting.
//!
//! A [`Tick`] identifies one fixed simulation step. Tick indices live in the
//! full `u32` range and wrap; comparisons use signed wraparound arithmetic so
//! ordering stays correct across the wrap point, the same way TCP sequence
//! numbers are compared. A tick can also be *invalid* (no tick yet), which is
//! distinct from tick zero.

use serde::{Deserialize, Serialize};

/// A simulation tick index with an explicit validity flag.
///
/// Stored and serialised as the pair (index, valid); an invalid tick never
/// compares newer than anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tick {
    index: u32,
    valid: bool,
}

impl Tick {
    /// The "no tick" sentinel.
    pub const INVALID: Self = Self {
        index: 0,
        valid: false,
    };

    /// A valid tick with the given index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self { index, valid: true }
    }

    /// Returns `true` unless this is [`Tick::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.valid
    }

    /// The tick index. Meaningless on an invalid tick.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The tick `count` steps later, wrapping at the end of the index range.
    ///
    /// An invalid tick stays invalid.
    #[must_use]
    pub const fn add(self, count: u32) -> Self {
        if !self.valid {
            return Self::INVALID;
        }
        Self::new(self.index.wrapping_add(count))
    }

    /// The tick `count` steps earlier, wrapping at the start of the index
    /// range.
    ///
    /// An invalid tick stays invalid.
    #[must_use]
    pub const fn subtract(self, count: u32) -> Self {
        if !self.valid {
            return Self::INVALID;
        }
        Self::new(self.index.wrapping_sub(count))
    }

    /// Wraparound-safe ordering: `true` if `self` is strictly after `other`.
    ///
    /// Correct for any two ticks less than half the index range apart, which
    /// at 60 ticks per second covers sessions over a year long. Returns
    /// `false` if either tick is invalid.
    #[must_use]
    pub const fn is_newer_than(self, other: Self) -> bool {
        if !self.valid || !other.valid {
            return false;
        }
        self.index.wrapping_sub(other.index) as i32 > 0
    }

    /// Signed distance from `other` to `self` in ticks.
    ///
    /// Positive when `self` is later. Meaningless if either tick is invalid.
    #[must_use]
    pub const fn ticks_since(self, other: Self) -> i32 {
        self.index.wrapping_sub(other.index) as i32
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.valid {
            write!(f, "Tick({})", self.index)
        } else {
            write!(f, "Tick(invalid)")
        }
    }
}

/// Fixed simulation step rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRate {
    /// Simulation steps per second.
    pub ticks_per_second: u32,
}

impl TickRate {
    /// Duration of one tick in seconds.
    #[must_use]
    pub fn tick_duration(self) -> f32 {
        1.0 / self.ticks_per_second as f32
    }

    /// Number of whole ticks covering `seconds`, rounded up so short
    /// durations never collapse to zero ticks.
    #[must_use]
    pub fn ticks_for_seconds(self, seconds: f32) -> u32 {
        (seconds * self.ticks_per_second as f32).ceil() as u32
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
        }
    }
}

/// The authoritative step counter for one simulation world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickClock {
    current: Tick,
}

impl TickClock {
    /// A clock positioned at `start`.
    #[must_use]
    pub const fn new(start: Tick) -> Self {
        Self { current: start }
    }

    /// The tick currently being simulated.
    #[must_use]
    pub const fn current(&self) -> Tick {
        self.current
    }

    /// Advance by one tick and return the new current tick.
    pub fn advance(&mut self) -> Tick {
        self.current = self.current.add(1);
        self.current
    }

    /// Rewind the clock to an earlier tick for prediction replay.
    pub fn rewind_to(&mut self, tick: Tick) {
        self.current = tick;
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(Tick::new(0))
    }
}

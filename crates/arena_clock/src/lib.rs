//! Tick counting and per-tick input history for the simulation core.

mod history;
mod tick;

pub use history::{CommandHistory, DEFAULT_HISTORY_CAPACITY, HistoryError};
pub use tick::{Tick, TickClock, TickRate};

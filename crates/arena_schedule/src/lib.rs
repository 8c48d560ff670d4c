//! System scheduling for the simulation core.
//!
//! Systems declare what they read and write; the schedule groups
//! non-conflicting systems into stages that run on rayon workers, with a
//! command-buffer merge barrier between stages. Build-time validation
//! rejects any parallel system that tries to write the store directly.

mod access;
mod error;
mod executor;
mod lookup;
mod stage;

pub use access::SystemAccess;
pub use error::ScheduleError;
pub use executor::{
    ExclusiveSystem, ParallelSystem, Schedule, ScheduleBuilder, SystemContext,
};
pub use lookup::{PartitionHandle, PartitionedMap};
pub use stage::{Stage, SystemKind, SystemSpec, compute_stages, validate};

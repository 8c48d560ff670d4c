//! Replication policy for the simulation core.
//!
//! Declares how each component type travels between server and clients and
//! enforces who may write what: the server corrects replicated state, owning
//! clients predict their own, and visual-only fields never enter the
//! simulation.

mod correction;
mod error;
mod ownership;
mod policy;

pub use correction::{apply_correction, snapshot_component};
pub use error::ReplicationError;
pub use ownership::{Authority, Owner, PeerId};
pub use policy::{PolicyRegistry, ReplicationMode};

//! Replication error types.

use arena_ecs::{ComponentTypeId, StoreError};

/// Errors from replication policy checks and correction application.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// The component type has no registered replication policy.
    #[error("component {0:?} has no replication policy")]
    UnregisteredPolicy(ComponentTypeId),

    /// The registered policy forbids writing this component here.
    #[error("replication policy forbids correcting component {0:?}")]
    PolicyViolation(ComponentTypeId),

    /// The correction payload could not be decoded.
    #[error("correction payload decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A snapshot could not be encoded.
    #[error("snapshot encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// The underlying store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

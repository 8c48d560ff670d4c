//! Per-component replication policy.
//!
//! Every replicated component type carries a mode describing how its values
//! travel between server and clients. The registry is consulted when
//! applying server corrections and when deciding which fields a peer may
//! write at all.

use std::collections::HashMap;

use arena_ecs::{Component, ComponentTypeId};
use serde::{Deserialize, Serialize};

/// How a component type is replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationMode {
    /// Server-authoritative state shipped to everyone (hit points, team,
    /// match state). Clients never simulate it ahead.
    AlwaysReplicated,
    /// State the owning client predicts locally and the server corrects
    /// (positions, cooldowns of the local champion).
    PredictedCorrectable,
    /// Presentation-only state interpolated from snapshots, never simulated
    /// locally (remote unit poses).
    InterpolatedVisualOnly,
}

/// Maps component types to their [`ReplicationMode`].
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    modes: HashMap<ComponentTypeId, ReplicationMode>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the replication mode for a component type.
    pub fn register<T: Component>(&mut self, mode: ReplicationMode) {
        self.register_raw(ComponentTypeId::of::<T>(), mode);
    }

    /// Register by raw type id.
    pub fn register_raw(&mut self, type_id: ComponentTypeId, mode: ReplicationMode) {
        self.modes.insert(type_id, mode);
    }

    /// The mode registered for a component type, if any.
    #[must_use]
    pub fn mode_of(&self, type_id: ComponentTypeId) -> Option<ReplicationMode> {
        self.modes.get(&type_id).copied()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

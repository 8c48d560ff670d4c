//! Store-level error types.

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Errors produced by [`ComponentStore`](crate::ComponentStore) operations.
///
/// All of these are recoverable at the call site: a system that hits a stale
/// handle or a missing component skips that entity for the step rather than
/// aborting the step for everyone else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The handle's generation no longer matches the slot — the entity it
    /// referred to has been destroyed.
    #[error("stale entity handle {0}")]
    StaleEntity(Entity),

    /// The entity is live but does not carry the requested component.
    #[error("component '{name}' not present on {entity}")]
    MissingComponent {
        /// The entity that was queried.
        entity: Entity,
        /// Name of the missing component type.
        name: &'static str,
    },

    /// A type-erased operation referred to a component type the store has
    /// never seen a typed value of.
    #[error("component type {0:?} is not registered")]
    UnregisteredType(ComponentTypeId),
}

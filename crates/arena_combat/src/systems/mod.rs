//! The combat system chain.
//!
//! Systems run in a fixed order each step: movement, targeting, attack,
//! ability, trigger damage, damage application, despawn, respawn. Parallel
//! systems fan out over rayon workers and defer every write; the rest run
//! exclusively.

mod ability;
mod apply_damage;
mod attack;
mod despawn;
mod movement;
mod respawn;
mod targeting;
mod trigger_damage;

pub use ability::Ability;
pub use apply_damage::ApplyDamage;
pub use attack::Attack;
pub use despawn::Despawn;
pub use movement::Movement;
pub use respawn::Respawn;
pub use targeting::Targeting;
pub use trigger_damage::TriggerDamage;

use arena_ecs::{Component, ComponentStore, ComponentTypeId, Entity};

use crate::components::PredictionBatch;

/// The entity holding a singleton component, if one exists.
pub(crate) fn singleton<T: Component>(store: &ComponentStore) -> Option<Entity> {
    store
        .entities_with(&[ComponentTypeId::of::<T>()])
        .first()
        .copied()
}

/// The step's prediction batch info, defaulting to a plain single-tick step.
pub(crate) fn prediction_batch(store: &ComponentStore) -> PredictionBatch {
    singleton::<PredictionBatch>(store)
        .and_then(|e| store.get::<PredictionBatch>(e).ok())
        .copied()
        .unwrap_or_default()
}

/// Whether the entity is flagged dead (component present and enabled).
pub(crate) fn is_dead(store: &ComponentStore, entity: Entity) -> bool {
    store
        .is_enabled::<crate::components::Dead>(entity)
        .unwrap_or(false)
}

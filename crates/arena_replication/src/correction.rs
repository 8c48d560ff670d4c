//! Applying server corrections.
//!
//! A correction arrives as a (component type id, MessagePack payload) pair
//! for one entity. The payload is decoded through the type's registered
//! [`ComponentMeta`](arena_ecs::ComponentMeta) and overwrites the local
//! value — but only for component types whose policy allows the server to
//! correct them. Visual-only fields are never written into the simulation.

use arena_ecs::{ComponentStore, ComponentTypeId, Entity, StoreError};
use tracing::trace;

use crate::error::ReplicationError;
use crate::policy::{PolicyRegistry, ReplicationMode};

/// Overwrite one component from a server correction payload.
///
/// # Errors
///
/// - [`ReplicationError::UnregisteredPolicy`] if the type has no policy.
/// - [`ReplicationError::PolicyViolation`] if the policy forbids correction.
/// - [`ReplicationError::Decode`] if the payload is malformed.
/// - [`ReplicationError::Store`] for stale entities or unknown types.
pub fn apply_correction(
    store: &mut ComponentStore,
    registry: &PolicyRegistry,
    entity: Entity,
    type_id: ComponentTypeId,
    payload: &[u8],
) -> Result<(), ReplicationError> {
    let mode = registry
        .mode_of(type_id)
        .ok_or(ReplicationError::UnregisteredPolicy(type_id))?;
    match mode {
        ReplicationMode::AlwaysReplicated | ReplicationMode::PredictedCorrectable => {}
        ReplicationMode::InterpolatedVisualOnly => {
            return Err(ReplicationError::PolicyViolation(type_id));
        }
    }

    let meta = *store
        .meta_of(type_id)
        .ok_or(ReplicationError::Store(StoreError::UnregisteredType(
            type_id,
        )))?;
    let raw = (meta.decode_fn)(payload)?;
    store.overwrite_component_bytes(entity, type_id, &raw)?;
    trace!(%entity, component = meta.name, "applied correction");
    Ok(())
}

/// Snapshot one component into a correction payload (server side).
///
/// # Errors
///
/// - [`ReplicationError::Store`] for stale entities or unknown types.
/// - [`ReplicationError::Encode`] if encoding fails.
pub fn snapshot_component(
    store: &ComponentStore,
    entity: Entity,
    type_id: ComponentTypeId,
) -> Result<Vec<u8>, ReplicationError> {
    let meta = store
        .meta_of(type_id)
        .ok_or(ReplicationError::Store(StoreError::UnregisteredType(
            type_id,
        )))?;
    let raw = store.component_bytes(entity, type_id)?;
    Ok((meta.encode_fn)(raw)?)
}

#[cfg(test)]
mod tests {
    use arena_ecs::Component;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct HitPoints(i32);
    impl Component for HitPoints {
        fn type_name() -> &'static str {
            "HitPoints"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct VisualPose(f32);
    impl Component for VisualPose {
        fn type_name() -> &'static str {
            "VisualPose"
        }
    }

    #[test]
    fn test_correction_overwrites_replicated_component() {
        let mut store = ComponentStore::new();
        let mut registry = PolicyRegistry::new();
        registry.register::<HitPoints>(ReplicationMode::AlwaysReplicated);

        let server_truth = store.spawn().with(HitPoints(70)).finish();
        let payload =
            snapshot_component(&store, server_truth, HitPoints::component_type_id()).unwrap();

        let local = store.spawn().with(HitPoints(100)).finish();
        apply_correction(
            &mut store,
            &registry,
            local,
            HitPoints::component_type_id(),
            &payload,
        )
        .unwrap();
        assert_eq!(store.get::<HitPoints>(local).unwrap(), &HitPoints(70));
    }

    #[test]
    fn test_visual_only_correction_rejected() {
        let mut store = ComponentStore::new();
        let mut registry = PolicyRegistry::new();
        registry.register::<VisualPose>(ReplicationMode::InterpolatedVisualOnly);

        let e = store.spawn().with(VisualPose(0.0)).finish();
        let payload = snapshot_component(&store, e, VisualPose::component_type_id()).unwrap();
        let err = apply_correction(
            &mut store,
            &registry,
            e,
            VisualPose::component_type_id(),
            &payload,
        )
        .unwrap_err();
        assert!(matches!(err, ReplicationError::PolicyViolation(_)));
        assert_eq!(store.get::<VisualPose>(e).unwrap(), &VisualPose(0.0));
    }

    #[test]
    fn test_unregistered_policy_rejected() {
        let mut store = ComponentStore::new();
        let registry = PolicyRegistry::new();
        let e = store.spawn().with(HitPoints(1)).finish();
        let err = apply_correction(
            &mut store,
            &registry,
            e,
            HitPoints::component_type_id(),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ReplicationError::UnregisteredPolicy(_)));
    }

    #[test]
    fn test_correction_to_stale_entity_fails() {
        let mut store = ComponentStore::new();
        let mut registry = PolicyRegistry::new();
        registry.register::<HitPoints>(ReplicationMode::PredictedCorrectable);

        let e = store.spawn().with(HitPoints(1)).finish();
        let payload = snapshot_component(&store, e, HitPoints::component_type_id()).unwrap();
        store.despawn(e).unwrap();
        let err = apply_correction(
            &mut store,
            &registry,
            e,
            HitPoints::component_type_id(),
            &payload,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReplicationError::Store(StoreError::StaleEntity(_))
        ));
    }
}

//! Spatial query boundary.
//!
//! The broad-phase lives outside this crate; combat consumes it through two
//! narrow interfaces: an overlap-sphere query for target acquisition and a
//! per-step feed of trigger (overlap) events for projectile hits. A naive
//! linear implementation backs tests and the headless binary.

use arena_ecs::{Component, ComponentStore, ComponentTypeId, Entity};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::components::Transform;

/// One broad-phase overlap between a trigger collider and a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// First entity of the pair (order is not meaningful).
    pub first: Entity,
    /// Second entity of the pair.
    pub second: Entity,
    /// Stable broad-phase body index, used as the playback sort key.
    pub body_index: u32,
}

/// The step's trigger events, held on the step singleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerFeed(pub Vec<TriggerEvent>);
impl Component for TriggerFeed {
    fn type_name() -> &'static str {
        "TriggerFeed"
    }
}

/// Black-box overlap query against the current world state.
pub trait SpatialQuery: Send + Sync {
    /// Entities with a [`Transform`] within `radius` of `center`.
    fn overlap_sphere(&self, store: &ComponentStore, center: Vec3, radius: f32) -> Vec<Entity>;
}

/// Brute-force spatial query: distance-checks every positioned entity.
///
/// Adequate for tests and small headless matches; a real broad-phase slots
/// in behind the same trait.
#[derive(Debug, Default)]
pub struct LinearSpatialQuery;

impl SpatialQuery for LinearSpatialQuery {
    fn overlap_sphere(&self, store: &ComponentStore, center: Vec3, radius: f32) -> Vec<Entity> {
        let radius_sq = radius * radius;
        store
            .entities_with(&[ComponentTypeId::of::<Transform>()])
            .into_iter()
            .filter(|&entity| {
                store
                    .get::<Transform>(entity)
                    .map(|t| t.position.distance_squared(center) <= radius_sq)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_sphere_filters_by_distance() {
        let mut store = ComponentStore::new();
        let near = store
            .spawn()
            .with(Transform::at(Vec3::new(1.0, 0.0, 0.0)))
            .finish();
        let far = store
            .spawn()
            .with(Transform::at(Vec3::new(50.0, 0.0, 0.0)))
            .finish();

        let hits = LinearSpatialQuery.overlap_sphere(&store, Vec3::ZERO, 5.0);
        assert!(hits.contains(&near));
        assert!(!hits.contains(&far));
    }

    #[test]
    fn test_overlap_sphere_boundary_inclusive() {
        let mut store = ComponentStore::new();
        let edge = store
            .spawn()
            .with(Transform::at(Vec3::new(5.0, 0.0, 0.0)))
            .finish();
        let hits = LinearSpatialQuery.overlap_sphere(&store, Vec3::ZERO, 5.0);
        assert!(hits.contains(&edge));
    }
}

//! Target acquisition.
//!
//! Every armed unit keeps a current target and re-searches at most twice a
//! second: the per-entity countdown bounds search cost with many units on
//! the field. A held target is kept while it stays alive and in aggro range;
//! searches prefer structures over mobile units, then take the nearest.

use std::sync::Arc;

use arena_clock::TickRate;
use arena_ecs::{ComponentStore, ComponentTypeId, Entity};
use arena_schedule::{ParallelSystem, SystemAccess, SystemContext};
use glam::Vec3;

use crate::components::{
    AttackRange, Dead, HitPoints, Projectile, Target, TargetSearchTimer, Team, Transform,
};
use crate::spatial::SpatialQuery;
use crate::systems::is_dead;

/// Units look for targets out to this multiple of their attack range.
const AGGRO_FACTOR: f32 = 2.0;
const CHUNK_SIZE: usize = 32;

/// Validates and (re)acquires attack targets.
pub struct Targeting {
    rate: TickRate,
    spatial: Arc<dyn SpatialQuery>,
}

impl Targeting {
    /// A targeting system backed by the given spatial query.
    #[must_use]
    pub fn new(rate: TickRate, spatial: Arc<dyn SpatialQuery>) -> Self {
        Self { rate, spatial }
    }

    fn is_attackable(store: &ComponentStore, seeker: Entity, team: Team, candidate: Entity) -> bool {
        candidate != seeker
            && store.has::<HitPoints>(candidate)
            && !store.has::<Projectile>(candidate)
            && !is_dead(store, candidate)
            && store
                .get::<Team>(candidate)
                .map(|t| *t != team)
                .unwrap_or(false)
    }

    fn nearest(
        store: &ComponentStore,
        position: Vec3,
        candidates: impl Iterator<Item = Entity>,
    ) -> Option<Entity> {
        candidates
            .filter_map(|entity| {
                store
                    .get::<Transform>(entity)
                    .ok()
                    .map(|t| (t.position.distance_squared(position), entity))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, entity)| entity)
    }
}

impl ParallelSystem for Targeting {
    fn name(&self) -> &'static str {
        "targeting"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .read(ComponentTypeId::of::<Transform>())
            .read(ComponentTypeId::of::<Team>())
            .read(ComponentTypeId::of::<AttackRange>())
            .read(ComponentTypeId::of::<HitPoints>())
            .read(ComponentTypeId::of::<Dead>())
            .read(ComponentTypeId::of::<crate::components::Structure>())
            .read(ComponentTypeId::of::<Projectile>())
            .deferred_write(ComponentTypeId::of::<Target>())
            .deferred_write(ComponentTypeId::of::<TargetSearchTimer>())
    }

    fn run(&self, ctx: &SystemContext<'_>) {
        let store = ctx.store();
        let step_seconds = self.rate.tick_duration();
        let seekers = store.entities_with(&[
            ComponentTypeId::of::<Target>(),
            ComponentTypeId::of::<TargetSearchTimer>(),
            ComponentTypeId::of::<Transform>(),
            ComponentTypeId::of::<Team>(),
            ComponentTypeId::of::<AttackRange>(),
        ]);

        ctx.par_chunks(&seekers, CHUNK_SIZE, |chunk, commands| {
            for &seeker in chunk {
                if is_dead(store, seeker) {
                    continue;
                }
                let (Ok(target), Ok(timer), Ok(transform), Ok(&team), Ok(range)) = (
                    store.get::<Target>(seeker),
                    store.get::<TargetSearchTimer>(seeker),
                    store.get::<Transform>(seeker),
                    store.get::<Team>(seeker),
                    store.get::<AttackRange>(seeker),
                ) else {
                    continue;
                };
                let aggro_radius = range.0 * AGGRO_FACTOR;

                // Validate the held target: drop it when destroyed, dead, or
                // out of aggro range.
                let held = target.entity.filter(|&held| {
                    Self::is_attackable(store, seeker, team, held)
                        && store
                            .get::<Transform>(held)
                            .map(|t| t.position.distance(transform.position) <= aggro_radius)
                            .unwrap_or(false)
                });

                let mut remaining = timer.remaining - step_seconds;
                let mut next_target = held;

                if held.is_none() && remaining <= 0.0 {
                    let hits = self
                        .spatial
                        .overlap_sphere(store, transform.position, aggro_radius);
                    let attackable = || {
                        hits.iter()
                            .copied()
                            .filter(|&c| Self::is_attackable(store, seeker, team, c))
                    };
                    // Structures first, then the nearest mobile enemy.
                    next_target = Self::nearest(
                        store,
                        transform.position,
                        attackable().filter(|&c| store.has::<crate::components::Structure>(c)),
                    )
                    .or_else(|| Self::nearest(store, transform.position, attackable()));
                    remaining = TargetSearchTimer::INTERVAL;
                }

                if next_target != target.entity {
                    commands.insert(
                        seeker,
                        Target {
                            entity: next_target,
                        },
                    );
                }
                commands.insert(seeker, TargetSearchTimer { remaining });
            }
        });
    }
}

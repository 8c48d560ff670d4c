//! Basic attacks.
//!
//! A unit with a live target in attack range stands still and fires: the
//! cooldown gate reads the tick-indexed ready history (no record means the
//! cooldown is expired), and firing spawns a projectile flying at the
//! target's current position. One-shot effects only happen the first time a
//! tick is fully predicted, so resimulation never duplicates a shot.

use std::sync::Arc;

use arena_clock::TickRate;
use arena_ecs::{ComponentStore, ComponentTypeId, Entity};
use arena_schedule::ExclusiveSystem;
use tracing::trace;

use crate::components::{
    AlreadyDamaged, AttackCooldown, AttackDamage, AttackRange, AttackReadyHistory, Dead,
    DespawnAfter, DespawnAtTick, LanePath, MoveSpeed, Projectile, Target, Team, Transform,
    UnitLevel, UnitTypeIndex,
};
use crate::config::UnitConfigTable;
use crate::systems::{is_dead, prediction_batch};

/// Projectiles fly at a fixed speed.
const PROJECTILE_SPEED: f32 = 12.0;
/// Projectiles that never connect despawn after this long.
const PROJECTILE_LIFETIME_SECONDS: f32 = 2.0;

/// Fires basic attacks at held targets.
pub struct Attack {
    rate: TickRate,
    config: Arc<UnitConfigTable>,
}

impl Attack {
    /// An attack system reading projectile scales from `config`.
    #[must_use]
    pub fn new(rate: TickRate, config: Arc<UnitConfigTable>) -> Self {
        Self { rate, config }
    }

    fn projectile_scale(&self, store: &ComponentStore, attacker: Entity) -> f32 {
        match (
            store.get::<UnitTypeIndex>(attacker),
            store.get::<UnitLevel>(attacker),
        ) {
            (Ok(type_index), Ok(level)) => {
                self.config.stats(type_index.0, level.0).projectile_scale
            }
            _ => 1.0,
        }
    }
}

impl ExclusiveSystem for Attack {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn run(&mut self, store: &mut ComponentStore, tick: arena_clock::Tick) {
        let batch = prediction_batch(store);
        let attackers = store.entities_with(&[
            ComponentTypeId::of::<Target>(),
            ComponentTypeId::of::<Transform>(),
            ComponentTypeId::of::<Team>(),
            ComponentTypeId::of::<AttackDamage>(),
            ComponentTypeId::of::<AttackRange>(),
            ComponentTypeId::of::<AttackCooldown>(),
            ComponentTypeId::of::<AttackReadyHistory>(),
            ComponentTypeId::of::<MoveSpeed>(),
        ]);

        for attacker in attackers {
            if is_dead(store, attacker) {
                continue;
            }
            let (Ok(&target), Ok(&transform), Ok(&team), Ok(&damage), Ok(&range), Ok(&cooldown)) = (
                store.get::<Target>(attacker),
                store.get::<Transform>(attacker),
                store.get::<Team>(attacker),
                store.get::<AttackDamage>(attacker),
                store.get::<AttackRange>(attacker),
                store.get::<AttackCooldown>(attacker),
            ) else {
                continue;
            };

            let engaged_position = target
                .entity
                .filter(|&t| store.contains(t) && !is_dead(store, t))
                .and_then(|t| store.get::<Transform>(t).ok())
                .map(|t| t.position)
                .filter(|p| p.distance(transform.position) <= range.0);

            let Some(target_position) = engaged_position else {
                // Disengaged: resume moving.
                if let Ok(speed) = store.get_mut::<MoveSpeed>(attacker) {
                    speed.current = speed.base;
                }
                continue;
            };

            // Engaged: stand and fight.
            if let Ok(speed) = store.get_mut::<MoveSpeed>(attacker) {
                speed.current = 0.0;
            }

            let ready = match store.get::<AttackReadyHistory>(attacker) {
                // No record in the window means the cooldown expired long ago.
                Ok(history) => match history.0.at_tick(tick) {
                    Ok((_, &ready_at)) => !ready_at.is_newer_than(tick),
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if !ready || !batch.is_first_full_prediction {
                continue;
            }

            let scale = self.projectile_scale(store, attacker);
            let to_target = target_position - transform.position;
            let yaw = to_target.x.atan2(to_target.z);
            store
                .spawn()
                .with(Projectile)
                .with(team)
                .with(AttackDamage(damage.0))
                .with(AlreadyDamaged::default())
                .with(Transform {
                    position: transform.position,
                    yaw,
                    scale,
                })
                .with(MoveSpeed::new(PROJECTILE_SPEED))
                .with(LanePath {
                    waypoints: vec![target_position],
                    next: 0,
                })
                .with(DespawnAfter {
                    seconds: PROJECTILE_LIFETIME_SECONDS,
                })
                .with(DespawnAtTick::default())
                .finish();

            let ready_at = tick.add(self.rate.ticks_for_seconds(cooldown.seconds));
            if let Ok(history) = store.get_mut::<AttackReadyHistory>(attacker) {
                history.0.record(tick, ready_at);
            }
            trace!(%attacker, %tick, "fired basic attack");
        }
    }
}

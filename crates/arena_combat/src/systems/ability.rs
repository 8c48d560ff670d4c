//! Champion ability casts.
//!
//! Ability input is historized so resimulation replays the exact cast. The
//! cooldown record is written one tick ahead of the cast by the input owner
//! only; the readiness check therefore looks back through the current
//! resimulation batch before falling back to the plain history lookup,
//! otherwise a cast made earlier in the batch would be invisible while
//! replaying.

use arena_clock::{Tick, TickRate};
use arena_ecs::{ComponentStore, ComponentTypeId};
use arena_replication::{Authority, Owner};
use arena_schedule::ExclusiveSystem;
use tracing::trace;

use crate::components::{
    AbilityHistory, AbilityReadyHistory, AbilityStats, AlreadyDamaged, AttackDamage, Champion,
    Dead, DespawnAfter, DespawnAtTick, LanePath, MoveSpeed, Projectile, Team, Transform,
};
use crate::systems::{is_dead, prediction_batch};

const ABILITY_PROJECTILE_SPEED: f32 = 16.0;
const ABILITY_PROJECTILE_LIFETIME_SECONDS: f32 = 1.5;

/// Casts champion abilities from historized input.
pub struct Ability {
    rate: TickRate,
    authority: Authority,
}

impl Ability {
    /// An ability system simulating as `authority`.
    #[must_use]
    pub fn new(rate: TickRate, authority: Authority) -> Self {
        Self { rate, authority }
    }

    /// May this instance append to the given owner's cooldown history?
    fn records_history_for(&self, owner: &Owner) -> bool {
        match self.authority {
            Authority::Server => true,
            Authority::Client(peer) => owner.peer == peer,
        }
    }
}

/// The most recent ready-at record visible at `tick`, looking back through
/// the resimulation batch first (records land at cast tick + 1, which may be
/// "ahead" of a tick being replayed).
fn ready_at_for(
    history: &AbilityReadyHistory,
    tick: Tick,
    batch_size: u32,
) -> Option<Tick> {
    for age in 0..batch_size {
        let candidate = tick.add(1).subtract(age);
        if let Some(&ready_at) = history.0.exactly_at(candidate) {
            return Some(ready_at);
        }
    }
    history.0.at_tick(tick).ok().map(|(_, &ready_at)| ready_at)
}

impl ExclusiveSystem for Ability {
    fn name(&self) -> &'static str {
        "ability"
    }

    fn run(&mut self, store: &mut ComponentStore, tick: Tick) {
        let batch = prediction_batch(store);
        let champions = store.entities_with(&[
            ComponentTypeId::of::<Champion>(),
            ComponentTypeId::of::<AbilityHistory>(),
            ComponentTypeId::of::<AbilityReadyHistory>(),
            ComponentTypeId::of::<AbilityStats>(),
            ComponentTypeId::of::<Transform>(),
            ComponentTypeId::of::<Team>(),
            ComponentTypeId::of::<Owner>(),
        ]);

        for champion in champions {
            if is_dead(store, champion) {
                continue;
            }
            let (Ok(history), Ok(ready_history), Ok(&stats), Ok(&transform), Ok(&team), Ok(&owner)) = (
                store.get::<AbilityHistory>(champion),
                store.get::<AbilityReadyHistory>(champion),
                store.get::<AbilityStats>(champion),
                store.get::<Transform>(champion),
                store.get::<Team>(champion),
                store.get::<Owner>(champion),
            ) else {
                continue;
            };

            let Ok((_, &command)) = history.0.at_tick(tick) else {
                continue;
            };
            if !command.cast {
                continue;
            }

            let cooling = ready_at_for(ready_history, tick, batch.batch_size)
                .is_some_and(|ready_at| ready_at.is_newer_than(tick));
            if cooling || !batch.is_first_full_prediction {
                continue;
            }

            let aim = command.aim;
            let to_aim = aim - transform.position;
            let yaw = to_aim.x.atan2(to_aim.z);
            store
                .spawn()
                .with(Projectile)
                .with(team)
                .with(AttackDamage(stats.damage))
                .with(AlreadyDamaged::default())
                .with(Transform {
                    position: transform.position,
                    yaw,
                    scale: 1.0,
                })
                .with(MoveSpeed::new(ABILITY_PROJECTILE_SPEED))
                .with(LanePath {
                    waypoints: vec![aim],
                    next: 0,
                })
                .with(DespawnAfter {
                    seconds: ABILITY_PROJECTILE_LIFETIME_SECONDS,
                })
                .with(DespawnAtTick::default())
                .finish();

            if self.records_history_for(&owner) {
                let record_tick = tick.add(1);
                let ready_at = record_tick.add(self.rate.ticks_for_seconds(stats.cooldown_seconds));
                if let Ok(ready_history) = store.get_mut::<AbilityReadyHistory>(champion) {
                    ready_history.0.record(record_tick, ready_at);
                }
            }
            trace!(%champion, %tick, "cast ability");
        }
    }
}

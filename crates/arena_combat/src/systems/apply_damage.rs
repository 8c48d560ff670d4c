//! Damage application and death.
//!
//! Drains every pending damage buffer, subtracts hit points, and emits the
//! visual damage numbers. Death branches by unit class: champions are never
//! destroyed — hit points clamp to zero, the dead flag flips on, the body is
//! parked off-stage, and a respawn record is queued. Everything else gets a
//! short despawn timer, and every opposing player collects the config-table
//! kill gold.

use std::sync::Arc;

use arena_clock::Tick;
use arena_ecs::{ComponentStore, ComponentTypeId, Entity};
use arena_replication::{Authority, Owner, PeerId};
use arena_schedule::ExclusiveSystem;
use tracing::{debug, info};

use crate::components::{
    Champion, DamageBuffer, Dead, DespawnAfter, DespawnAtTick, GoldPurse, HitPoints,
    RespawnDelay, RespawnQueue, RespawnRecord, Team, Transform, UnitLevel, UnitTypeIndex,
};
use crate::config::UnitConfigTable;
use crate::events::{VisualEvent, VisualEvents, VisualKind};
use crate::systems::{is_dead, singleton};

/// Non-champion corpses linger this long before despawning.
const CORPSE_LINGER_SECONDS: f32 = 0.2;
/// Respawn delay used when the match singleton carries no [`RespawnDelay`].
const DEFAULT_RESPAWN_DELAY_TICKS: u32 = 300;

/// Applies pending damage and resolves deaths.
pub struct ApplyDamage {
    config: Arc<UnitConfigTable>,
    authority: Authority,
}

impl ApplyDamage {
    /// A damage system reading kill bounties from `config`.
    #[must_use]
    pub fn new(config: Arc<UnitConfigTable>, authority: Authority) -> Self {
        Self { config, authority }
    }

    fn kill_gold(&self, store: &ComponentStore, victim: Entity) -> i32 {
        match (
            store.get::<UnitTypeIndex>(victim),
            store.get::<UnitLevel>(victim),
        ) {
            (Ok(type_index), Ok(level)) => self.config.stats(type_index.0, level.0).kill_gold,
            _ => 0,
        }
    }

    fn kill_champion(&self, store: &mut ComponentStore, champion: Entity, tick: Tick) {
        if let Ok(hp) = store.get_mut::<HitPoints>(champion) {
            hp.current = 0;
        }
        let _ = store.set_enabled::<Dead>(champion, true);
        // Park the body far away so physics and targeting ignore it.
        let _ = store.insert(champion, Transform::off_stage());

        let peer = store
            .get::<Owner>(champion)
            .map(|owner| owner.peer)
            .unwrap_or(PeerId(uuid::Uuid::nil()));
        let delay = singleton::<RespawnDelay>(store)
            .and_then(|e| store.get::<RespawnDelay>(e).ok())
            .map(|d| d.ticks)
            .unwrap_or(DEFAULT_RESPAWN_DELAY_TICKS);
        let record = RespawnRecord {
            champion,
            at: tick.add(delay),
            peer,
        };
        if let Some(queue_entity) = singleton::<RespawnQueue>(store)
            && let Ok(queue) = store.get_mut::<RespawnQueue>(queue_entity)
        {
            queue.0.push(record);
        }
        info!(%champion, %peer, respawn_at = %record.at, "champion died");
    }

    fn kill_unit(&self, store: &mut ComponentStore, victim: Entity, tick: Tick) {
        let _ = store.insert(
            victim,
            DespawnAfter {
                seconds: CORPSE_LINGER_SECONDS,
            },
        );
        let _ = store.insert(victim, DespawnAtTick::default());

        let Ok(&victim_team) = store.get::<Team>(victim) else {
            return;
        };
        let gold = self.kill_gold(store, victim);
        if gold > 0 {
            for player in
                store.entities_with(&[ComponentTypeId::of::<GoldPurse>(), ComponentTypeId::of::<Team>()])
            {
                let opposing = store
                    .get::<Team>(player)
                    .map(|&t| t != victim_team)
                    .unwrap_or(false);
                if opposing && let Ok(purse) = store.get_mut::<GoldPurse>(player) {
                    purse.grant(gold);
                }
            }
            let _ = store.append::<VisualEvents>(
                victim,
                VisualEvent {
                    amount: gold,
                    kind: VisualKind::Bounty,
                    tick,
                },
            );
        }
        debug!(%victim, gold, "unit killed");
    }
}

impl ExclusiveSystem for ApplyDamage {
    fn name(&self) -> &'static str {
        "apply_damage"
    }

    fn run(&mut self, store: &mut ComponentStore, tick: Tick) {
        let damaged = store.entities_with(&[
            ComponentTypeId::of::<DamageBuffer>(),
            ComponentTypeId::of::<HitPoints>(),
        ]);

        for entity in damaged {
            let Ok(buffer) = store.get_mut::<DamageBuffer>(entity) else {
                continue;
            };
            let pending = std::mem::take(&mut buffer.0);
            if pending.is_empty() {
                continue;
            }

            let mut total = 0;
            for damage in pending {
                total += damage;
                if damage > 0 {
                    let _ = store.append::<VisualEvents>(
                        entity,
                        VisualEvent {
                            amount: damage,
                            kind: VisualKind::Damage,
                            tick,
                        },
                    );
                }
            }
            if total <= 0 {
                continue;
            }

            let Ok(hp) = store.get_mut::<HitPoints>(entity) else {
                continue;
            };
            hp.current -= total;
            let died = hp.current <= 0;

            // Death is server-authoritative; clients wait for the
            // correction.
            if died && !is_dead(store, entity) && self.authority.is_server() {
                if store.has::<Champion>(entity) {
                    self.kill_champion(store, entity, tick);
                } else {
                    self.kill_unit(store, entity, tick);
                }
            }
        }
    }
}

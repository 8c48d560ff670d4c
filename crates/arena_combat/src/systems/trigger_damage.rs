//! Trigger-event damage resolution.
//!
//! Consumes the step's broad-phase overlap feed and turns dealer/victim
//! pairs into deferred damage appends. A victim is hit at most once per
//! dealer: once via the dealer's persistent already-damaged buffer, and
//! once more within the pass via a concurrent dedup set (two events for the
//! same pair can land in the same step).

use dashmap::DashSet;

use arena_ecs::{ComponentStore, ComponentTypeId, Entity};
use arena_schedule::{ParallelSystem, SystemAccess, SystemContext};

use crate::components::{AlreadyDamaged, AttackDamage, DamageBuffer, Dead, HitPoints, Team};
use crate::spatial::TriggerFeed;
use crate::systems::{is_dead, singleton};

/// Resolves trigger events into pending damage.
#[derive(Debug, Default)]
pub struct TriggerDamage;

/// A dealer carries damage and the already-damaged buffer; a victim can
/// receive damage.
fn classify(store: &ComponentStore, a: Entity, b: Entity) -> Option<(Entity, Entity)> {
    let is_dealer = |e: Entity| store.has::<AttackDamage>(e) && store.has::<AlreadyDamaged>(e);
    let is_victim = |e: Entity| store.has::<HitPoints>(e) && store.has::<DamageBuffer>(e);
    if is_dealer(a) && is_victim(b) {
        Some((a, b))
    } else if is_dealer(b) && is_victim(a) {
        Some((b, a))
    } else {
        None
    }
}

impl ParallelSystem for TriggerDamage {
    fn name(&self) -> &'static str {
        "trigger_damage"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .read(ComponentTypeId::of::<TriggerFeed>())
            .read(ComponentTypeId::of::<AttackDamage>())
            .read(ComponentTypeId::of::<HitPoints>())
            .read(ComponentTypeId::of::<Team>())
            .read(ComponentTypeId::of::<Dead>())
            .deferred_write(ComponentTypeId::of::<DamageBuffer>())
            .deferred_write(ComponentTypeId::of::<AlreadyDamaged>())
    }

    fn run(&self, ctx: &SystemContext<'_>) {
        let store = ctx.store();
        let Some(feed_entity) = singleton::<TriggerFeed>(store) else {
            return;
        };
        let Ok(feed) = store.get::<TriggerFeed>(feed_entity) else {
            return;
        };
        // Body-index order fixes the playback sort keys independently of
        // the order the broad-phase emitted the events in.
        let mut events = feed.0.clone();
        events.sort_by_key(|event| (event.body_index, event.first, event.second));

        let hit_this_pass: DashSet<(Entity, Entity)> = DashSet::new();

        ctx.par_chunks(&events, 1, |chunk, commands| {
            for event in chunk {
                let Some((dealer, victim)) = classify(store, event.first, event.second) else {
                    continue;
                };
                if is_dead(store, victim) {
                    continue;
                }
                // Friendly fire is off.
                let same_team = match (store.get::<Team>(dealer), store.get::<Team>(victim)) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                };
                if same_team {
                    continue;
                }
                let Ok(already) = store.get::<AlreadyDamaged>(dealer) else {
                    continue;
                };
                if already.0.contains(&victim) || !hit_this_pass.insert((dealer, victim)) {
                    continue;
                }
                let Ok(damage) = store.get::<AttackDamage>(dealer) else {
                    continue;
                };
                commands.append::<DamageBuffer>(victim, damage.0);
                commands.append::<AlreadyDamaged>(dealer, victim);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::components::Projectile;

    use super::*;

    fn dealer(store: &mut ComponentStore, team: u8, damage: i32) -> Entity {
        store
            .spawn()
            .with(Projectile)
            .with(Team { index: team })
            .with(AttackDamage(damage))
            .with(AlreadyDamaged::default())
            .finish()
    }

    fn victim(store: &mut ComponentStore, team: u8, hp: i32) -> Entity {
        store
            .spawn()
            .with(Team { index: team })
            .with(HitPoints::full(hp))
            .with(DamageBuffer::default())
            .finish()
    }

    #[test]
    fn test_classify_is_direction_agnostic() {
        let mut store = ComponentStore::new();
        let d = dealer(&mut store, 0, 5);
        let v = victim(&mut store, 1, 100);
        assert_eq!(classify(&store, d, v), Some((d, v)));
        assert_eq!(classify(&store, v, d), Some((d, v)));
    }

    #[test]
    fn test_two_victims_do_not_classify() {
        let mut store = ComponentStore::new();
        let a = victim(&mut store, 0, 100);
        let b = victim(&mut store, 1, 100);
        assert_eq!(classify(&store, a, b), None);
    }
}

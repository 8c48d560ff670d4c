//! Champion respawns.
//!
//! Due respawn records bring a champion back exactly once: teleport to the
//! spawn point, restore full hit points, clear the dead flag, drop the
//! record. Only the authoritative side processes the queue, and only on the
//! first full prediction of a tick.

use arena_clock::Tick;
use arena_ecs::ComponentStore;
use arena_replication::Authority;
use arena_schedule::ExclusiveSystem;
use tracing::info;

use crate::components::{Dead, HitPoints, RespawnQueue, SpawnPoint, Transform};
use crate::systems::{prediction_batch, singleton};

/// Processes the respawn queue.
pub struct Respawn {
    authority: Authority,
}

impl Respawn {
    /// A respawn system simulating as `authority`.
    #[must_use]
    pub fn new(authority: Authority) -> Self {
        Self { authority }
    }
}

impl ExclusiveSystem for Respawn {
    fn name(&self) -> &'static str {
        "respawn"
    }

    fn run(&mut self, store: &mut ComponentStore, tick: Tick) {
        if !self.authority.is_server() || !prediction_batch(store).is_first_full_prediction {
            return;
        }
        let Some(queue_entity) = singleton::<RespawnQueue>(store) else {
            return;
        };
        let Ok(queue) = store.get_mut::<RespawnQueue>(queue_entity) else {
            return;
        };
        let records = std::mem::take(&mut queue.0);
        let (due, pending): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| !r.at.is_newer_than(tick));

        for record in due {
            let champion = record.champion;
            if !store.contains(champion) {
                continue;
            }
            let spawn_position = store
                .get::<SpawnPoint>(champion)
                .map(|p| p.position)
                .unwrap_or_default();
            let _ = store.insert(champion, Transform::at(spawn_position));
            if let Ok(hp) = store.get_mut::<HitPoints>(champion) {
                hp.current = hp.max;
            }
            let _ = store.set_enabled::<Dead>(champion, false);
            info!(%champion, peer = %record.peer, %tick, "champion respawned");
        }

        if let Ok(queue) = store.get_mut::<RespawnQueue>(queue_entity) {
            queue.0 = pending;
        }
    }
}

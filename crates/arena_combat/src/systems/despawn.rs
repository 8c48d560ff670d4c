//! Timed despawns and match end.
//!
//! The deadline component starts invalid and is resolved here from the
//! relative timer — a value write, not a structural change, so prediction
//! replay stays cheap. When a deadline arrives the entity is destroyed; if
//! it was a match-critical structure, the match ends in favour of the
//! opposing team first.

use arena_clock::{Tick, TickRate};
use arena_ecs::{ComponentStore, ComponentTypeId};
use arena_schedule::ExclusiveSystem;
use tracing::{debug, info};

use crate::components::{
    DespawnAfter, DespawnAtTick, GameOverOnDestroy, MatchPhase, MatchState, Team,
};
use crate::systems::singleton;

/// Destroys entities whose despawn deadline has arrived.
pub struct Despawn {
    rate: TickRate,
}

impl Despawn {
    /// A despawn system stepping at the given rate.
    #[must_use]
    pub fn new(rate: TickRate) -> Self {
        Self { rate }
    }
}

impl ExclusiveSystem for Despawn {
    fn name(&self) -> &'static str {
        "despawn"
    }

    fn run(&mut self, store: &mut ComponentStore, tick: Tick) {
        let timed = store.entities_with(&[
            ComponentTypeId::of::<DespawnAfter>(),
            ComponentTypeId::of::<DespawnAtTick>(),
        ]);

        for entity in timed {
            let (Ok(&after), Ok(&at)) = (
                store.get::<DespawnAfter>(entity),
                store.get::<DespawnAtTick>(entity),
            ) else {
                continue;
            };

            if !at.tick.is_valid() {
                let deadline = tick.add(self.rate.ticks_for_seconds(after.seconds));
                if let Ok(at) = store.get_mut::<DespawnAtTick>(entity) {
                    at.tick = deadline;
                }
                continue;
            }
            if at.tick.is_newer_than(tick) {
                continue;
            }

            if store.has::<GameOverOnDestroy>(entity) {
                let winner = store
                    .get::<Team>(entity)
                    .map(|team| team.opposing())
                    .unwrap_or(Team { index: 0 });
                if let Some(match_entity) = singleton::<MatchState>(store)
                    && let Ok(state) = store.get_mut::<MatchState>(match_entity)
                    && state.phase != MatchPhase::Over
                {
                    state.phase = MatchPhase::Over;
                    state.winning_team = Some(winner);
                    info!(winning_team = winner.index, "match over");
                }
            }

            debug!(%entity, %tick, "despawning");
            let _ = store.despawn(entity);
        }
    }
}

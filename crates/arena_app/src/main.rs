//! Headless match runner.
//!
//! Assembles a server-authoritative world, joins two players, and simulates
//! a bounded match with scripted champion input. Useful for balance smoke
//! tests and for profiling the schedule without any networking attached.

use std::sync::Arc;

use anyhow::Context;
use arena_app::{Simulation, SimulationConfig, StepInput, projectile_contacts};
use arena_combat::{
    CastCommand, Champion, GoldPurse, JoinOutcome, JoinRequest, MatchPhase, MoveCommand,
    Transform, UnitConfigTable,
};
use arena_ecs::ComponentTypeId;
use arena_replication::{Owner, PeerId};
use glam::Vec3;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Projectiles connect within this distance of a body.
const HIT_RADIUS: f32 = 0.75;
/// Hard cap on simulated ticks (one minute at the default rate).
const MAX_TICKS: u32 = 3600;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = SimulationConfig::default();
    if let Some(path) = std::env::args().nth(1) {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading unit config from {path}"))?;
        config.units = Arc::new(
            UnitConfigTable::from_json(&json)
                .with_context(|| format!("parsing unit config from {path}"))?,
        );
        info!(path, "loaded unit config");
    }
    let mut sim = Simulation::new(config)?;

    let peers = [PeerId::random(), PeerId::random()];
    for peer in peers {
        match sim.join(JoinRequest {
            peer,
            requested_team: None,
        }) {
            JoinOutcome::Champion(champion) => info!(%peer, %champion, "joined"),
            JoinOutcome::Spectator => anyhow::bail!("player rejected from an empty match"),
        }
    }

    // Scripted input: both champions push toward the enemy base and cast on
    // cooldown.
    let destinations = [Vec3::new(18.0, 0.0, 0.0), Vec3::new(-18.0, 0.0, 0.0)];
    for elapsed in 0..MAX_TICKS {
        let mut input = StepInput {
            trigger_events: projectile_contacts(sim.store(), HIT_RADIUS),
            ..StepInput::default()
        };
        for (peer, destination) in peers.iter().zip(destinations) {
            input.moves.push((*peer, MoveCommand { destination }));
            if elapsed % 240 == 0 {
                input.casts.push((
                    *peer,
                    CastCommand {
                        cast: true,
                        aim: destination,
                    },
                ));
            }
        }
        sim.step(input);

        if sim
            .match_state()
            .is_some_and(|state| state.phase == MatchPhase::Over)
        {
            break;
        }
    }

    let state = sim.match_state().context("match singleton lost")?;
    info!(
        tick = %sim.current_tick(),
        phase = ?state.phase,
        winner = ?state.winning_team,
        entities = sim.store().entity_count(),
        "match finished"
    );
    for champion in sim.store().entities_with(&[
        ComponentTypeId::of::<Champion>(),
        ComponentTypeId::of::<GoldPurse>(),
    ]) {
        let peer = sim.store().get::<Owner>(champion).map(|o| o.peer);
        let gold = sim.store().get::<GoldPurse>(champion).map(|g| g.current);
        let position = sim
            .store()
            .get::<Transform>(champion)
            .map(|t| t.position)
            .unwrap_or_default();
        info!(%champion, ?peer, ?gold, ?position, "champion summary");
    }
    Ok(())
}

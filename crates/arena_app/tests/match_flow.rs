//! End-to-end match behaviour through the assembled simulation.

use std::sync::Arc;

use arena_app::{Simulation, SimulationConfig, StepInput, default_unit_table};
use arena_clock::Tick;
use arena_combat::{
    AlreadyDamaged, AttackDamage, CastCommand, Champion, DamageBuffer, Dead, DespawnAfter,
    DespawnAtTick, GameOverOnDestroy, GoldPurse, HitPoints, JoinOutcome, JoinRequest, MatchPhase,
    Minion, MoveCommand, Projectile, Structure, Target, Team, Transform, TriggerEvent,
    VisualEvents, VisualKind,
};
use arena_ecs::{ComponentTypeId, Entity};
use arena_replication::PeerId;
use glam::Vec3;
use uuid::Uuid;

fn fixed_peer(n: u128) -> PeerId {
    PeerId(Uuid::from_u128(n))
}

fn quick_sim() -> Simulation {
    Simulation::new(SimulationConfig {
        lanes: Vec::new(),
        respawn_delay_ticks: 30,
        ..SimulationConfig::default()
    })
    .unwrap()
}

fn join_champion(sim: &mut Simulation, peer: PeerId) -> Entity {
    match sim.join(JoinRequest {
        peer,
        requested_team: None,
    }) {
        JoinOutcome::Champion(champion) => champion,
        JoinOutcome::Spectator => panic!("join rejected"),
    }
}

fn step_empty(sim: &mut Simulation, ticks: u32) {
    for _ in 0..ticks {
        sim.step(StepInput::default());
    }
}

fn spawn_dealer(sim: &mut Simulation, team: u8, damage: i32, position: Vec3) -> Entity {
    sim.store_mut()
        .spawn()
        .with(Projectile)
        .with(Team { index: team })
        .with(AttackDamage(damage))
        .with(AlreadyDamaged::default())
        .with(Transform::at(position))
        .finish()
}

fn hit(dealer: Entity, victim: Entity) -> TriggerEvent {
    TriggerEvent {
        first: dealer,
        second: victim,
        body_index: victim.index(),
    }
}

fn projectile_count(sim: &Simulation) -> usize {
    sim.store()
        .entities_with(&[ComponentTypeId::of::<Projectile>()])
        .len()
}

#[test]
fn test_countdown_then_playing() {
    let mut sim = quick_sim();
    join_champion(&mut sim, fixed_peer(1));
    join_champion(&mut sim, fixed_peer(2));
    assert_eq!(sim.match_state().unwrap().phase, MatchPhase::Countdown);

    // Countdown is five seconds at sixty ticks per second.
    step_empty(&mut sim, 302);
    assert_eq!(sim.match_state().unwrap().phase, MatchPhase::Playing);
}

#[test]
fn test_champion_death_clamps_and_respawns() {
    let mut sim = quick_sim();
    join_champion(&mut sim, fixed_peer(1));
    let victim = join_champion(&mut sim, fixed_peer(2));
    let spawn_position = sim.store().get::<Transform>(victim).unwrap().position;

    let dealer = spawn_dealer(&mut sim, 0, 150, spawn_position);
    sim.step(StepInput {
        trigger_events: vec![hit(dealer, victim)],
        ..StepInput::default()
    });

    // Overkill clamps to zero; the champion is parked off-stage, not
    // destroyed.
    let hp = sim.store().get::<HitPoints>(victim).unwrap();
    assert_eq!(hp.current, 0);
    assert!(sim.store().is_enabled::<Dead>(victim).unwrap());
    assert!(sim.store().get::<Transform>(victim).unwrap().position.y < -1000.0);
    assert!(sim.store().contains(victim));

    // Thirty ticks later the champion is back at its spawn at full health.
    step_empty(&mut sim, 31);
    assert!(!sim.store().is_enabled::<Dead>(victim).unwrap());
    let hp = sim.store().get::<HitPoints>(victim).unwrap();
    assert_eq!(hp.current, hp.max);
    assert_eq!(
        sim.store().get::<Transform>(victim).unwrap().position,
        spawn_position
    );
}

#[test]
fn test_minion_kill_grants_gold_and_bounty() {
    let mut sim = quick_sim();
    let ally = join_champion(&mut sim, fixed_peer(1));
    let enemy = join_champion(&mut sim, fixed_peer(2));

    let minion_position = Vec3::new(0.0, 0.0, 30.0);
    let minion = sim
        .store_mut()
        .spawn()
        .with(Minion)
        .with(Team { index: 1 })
        .with(Transform::at(minion_position))
        .with(HitPoints::full(5))
        .with(DamageBuffer::default())
        .with(VisualEvents::default())
        .with(arena_combat::UnitTypeIndex(1))
        .with(arena_combat::UnitLevel(0))
        .finish();
    let dealer = spawn_dealer(&mut sim, 0, 50, minion_position);

    sim.step(StepInput {
        trigger_events: vec![hit(dealer, minion)],
        ..StepInput::default()
    });

    // The melee row pays five gold to each opposing player, nothing to the
    // victim's own team.
    assert_eq!(sim.store().get::<GoldPurse>(ally).unwrap().current, 5);
    assert_eq!(sim.store().get::<GoldPurse>(enemy).unwrap().current, 0);
    let events = sim.store().get::<VisualEvents>(minion).unwrap();
    assert!(events.events().iter().any(|e| e.kind == VisualKind::Bounty));
    assert!(events.events().iter().any(|e| e.kind == VisualKind::Damage));

    // The corpse lingers briefly, then despawns.
    step_empty(&mut sim, 15);
    assert!(!sim.store().contains(minion));
}

#[test]
fn test_duplicate_trigger_events_damage_once() {
    let mut sim = quick_sim();
    let victim = sim
        .store_mut()
        .spawn()
        .with(Team { index: 1 })
        .with(Transform::at(Vec3::new(0.0, 0.0, 30.0)))
        .with(HitPoints::full(100))
        .with(DamageBuffer::default())
        .with(VisualEvents::default())
        .finish();
    let dealer = spawn_dealer(&mut sim, 0, 10, Vec3::new(0.0, 0.0, 30.0));

    // The broad-phase can report the same overlap twice in one step.
    sim.step(StepInput {
        trigger_events: vec![hit(dealer, victim), hit(dealer, victim)],
        ..StepInput::default()
    });
    assert_eq!(sim.store().get::<HitPoints>(victim).unwrap().current, 90);

    // And again on the next step while the overlap persists.
    sim.step(StepInput {
        trigger_events: vec![hit(dealer, victim)],
        ..StepInput::default()
    });
    assert_eq!(sim.store().get::<HitPoints>(victim).unwrap().current, 90);
}

#[test]
fn test_resimulation_does_not_duplicate_projectiles() {
    let mut sim = quick_sim();
    let attacker = join_champion(&mut sim, fixed_peer(1));
    let attacker_position = sim.store().get::<Transform>(attacker).unwrap().position;
    // A durable dummy inside attack range.
    sim.store_mut()
        .spawn()
        .with(Team { index: 1 })
        .with(Transform::at(attacker_position + Vec3::new(3.0, 0.0, 0.0)))
        .with(HitPoints::full(10_000))
        .with(DamageBuffer::default())
        .finish();

    step_empty(&mut sim, 5);
    let fired = projectile_count(&sim);
    assert_eq!(fired, 1);

    // Replaying the span that contains the shot must not fire it again.
    sim.resimulate(Tick::new(0));
    assert_eq!(sim.current_tick(), Tick::new(5));
    assert_eq!(projectile_count(&sim), fired);
}

#[test]
fn test_destroyed_target_is_dropped() {
    let mut sim = quick_sim();
    let attacker = join_champion(&mut sim, fixed_peer(1));
    let attacker_position = sim.store().get::<Transform>(attacker).unwrap().position;
    let dummy = sim
        .store_mut()
        .spawn()
        .with(Team { index: 1 })
        .with(Transform::at(attacker_position + Vec3::new(3.0, 0.0, 0.0)))
        .with(HitPoints::full(10_000))
        .with(DamageBuffer::default())
        .finish();

    step_empty(&mut sim, 1);
    assert_eq!(
        sim.store().get::<Target>(attacker).unwrap().entity,
        Some(dummy)
    );

    // The target disappears outside the schedule (e.g. a server despawn).
    sim.store_mut().despawn(dummy).unwrap();
    step_empty(&mut sim, 1);
    assert_eq!(sim.store().get::<Target>(attacker).unwrap().entity, None);
}

#[test]
fn test_core_destruction_ends_match() {
    let mut sim = quick_sim();
    join_champion(&mut sim, fixed_peer(1));
    join_champion(&mut sim, fixed_peer(2));

    sim.store_mut()
        .spawn()
        .with(Structure)
        .with(GameOverOnDestroy)
        .with(Team { index: 1 })
        .with(Transform::at(Vec3::new(20.0, 0.0, 10.0)))
        .with(DespawnAfter { seconds: 0.0 })
        .with(DespawnAtTick::default())
        .finish();

    step_empty(&mut sim, 2);
    let state = sim.match_state().unwrap();
    assert_eq!(state.phase, MatchPhase::Over);
    assert_eq!(state.winning_team, Some(Team { index: 0 }));
}

#[test]
fn test_identical_inputs_reproduce_identical_state() {
    let run_match = || {
        let mut sim = Simulation::new(SimulationConfig {
            units: Arc::new(default_unit_table()),
            respawn_delay_ticks: 60,
            ..SimulationConfig::default()
        })
        .unwrap();
        let peers = [fixed_peer(0xA), fixed_peer(0xB)];
        for peer in peers {
            join_champion(&mut sim, peer);
        }

        // Covers countdown, match start, a minion wave, champion movement,
        // casts and projectile hits.
        let destinations = [Vec3::new(18.0, 0.0, 0.0), Vec3::new(-18.0, 0.0, 0.0)];
        for elapsed in 0..400u32 {
            let mut input = StepInput {
                trigger_events: arena_app::projectile_contacts(sim.store(), 0.75),
                ..StepInput::default()
            };
            for (peer, destination) in peers.iter().zip(destinations) {
                input.moves.push((*peer, MoveCommand { destination }));
                if elapsed % 120 == 0 {
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
        }

        let mut fingerprint: Vec<u8> = Vec::new();
        for entity in sim
            .store()
            .entities_with(&[ComponentTypeId::of::<Transform>()])
        {
            fingerprint.extend(
                sim.snapshot(entity, ComponentTypeId::of::<Transform>())
                    .unwrap(),
            );
        }
        for champion in sim
            .store()
            .entities_with(&[ComponentTypeId::of::<Champion>()])
        {
            fingerprint.extend(
                sim.snapshot(champion, ComponentTypeId::of::<HitPoints>())
                    .unwrap(),
            );
            fingerprint.extend(
                sim.snapshot(champion, ComponentTypeId::of::<GoldPurse>())
                    .unwrap(),
            );
        }
        (sim.store().entity_count(), fingerprint)
    };

    assert_eq!(run_match(), run_match());
}

//! Match entry: joins, champion spawning, minion waves, match start.

use std::sync::Arc;

use arena_clock::{Tick, TickRate};
use arena_ecs::{ComponentStore, Entity};
use arena_replication::{Authority, Owner, PeerId};
use arena_schedule::ExclusiveSystem;
use glam::Vec3;
use tracing::{info, warn};

use crate::components::{
    AbilityHistory, AbilityReadyHistory, AbilityStats, AttackCooldown, AttackDamage,
    AttackRange, AttackReadyHistory, Champion, DamageBuffer, Dead, GoldPurse, HitPoints,
    LanePath, MatchPhase, MatchState, Minion, MoveHistory, MoveSpeed, SpawnPoint, Target,
    TargetSearchTimer, Team, Transform, UnitLevel, UnitTypeIndex,
};
use crate::config::UnitConfigTable;
use crate::events::VisualEvents;
use crate::systems::singleton;

/// Players per team.
pub const MAX_PLAYERS_PER_TEAM: u8 = 5;
/// Joined players needed before the countdown starts.
pub const PLAYERS_TO_START: u8 = 2;
/// Countdown length in seconds once enough players joined.
pub const COUNTDOWN_SECONDS: f32 = 5.0;
/// Purse capacity.
pub const MAX_GOLD: i32 = 1000;

/// Base spawn position per team.
const TEAM_SPAWNS: [Vec3; 2] = [Vec3::new(-20.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)];
/// Lateral offset between teammate spawn slots.
const SLOT_OFFSET: f32 = 2.0;

/// A peer asking to enter the match.
#[derive(Debug, Clone, Copy)]
pub struct JoinRequest {
    /// The joining peer.
    pub peer: PeerId,
    /// Requested team, if the player picked one.
    pub requested_team: Option<u8>,
}

/// Result of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The peer got a champion.
    Champion(Entity),
    /// Both teams are full; the peer spectates.
    Spectator,
}

/// Handle a join: pick a team, spawn the champion, maybe start the
/// countdown.
///
/// Team choice honours the request when that team has room, otherwise
/// auto-balances to the smaller team. With both teams full the peer becomes
/// a spectator.
pub fn handle_join(
    store: &mut ComponentStore,
    config: &UnitConfigTable,
    rate: TickRate,
    request: JoinRequest,
    now: Tick,
) -> JoinOutcome {
    let Some(match_entity) = singleton::<MatchState>(store) else {
        warn!("join received before the match singleton exists");
        return JoinOutcome::Spectator;
    };
    let state = match store.get::<MatchState>(match_entity) {
        Ok(state) => *state,
        Err(_) => return JoinOutcome::Spectator,
    };

    let team = match request.requested_team {
        Some(team) if team < 2 && state.players[team as usize] < MAX_PLAYERS_PER_TEAM => team,
        _ => {
            // Auto-balance: the smaller team, ties to team 0.
            if state.players[0] <= state.players[1] {
                0
            } else {
                1
            }
        }
    };
    if state.players[team as usize] >= MAX_PLAYERS_PER_TEAM {
        warn!(peer = %request.peer, "both teams full, joining as spectator");
        return JoinOutcome::Spectator;
    }

    let slot = state.players[team as usize];
    let spawn_position =
        TEAM_SPAWNS[team as usize] + Vec3::new(0.0, 0.0, f32::from(slot) * SLOT_OFFSET);
    let champion_type = config.type_index("champion").unwrap_or(0);
    let stats = config.stats(champion_type, 0);

    let champion = store
        .spawn()
        .with(Champion)
        .with(Team { index: team })
        .with(Owner { peer: request.peer })
        .with(Transform::at(spawn_position))
        .with(SpawnPoint {
            position: spawn_position,
        })
        .with(MoveSpeed::new(stats.move_speed))
        .with(HitPoints::full(stats.hit_points))
        .with(AttackDamage(stats.attack_damage))
        .with(AttackRange(4.0))
        .with(AttackCooldown { seconds: 1.0 })
        .with(Target::default())
        .with(TargetSearchTimer::ready())
        .with(Dead)
        .with(DamageBuffer::default())
        .with(VisualEvents::default())
        .with(MoveHistory::default())
        .with(AbilityHistory::default())
        .with(AttackReadyHistory::default())
        .with(AbilityReadyHistory::default())
        .with(AbilityStats {
            cooldown_seconds: 4.0,
            damage: stats.attack_damage * 2,
        })
        .with(GoldPurse {
            current: 0,
            max: MAX_GOLD,
        })
        .with(UnitTypeIndex(champion_type))
        .with(UnitLevel(0))
        .finish();
    // Champions spawn alive; the dead flag is toggled, never removed.
    let _ = store.set_enabled::<Dead>(champion, false);

    if let Ok(state) = store.get_mut::<MatchState>(match_entity) {
        state.players[team as usize] += 1;
        let total = state.players[0] + state.players[1];
        if state.phase == MatchPhase::Lobby && total >= PLAYERS_TO_START {
            state.phase = MatchPhase::Countdown;
            state.game_start_tick = now.add(rate.ticks_for_seconds(COUNTDOWN_SECONDS));
            info!(start_tick = %state.game_start_tick, "match countdown started");
        }
    }
    info!(peer = %request.peer, team, %champion, "player joined");
    JoinOutcome::Champion(champion)
}

/// One minion lane: which team marches down it and its waypoints.
#[derive(Debug, Clone)]
pub struct Lane {
    /// The team spawning on this lane.
    pub team: Team,
    /// March waypoints from spawn to the enemy base.
    pub waypoints: Vec<Vec3>,
}

/// Spawns periodic minion waves once the match is playing.
///
/// Also flips the match from countdown to playing when the start tick
/// arrives. Runs on the server only; clients receive minions through
/// replication.
pub struct WaveSpawner {
    config: Arc<UnitConfigTable>,
    rate: TickRate,
    authority: Authority,
    lanes: Vec<Lane>,
    interval_ticks: u32,
    wave_level: u8,
    next_wave: Tick,
}

impl WaveSpawner {
    /// Seconds between waves.
    pub const WAVE_INTERVAL_SECONDS: f32 = 15.0;

    /// A wave spawner for the given lanes.
    #[must_use]
    pub fn new(
        config: Arc<UnitConfigTable>,
        rate: TickRate,
        authority: Authority,
        lanes: Vec<Lane>,
    ) -> Self {
        let interval_ticks = rate.ticks_for_seconds(Self::WAVE_INTERVAL_SECONDS);
        Self {
            config,
            rate,
            authority,
            lanes,
            interval_ticks,
            wave_level: 0,
            next_wave: Tick::INVALID,
        }
    }

    /// Raise the level of subsequently spawned waves.
    pub fn set_wave_level(&mut self, level: u8) {
        self.wave_level = level;
    }

    fn spawn_wave(&self, store: &mut ComponentStore, tick: Tick) {
        let minion_type = self.config.type_index("melee").unwrap_or(0);
        let stats = self.config.stats(minion_type, self.wave_level).clone();
        for lane in &self.lanes {
            let Some(&origin) = lane.waypoints.first() else {
                continue;
            };
            for unit in 0..stats.unit_count {
                let offset = Vec3::new(0.0, 0.0, unit as f32 * stats.model_radius * 2.5);
                let minion = store
                    .spawn()
                    .with(Minion)
                    .with(lane.team)
                    .with(Transform::at(origin + offset))
                    .with(MoveSpeed::new(stats.move_speed))
                    .with(HitPoints::full(stats.hit_points))
                    .with(AttackDamage(stats.attack_damage))
                    .with(AttackRange(2.0))
                    .with(AttackCooldown { seconds: 1.5 })
                    .with(Target::default())
                    .with(TargetSearchTimer::ready())
                    .with(Dead)
                    .with(DamageBuffer::default())
                    .with(VisualEvents::default())
                    .with(AttackReadyHistory::default())
                    .with(LanePath {
                        waypoints: lane.waypoints.clone(),
                        next: 0,
                    })
                    .with(UnitTypeIndex(minion_type))
                    .with(UnitLevel(self.wave_level))
                    .finish();
                let _ = store.set_enabled::<Dead>(minion, false);
            }
        }
        info!(%tick, lanes = self.lanes.len(), level = self.wave_level, "minion wave spawned");
    }
}

impl ExclusiveSystem for WaveSpawner {
    fn name(&self) -> &'static str {
        "wave_spawner"
    }

    fn run(&mut self, store: &mut ComponentStore, tick: Tick) {
        let Some(match_entity) = singleton::<MatchState>(store) else {
            return;
        };
        let Ok(state) = store.get_mut::<MatchState>(match_entity) else {
            return;
        };
        if state.phase == MatchPhase::Countdown
            && state.game_start_tick.is_valid()
            && !state.game_start_tick.is_newer_than(tick)
        {
            state.phase = MatchPhase::Playing;
            info!(%tick, "match started");
        }
        if state.phase != MatchPhase::Playing || !self.authority.is_server() {
            return;
        }

        if !self.next_wave.is_valid() {
            self.next_wave = tick.add(self.rate.ticks_for_seconds(1.0));
        }
        if self.next_wave.is_newer_than(tick) {
            return;
        }
        self.spawn_wave(store, tick);
        self.next_wave = self.next_wave.add(self.interval_ticks);
    }
}

//! The assembled simulation.
//!
//! Glues the store, the tick clock, the system schedule and the replication
//! policy into one steppable world. A step takes the frame's external inputs
//! (player commands, broad-phase trigger events), plays them into singleton
//! and per-champion state, runs the schedule and advances the clock. All
//! inputs are historized, so a span of past ticks can be resimulated after a
//! server correction and produce the same state the first pass did.

use std::sync::Arc;

use arena_clock::{CommandHistory, Tick, TickClock, TickRate};
use arena_combat::{
    AbilityHistory, CastCommand, Champion, DamageBuffer, Dead, GoldPurse, HitPoints, JoinOutcome,
    JoinRequest, Lane, LinearSpatialQuery, MatchState, MoveCommand, MoveHistory, MoveSpeed,
    PredictionBatch, Projectile, RespawnDelay, RespawnQueue, SpatialQuery, Target, Team,
    Transform, TriggerEvent, TriggerFeed, UnitConfigTable, UnitStats, UnitTypeConfig,
    VisualEvents, WaveSpawner, handle_join,
    systems::{
        Ability, ApplyDamage, Attack, Despawn, Movement, Respawn, Targeting, TriggerDamage,
    },
};
use arena_ecs::{CommandBuffer, CommandWriter, ComponentStore, ComponentTypeId, Entity, SortKey};
use arena_replication::{
    Authority, Owner, PeerId, PolicyRegistry, ReplicationError, ReplicationMode,
    apply_correction, snapshot_component,
};
use arena_schedule::{Schedule, ScheduleBuilder, ScheduleError};
use glam::Vec3;
use tracing::{info, warn};

/// Errors assembling or correcting a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The system schedule failed validation.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A correction payload was rejected.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Everything needed to assemble a world.
#[derive(Clone)]
pub struct SimulationConfig {
    /// Fixed simulation step rate.
    pub rate: TickRate,
    /// Whether this world is the server or a predicting client.
    pub authority: Authority,
    /// Unit balance table.
    pub units: Arc<UnitConfigTable>,
    /// Minion lanes; empty disables waves.
    pub lanes: Vec<Lane>,
    /// Ticks between champion death and respawn.
    pub respawn_delay_ticks: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rate: TickRate::default(),
            authority: Authority::Server,
            units: Arc::new(default_unit_table()),
            lanes: default_lanes(),
            respawn_delay_ticks: 300,
        }
    }
}

/// External inputs for one step.
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    /// Per-peer movement commands.
    pub moves: Vec<(PeerId, MoveCommand)>,
    /// Per-peer ability commands.
    pub casts: Vec<(PeerId, CastCommand)>,
    /// Broad-phase overlap events for this step.
    pub trigger_events: Vec<TriggerEvent>,
}

/// One steppable simulation world.
pub struct Simulation {
    store: ComponentStore,
    clock: TickClock,
    schedule: Schedule,
    policy: PolicyRegistry,
    rate: TickRate,
    units: Arc<UnitConfigTable>,
    world: Entity,
    trigger_history: CommandHistory<Vec<TriggerEvent>>,
    inbox: CommandBuffer,
}

impl Simulation {
    /// Assemble a world from `config`.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Schedule`] if a system declares an illegal access
    /// pattern.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let mut store = ComponentStore::new();
        let world = store
            .spawn()
            .with(MatchState::default())
            .with(RespawnQueue::default())
            .with(RespawnDelay {
                ticks: config.respawn_delay_ticks,
            })
            .with(TriggerFeed::default())
            .with(PredictionBatch::default())
            .finish();

        let spatial: Arc<dyn SpatialQuery> = Arc::new(LinearSpatialQuery);
        let schedule = ScheduleBuilder::new()
            .add_parallel(Movement::new(config.rate))
            .add_parallel(Targeting::new(config.rate, spatial))
            .add_exclusive(Attack::new(config.rate, Arc::clone(&config.units)))
            .add_exclusive(Ability::new(config.rate, config.authority))
            .add_parallel(TriggerDamage)
            .add_exclusive(ApplyDamage::new(
                Arc::clone(&config.units),
                config.authority,
            ))
            .add_exclusive(Despawn::new(config.rate))
            .add_exclusive(Respawn::new(config.authority))
            .add_exclusive(WaveSpawner::new(
                Arc::clone(&config.units),
                config.rate,
                config.authority,
                config.lanes.clone(),
            ))
            .build()?;

        let mut policy = PolicyRegistry::new();
        policy.register::<Transform>(ReplicationMode::PredictedCorrectable);
        policy.register::<MoveSpeed>(ReplicationMode::PredictedCorrectable);
        policy.register::<Target>(ReplicationMode::PredictedCorrectable);
        policy.register::<HitPoints>(ReplicationMode::AlwaysReplicated);
        policy.register::<Dead>(ReplicationMode::AlwaysReplicated);
        policy.register::<GoldPurse>(ReplicationMode::AlwaysReplicated);
        policy.register::<MatchState>(ReplicationMode::AlwaysReplicated);
        policy.register::<VisualEvents>(ReplicationMode::InterpolatedVisualOnly);

        info!(stages = schedule.stage_count(), "simulation assembled");
        Ok(Self {
            store,
            clock: TickClock::default(),
            schedule,
            policy,
            rate: config.rate,
            units: config.units,
            world,
            trigger_history: CommandHistory::new(),
            inbox: CommandBuffer::new(),
        })
    }

    /// Read-only access to the world state.
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Mutable access to the world state, for ingress outside the schedule.
    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    /// The tick the next [`step`](Self::step) will simulate.
    #[must_use]
    pub fn current_tick(&self) -> Tick {
        self.clock.current()
    }

    /// The fixed step rate.
    #[must_use]
    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// The entity carrying the match singletons.
    #[must_use]
    pub fn world(&self) -> Entity {
        self.world
    }

    /// Current match state, if the world entity is intact.
    #[must_use]
    pub fn match_state(&self) -> Option<MatchState> {
        self.store.get::<MatchState>(self.world).ok().copied()
    }

    /// Admit a player into the match.
    pub fn join(&mut self, request: JoinRequest) -> JoinOutcome {
        handle_join(
            &mut self.store,
            &self.units,
            self.rate,
            request,
            self.clock.current(),
        )
    }

    /// The champion owned by `peer`, if one exists.
    #[must_use]
    pub fn champion_of(&self, peer: PeerId) -> Option<Entity> {
        self.store
            .entities_with(&[
                ComponentTypeId::of::<Champion>(),
                ComponentTypeId::of::<Owner>(),
            ])
            .into_iter()
            .find(|&champion| {
                self.store
                    .get::<Owner>(champion)
                    .map(|owner| owner.peer == peer)
                    .unwrap_or(false)
            })
    }

    /// A writer for deferred structural changes from outside the schedule
    /// (network ingress, admin commands). Queued operations apply at the
    /// next step's begin barrier.
    #[must_use]
    pub fn commands(&self) -> CommandWriter {
        self.inbox.writer(SortKey(0))
    }

    /// Simulate one tick from external inputs. Returns the tick that ran.
    pub fn step(&mut self, input: StepInput) -> Tick {
        let tick = self.clock.current();

        // Begin barrier: externally queued commands land before any system
        // observes the step.
        if !self.inbox.is_empty() {
            let inbox = std::mem::replace(&mut self.inbox, CommandBuffer::new());
            inbox.playback(&mut self.store);
        }

        for &(peer, command) in &input.moves {
            match self.champion_of(peer) {
                Some(champion) => {
                    if let Ok(history) = self.store.get_mut::<MoveHistory>(champion) {
                        history.0.record(tick, command);
                    }
                }
                None => warn!(%peer, "move command from peer without a champion"),
            }
        }
        for &(peer, command) in &input.casts {
            match self.champion_of(peer) {
                Some(champion) => {
                    if let Ok(history) = self.store.get_mut::<AbilityHistory>(champion) {
                        history.0.record(tick, command);
                    }
                }
                None => warn!(%peer, "cast command from peer without a champion"),
            }
        }

        self.trigger_history
            .record(tick, input.trigger_events.clone());
        self.write_step_singletons(
            input.trigger_events,
            PredictionBatch {
                batch_size: 1,
                is_first_full_prediction: true,
            },
        );

        self.schedule.run(&mut self.store, tick);
        self.clock.advance();
        tick
    }

    /// Re-run every tick from `from` up to the current tick against the
    /// historized inputs.
    ///
    /// Used after corrections rewrite past state: champion commands and
    /// trigger events replay from their histories, and one-shot side effects
    /// stay suppressed so nothing spawns or fires twice.
    pub fn resimulate(&mut self, from: Tick) {
        let end = self.clock.current();
        if !from.is_valid() || !end.is_newer_than(from) {
            warn!(%from, %end, "resimulation span is empty");
            return;
        }
        let span = end.ticks_since(from) as u32;
        self.clock.rewind_to(from);
        while end.is_newer_than(self.clock.current()) {
            let tick = self.clock.current();
            let events = self
                .trigger_history
                .exactly_at(tick)
                .cloned()
                .unwrap_or_default();
            self.write_step_singletons(
                events,
                PredictionBatch {
                    batch_size: span,
                    is_first_full_prediction: false,
                },
            );
            self.schedule.run(&mut self.store, tick);
            self.clock.advance();
        }
        self.write_step_singletons(Vec::new(), PredictionBatch::default());
    }

    /// Snapshot one component for replication.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Replication`] for stale entities or unregistered
    /// types.
    pub fn snapshot(
        &self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<Vec<u8>, SimulationError> {
        Ok(snapshot_component(&self.store, entity, type_id)?)
    }

    /// Apply a server correction payload to one component.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Replication`] if the type's policy forbids
    /// correction or the payload is malformed.
    pub fn correct(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        payload: &[u8],
    ) -> Result<(), SimulationError> {
        apply_correction(&mut self.store, &self.policy, entity, type_id, payload)?;
        Ok(())
    }

    fn write_step_singletons(&mut self, events: Vec<TriggerEvent>, batch: PredictionBatch) {
        if let Ok(feed) = self.store.get_mut::<TriggerFeed>(self.world) {
            feed.0 = events;
        }
        if let Ok(current) = self.store.get_mut::<PredictionBatch>(self.world) {
            *current = batch;
        }
    }
}

/// Naive broad-phase for headless runs: every projectile overlapping a
/// damageable body within `hit_radius` yields a trigger event.
#[must_use]
pub fn projectile_contacts(store: &ComponentStore, hit_radius: f32) -> Vec<TriggerEvent> {
    let spatial = LinearSpatialQuery;
    let mut events = Vec::new();
    for projectile in store.entities_with(&[
        ComponentTypeId::of::<Projectile>(),
        ComponentTypeId::of::<Transform>(),
    ]) {
        let Ok(transform) = store.get::<Transform>(projectile) else {
            continue;
        };
        for body in spatial.overlap_sphere(store, transform.position, hit_radius) {
            if body != projectile && store.has::<DamageBuffer>(body) {
                events.push(TriggerEvent {
                    first: projectile,
                    second: body,
                    body_index: body.index(),
                });
            }
        }
    }
    events
}

/// Built-in balance table for tests and headless matches.
#[must_use]
pub fn default_unit_table() -> UnitConfigTable {
    UnitConfigTable::from_unit_types(vec![
        UnitTypeConfig {
            name: "champion".to_string(),
            levels: vec![UnitStats {
                hit_points: 100,
                attack_damage: 10,
                move_speed: 4.0,
                upgrade_cost: 0,
                spawn_cost: 0,
                kill_gold: 50,
                unit_count: 1,
                model_radius: 0.5,
                projectile_scale: 1.0,
            }],
        },
        UnitTypeConfig {
            name: "melee".to_string(),
            levels: vec![
                UnitStats {
                    hit_points: 50,
                    attack_damage: 5,
                    move_speed: 2.5,
                    upgrade_cost: 10,
                    spawn_cost: 3,
                    kill_gold: 5,
                    unit_count: 3,
                    model_radius: 0.4,
                    projectile_scale: 1.0,
                },
                UnitStats {
                    hit_points: 80,
                    attack_damage: 8,
                    move_speed: 2.5,
                    upgrade_cost: 20,
                    spawn_cost: 5,
                    kill_gold: 8,
                    unit_count: 3,
                    model_radius: 0.4,
                    projectile_scale: 1.2,
                },
            ],
        },
    ])
}

/// Two mirrored lanes between the team bases.
#[must_use]
pub fn default_lanes() -> Vec<Lane> {
    vec![
        Lane {
            team: Team { index: 0 },
            waypoints: vec![Vec3::new(-20.0, 0.0, 4.0), Vec3::new(20.0, 0.0, 4.0)],
        },
        Lane {
            team: Team { index: 1 },
            waypoints: vec![Vec3::new(20.0, 0.0, -4.0), Vec3::new(-20.0, 0.0, -4.0)],
        },
    ]
}

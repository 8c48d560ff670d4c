//! Combat components.
//!
//! All simulation state lives here as plain serialisable value types. Tags
//! are zero-sized; toggleable states (death) keep the component attached and
//! flip its enabled bit to avoid archetype churn during prediction replay.

use arena_clock::{CommandHistory, Tick};
use arena_ecs::{BufferComponent, Component, Entity};
use arena_replication::PeerId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World placement. Orientation is a yaw angle; units never pitch or roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// Facing angle in radians around the vertical axis.
    pub yaw: f32,
    /// Uniform visual scale.
    pub scale: f32,
}

impl Transform {
    /// A transform at `position` with default facing and scale.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            scale: 1.0,
        }
    }

    /// Where dead champions are parked until respawn, far off-stage so
    /// physics and targeting never see them.
    #[must_use]
    pub fn off_stage() -> Self {
        Self::at(Vec3::new(0.0, -9999.0, 0.0))
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}

/// Movement speed in units per second. `current` is zeroed while attacking
/// and restored to `base` when the unit disengages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveSpeed {
    /// Effective speed this tick.
    pub current: f32,
    /// Configured speed.
    pub base: f32,
}

impl MoveSpeed {
    /// A speed component at its base value.
    #[must_use]
    pub fn new(base: f32) -> Self {
        Self {
            current: base,
            base,
        }
    }
}

impl Component for MoveSpeed {
    fn type_name() -> &'static str {
        "MoveSpeed"
    }
}

/// Team affiliation. Matches are two-team; `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    /// Team index.
    pub index: u8,
}

impl Team {
    /// The opposing team.
    #[must_use]
    pub fn opposing(self) -> Self {
        Self {
            index: 1 - self.index,
        }
    }
}

impl Component for Team {
    fn type_name() -> &'static str {
        "Team"
    }
}

/// Current and maximum hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    /// Current hit points; clamped to 0 on champion death.
    pub current: i32,
    /// Maximum hit points.
    pub max: i32,
}

impl HitPoints {
    /// Full hit points.
    #[must_use]
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }
}

impl Component for HitPoints {
    fn type_name() -> &'static str {
        "HitPoints"
    }
}

/// Marks a player-controlled champion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Champion;
impl Component for Champion {
    fn type_name() -> &'static str {
        "Champion"
    }
}

/// Marks an AI minion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Minion;
impl Component for Minion {
    fn type_name() -> &'static str {
        "Minion"
    }
}

/// Marks a static structure (towers, the base core). Preferred by targeting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Structure;
impl Component for Structure {
    fn type_name() -> &'static str {
        "Structure"
    }
}

/// Death flag, toggled via the enabled bit. Spawned disabled on every unit
/// that can die and respawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dead;
impl Component for Dead {
    fn type_name() -> &'static str {
        "Dead"
    }
}

/// Destroying this entity ends the match in favour of the opposing team.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameOverOnDestroy;
impl Component for GameOverOnDestroy {
    fn type_name() -> &'static str {
        "GameOverOnDestroy"
    }
}

/// Marks a projectile in flight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Projectile;
impl Component for Projectile {
    fn type_name() -> &'static str {
        "Projectile"
    }
}

/// Damage dealt per hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDamage(pub i32);
impl Component for AttackDamage {
    fn type_name() -> &'static str {
        "AttackDamage"
    }
}

/// Basic-attack reach in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackRange(pub f32);
impl Component for AttackRange {
    fn type_name() -> &'static str {
        "AttackRange"
    }
}

/// Seconds between basic attacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackCooldown {
    /// Cooldown duration in seconds.
    pub seconds: f32,
}
impl Component for AttackCooldown {
    fn type_name() -> &'static str {
        "AttackCooldown"
    }
}

/// The entity this unit is currently attacking, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Target {
    /// Current target; `None` while idle.
    pub entity: Option<Entity>,
}
impl Component for Target {
    fn type_name() -> &'static str {
        "Target"
    }
}

/// Countdown bounding how often a unit runs a full target search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSearchTimer {
    /// Seconds until the next search is allowed.
    pub remaining: f32,
}

impl TargetSearchTimer {
    /// Interval between target searches.
    pub const INTERVAL: f32 = 0.5;

    /// A timer ready to search immediately.
    #[must_use]
    pub fn ready() -> Self {
        Self { remaining: 0.0 }
    }
}

impl Component for TargetSearchTimer {
    fn type_name() -> &'static str {
        "TargetSearchTimer"
    }
}

/// Index of this unit's row in the [`UnitConfigTable`](crate::UnitConfigTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeIndex(pub usize);
impl Component for UnitTypeIndex {
    fn type_name() -> &'static str {
        "UnitTypeIndex"
    }
}

/// This unit's level within its config rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLevel(pub u8);
impl Component for UnitLevel {
    fn type_name() -> &'static str {
        "UnitLevel"
    }
}

/// A player's gold, clamped to `max` on every grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldPurse {
    /// Current gold.
    pub current: i32,
    /// Purse capacity.
    pub max: i32,
}

impl GoldPurse {
    /// Grant gold, clamped to the purse capacity.
    pub fn grant(&mut self, amount: i32) {
        self.current = (self.current + amount).min(self.max);
    }
}

impl Component for GoldPurse {
    fn type_name() -> &'static str {
        "GoldPurse"
    }
}

/// Where a champion respawns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Respawn position.
    pub position: Vec3,
}
impl Component for SpawnPoint {
    fn type_name() -> &'static str {
        "SpawnPoint"
    }
}

/// Pending damage against this entity, appended by the trigger stage and
/// drained by damage application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageBuffer(pub Vec<i32>);
impl Component for DamageBuffer {
    fn type_name() -> &'static str {
        "DamageBuffer"
    }
}
impl BufferComponent for DamageBuffer {
    type Element = i32;
    fn push(&mut self, element: i32) {
        self.0.push(element);
    }
}

/// Victims this damage dealer has already hit; one projectile never damages
/// the same entity twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlreadyDamaged(pub Vec<Entity>);
impl Component for AlreadyDamaged {
    fn type_name() -> &'static str {
        "AlreadyDamaged"
    }
}
impl BufferComponent for AlreadyDamaged {
    type Element = Entity;
    fn push(&mut self, element: Entity) {
        self.0.push(element);
    }
}

/// Despawn this entity a fixed time after the component is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DespawnAfter {
    /// Delay in seconds.
    pub seconds: f32,
}
impl Component for DespawnAfter {
    fn type_name() -> &'static str {
        "DespawnAfter"
    }
}

/// The resolved despawn deadline. Starts invalid; the despawn system fills
/// it in from [`DespawnAfter`] on its first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DespawnAtTick {
    /// Tick at which the entity despawns.
    pub tick: Tick,
}

impl Default for DespawnAtTick {
    fn default() -> Self {
        Self {
            tick: Tick::INVALID,
        }
    }
}

impl Component for DespawnAtTick {
    fn type_name() -> &'static str {
        "DespawnAtTick"
    }
}

/// One queued champion respawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnRecord {
    /// The dead champion.
    pub champion: Entity,
    /// Tick at which it comes back.
    pub at: Tick,
    /// The owning peer, for logging and client notification.
    pub peer: PeerId,
}

/// Queue of pending respawns, held on the match singleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RespawnQueue(pub Vec<RespawnRecord>);
impl Component for RespawnQueue {
    fn type_name() -> &'static str {
        "RespawnQueue"
    }
}
impl BufferComponent for RespawnQueue {
    type Element = RespawnRecord;
    fn push(&mut self, element: RespawnRecord) {
        self.0.push(element);
    }
}

/// Ticks between a champion's death and respawn, held on the match
/// singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnDelay {
    /// Delay in ticks.
    pub ticks: u32,
}
impl Component for RespawnDelay {
    fn type_name() -> &'static str {
        "RespawnDelay"
    }
}

/// Phase of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Waiting for players.
    Lobby,
    /// Enough players joined; counting down to the start tick.
    Countdown,
    /// The match is running.
    Playing,
    /// A core structure fell.
    Over,
}

/// Match-level state, held on the match singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    /// Current phase.
    pub phase: MatchPhase,
    /// Tick at which gameplay begins; invalid until the countdown starts.
    pub game_start_tick: Tick,
    /// Winning team once the match is over.
    pub winning_team: Option<Team>,
    /// Players per team.
    pub players: [u8; 2],
}

impl Default for MatchState {
    fn default() -> Self {
        Self {
            phase: MatchPhase::Lobby,
            game_start_tick: Tick::INVALID,
            winning_team: None,
            players: [0, 0],
        }
    }
}

impl Component for MatchState {
    fn type_name() -> &'static str {
        "MatchState"
    }
}

/// One tick of movement input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveCommand {
    /// Where the unit is heading.
    pub destination: Vec3,
}

/// Historized movement input, replayed identically during resimulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveHistory(pub CommandHistory<MoveCommand>);

impl Default for MoveHistory {
    fn default() -> Self {
        Self(CommandHistory::new())
    }
}

impl Component for MoveHistory {
    fn type_name() -> &'static str {
        "MoveHistory"
    }
}

/// One tick of ability input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CastCommand {
    /// Whether the cast button is down this tick.
    pub cast: bool,
    /// World-space aim point.
    pub aim: Vec3,
}

/// Historized ability input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityHistory(pub CommandHistory<CastCommand>);

impl Default for AbilityHistory {
    fn default() -> Self {
        Self(CommandHistory::new())
    }
}

impl Component for AbilityHistory {
    fn type_name() -> &'static str {
        "AbilityHistory"
    }
}

/// Tick-indexed record of when the basic attack comes off cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackReadyHistory(pub CommandHistory<Tick>);

impl Default for AttackReadyHistory {
    fn default() -> Self {
        Self(CommandHistory::new())
    }
}

impl Component for AttackReadyHistory {
    fn type_name() -> &'static str {
        "AttackReadyHistory"
    }
}

/// Tick-indexed record of when the ability comes off cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityReadyHistory(pub CommandHistory<Tick>);

impl Default for AbilityReadyHistory {
    fn default() -> Self {
        Self(CommandHistory::new())
    }
}

impl Component for AbilityReadyHistory {
    fn type_name() -> &'static str {
        "AbilityReadyHistory"
    }
}

/// Ability parameters for a champion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityStats {
    /// Cooldown in seconds.
    pub cooldown_seconds: f32,
    /// Damage of the ability projectile.
    pub damage: i32,
}
impl Component for AbilityStats {
    fn type_name() -> &'static str {
        "AbilityStats"
    }
}

/// The lane a minion squad marches down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanePath {
    /// Waypoints in march order.
    pub waypoints: Vec<Vec3>,
    /// Index of the next waypoint.
    pub next: u32,
}
impl Component for LanePath {
    fn type_name() -> &'static str {
        "LanePath"
    }
}

/// Per-step prediction batching info, held on the step singleton.
///
/// During resimulation several ticks run back-to-back in one batch; only the
/// first full prediction of a tick may emit one-shot side effects (spawns,
/// history records), or replays would duplicate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionBatch {
    /// Number of ticks simulated in the current batch.
    pub batch_size: u32,
    /// Whether this is the first time the current tick is fully predicted.
    pub is_first_full_prediction: bool,
}

impl Default for PredictionBatch {
    fn default() -> Self {
        Self {
            batch_size: 1,
            is_first_full_prediction: true,
        }
    }
}

impl Component for PredictionBatch {
    fn type_name() -> &'static str {
        "PredictionBatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gold_grant_clamps_to_max() {
        let mut purse = GoldPurse {
            current: 995,
            max: 1000,
        };
        purse.grant(10);
        assert_eq!(purse.current, 1000);
        purse.grant(-5);
        assert_eq!(purse.current, 995);
    }

    #[test]
    fn test_opposing_team() {
        assert_eq!(Team { index: 0 }.opposing(), Team { index: 1 });
        assert_eq!(Team { index: 1 }.opposing(), Team { index: 0 });
    }

    #[test]
    fn test_off_stage_is_far_below_arena() {
        assert!(Transform::off_stage().position.y < -1000.0);
    }

    #[test]
    fn test_despawn_deadline_starts_invalid() {
        assert!(!DespawnAtTick::default().tick.is_valid());
    }
}

//! Gameplay simulation for the arena: units, damage, respawns, waves.
//!
//! Everything here runs inside the fixed-tick schedule. Systems read the
//! store and defer their mutations through command buffers; the few
//! exclusive systems (attack, ability, damage application, despawn,
//! respawn, wave spawning) own the store for their stage.

pub mod components;
pub mod config;
pub mod entry;
pub mod events;
pub mod spatial;
pub mod systems;

pub use components::*;
pub use config::{ConfigError, UnitConfigTable, UnitStats, UnitTypeConfig};
pub use entry::{
    handle_join, JoinOutcome, JoinRequest, Lane, WaveSpawner, COUNTDOWN_SECONDS, MAX_GOLD,
    MAX_PLAYERS_PER_TEAM, PLAYERS_TO_START,
};
pub use events::{ViewerCursor, VisualEvent, VisualEvents, VisualKind};
pub use spatial::{LinearSpatialQuery, SpatialQuery, TriggerEvent, TriggerFeed};
pub use systems::{
    Ability, ApplyDamage, Attack, Despawn, Movement, Respawn, Targeting, TriggerDamage,
};

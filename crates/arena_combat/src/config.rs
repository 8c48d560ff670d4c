//! Unit configuration tables.
//!
//! Balance data lives in a designer-maintained spreadsheet exported as JSON:
//! one row per unit type and level. The table is loaded once at startup and
//! consulted for spawn stats and kill bounties. Lookup never fails — a
//! missing or out-of-range entry degrades to a documented default and logs a
//! warning, because a mistyped level in a spreadsheet must not crash a
//! running match.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Errors from config ingress. Lookup never produces these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("malformed unit config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but contains no unit types.
    #[error("unit config contains no unit types")]
    Empty,
}

/// Balance stats for one unit type at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum hit points.
    pub hit_points: i32,
    /// Damage per attack.
    pub attack_damage: i32,
    /// Movement speed in units per second.
    pub move_speed: f32,
    /// Gold cost to upgrade to the next level.
    pub upgrade_cost: i32,
    /// Gold cost per spawned unit of this level.
    pub spawn_cost: i32,
    /// Gold granted to each opposing player on kill.
    pub kill_gold: i32,
    /// Units per spawned squad.
    pub unit_count: u32,
    /// Collision radius of the model.
    pub model_radius: f32,
    /// Visual scale of this unit's projectiles.
    pub projectile_scale: f32,
}

/// The fallback row used when a lookup misses entirely.
pub const DEFAULT_STATS: UnitStats = UnitStats {
    hit_points: 100,
    attack_damage: 10,
    move_speed: 2.0,
    upgrade_cost: 0,
    spawn_cost: 3,
    kill_gold: 3,
    unit_count: 1,
    model_radius: 0.5,
    projectile_scale: 1.0,
};

/// All levels of one unit type, sorted ascending by level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTypeConfig {
    /// Unit type name (e.g. `"melee"`, `"champion"`).
    pub name: String,
    /// Stats per level, index 0 = level 0.
    pub levels: Vec<UnitStats>,
}

/// The full unit table, indexable by type index or name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfigTable {
    unit_types: Vec<UnitTypeConfig>,
}

impl UnitConfigTable {
    /// Parse a table from its JSON export.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed JSON, [`ConfigError::Empty`] if
    /// no unit types are present.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let table: Self = serde_json::from_str(json)?;
        if table.unit_types.is_empty() {
            return Err(ConfigError::Empty);
        }
        Ok(table)
    }

    /// Build a table directly (tests, hardcoded defaults).
    #[must_use]
    pub fn from_unit_types(unit_types: Vec<UnitTypeConfig>) -> Self {
        Self { unit_types }
    }

    /// Number of unit types.
    #[must_use]
    pub fn unit_type_count(&self) -> usize {
        self.unit_types.len()
    }

    /// The table index of a unit type name.
    #[must_use]
    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.unit_types.iter().position(|t| t.name == name)
    }

    /// Stats for a unit type index and level.
    ///
    /// An unknown type index falls back to [`DEFAULT_STATS`]; a level beyond
    /// the configured range clamps to the highest configured level. Both
    /// cases log a warning.
    #[must_use]
    pub fn stats(&self, type_index: usize, level: u8) -> &UnitStats {
        let Some(unit_type) = self.unit_types.get(type_index) else {
            warn!(type_index, "unknown unit type index, using default stats");
            return &DEFAULT_STATS;
        };
        if unit_type.levels.is_empty() {
            warn!(unit = %unit_type.name, "unit type has no levels, using default stats");
            return &DEFAULT_STATS;
        }
        let index = level as usize;
        if index >= unit_type.levels.len() {
            warn!(
                unit = %unit_type.name,
                level,
                max = unit_type.levels.len() - 1,
                "level out of range, clamping"
            );
            return &unit_type.levels[unit_type.levels.len() - 1];
        }
        &unit_type.levels[index]
    }

    /// Stats looked up by unit type name.
    #[must_use]
    pub fn stats_by_name(&self, name: &str, level: u8) -> &UnitStats {
        match self.type_index(name) {
            Some(index) => self.stats(index, level),
            None => {
                warn!(unit = name, "unknown unit type name, using default stats");
                &DEFAULT_STATS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> UnitConfigTable {
        UnitConfigTable::from_json(
            r#"{
                "unit_types": [
                    {
                        "name": "melee",
                        "levels": [
                            { "hit_points": 50, "attack_damage": 5, "move_speed": 2.5,
                              "upgrade_cost": 10, "spawn_cost": 3, "kill_gold": 5,
                              "unit_count": 4, "model_radius": 0.4, "projectile_scale": 1.0 },
                            { "hit_points": 80, "attack_damage": 8, "move_speed": 2.5,
                              "upgrade_cost": 20, "spawn_cost": 5, "kill_gold": 8,
                              "unit_count": 4, "model_radius": 0.4, "projectile_scale": 1.2 }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_by_index_and_name() {
        let table = sample_table();
        assert_eq!(table.stats(0, 1).kill_gold, 8);
        assert_eq!(table.stats_by_name("melee", 0).hit_points, 50);
        assert_eq!(table.type_index("melee"), Some(0));
    }

    #[test]
    fn test_out_of_range_level_clamps() {
        let table = sample_table();
        assert_eq!(table.stats(0, 9).hit_points, 80);
    }

    #[test]
    fn test_unknown_type_uses_default() {
        let table = sample_table();
        assert_eq!(table.stats(7, 0), &DEFAULT_STATS);
        assert_eq!(table.stats_by_name("siege", 0), &DEFAULT_STATS);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            UnitConfigTable::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            UnitConfigTable::from_json(r#"{ "unit_types": [] }"#),
            Err(ConfigError::Empty)
        ));
    }
}

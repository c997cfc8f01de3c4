//! Simulation Configuration
//!
//! One TOML file drives both the host world and the engine. The engine's
//! settings live under `[engine]`; every section falls back to its defaults.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use loadout_core::{ArchetypeStats, Duty, EngineConfig};
use loadout_events::ArchetypeId;

use crate::error::SimError;

/// Top-level configuration structure
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub hazards: HazardConfig,
    #[serde(default = "standard_archetypes")]
    pub archetypes: BTreeMap<ArchetypeId, ArchetypeStats>,
    #[serde(default = "standard_policy")]
    pub policy: Vec<PolicyRule>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            hazards: HazardConfig::default(),
            archetypes: standard_archetypes(),
            policy: standard_policy(),
            engine: EngineConfig::default(),
        }
    }
}

/// Colony size and layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Side of the square map
    pub map_size: f32,
    pub agents: usize,
    /// Gear scattered at startup
    pub items: usize,
    /// Fraction of colonists that start with something equipped
    pub armed_fraction: f64,
    /// Fraction of colonists whose starting gear the player pins
    pub pin_fraction: f64,
    /// Ticks between loot drops
    pub loot_interval: u64,
    pub move_speed: f32,
    pub grid_cell: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_size: 120.0,
            agents: 24,
            items: 40,
            armed_fraction: 0.5,
            pin_fraction: 0.15,
            loot_interval: 150,
            move_speed: 1.0,
            grid_cell: 16.0,
        }
    }
}

/// Things that happen to gear without the engine asking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Per-tick chance an armed colonist fumbles their gear
    pub fumble_chance: f64,
    /// Chance a fumbling colonist walks back for it
    pub recover_chance: f64,
    /// Ticks before a recovery is abandoned
    pub recover_give_up: u64,
    /// Condition lost per tick while held
    pub wear_per_tick: f32,
    /// Per-tick chance loose gear catches fire
    pub ignite_chance: f64,
    /// Condition lost per tick while burning
    pub burn_rate: f32,
    /// Per-tick chance a colonist changes activity
    pub activity_change_chance: f64,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            fumble_chance: 0.002,
            recover_chance: 0.6,
            recover_give_up: 600,
            wear_per_tick: 0.0002,
            ignite_chance: 0.00005,
            burn_rate: 0.02,
            activity_change_chance: 0.01,
        }
    }
}

/// Archetypes a duty may not use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub duty: Duty,
    #[serde(default)]
    pub forbid: Vec<ArchetypeId>,
}

fn standard_archetypes() -> BTreeMap<ArchetypeId, ArchetypeStats> {
    let mut archetypes = BTreeMap::new();
    archetypes.insert(ArchetypeId::new("club"), ArchetypeStats::melee(5.0, 80.0, 0.0));
    archetypes.insert(ArchetypeId::new("knife"), ArchetypeStats::melee(9.0, 60.0, 0.1));
    archetypes.insert(
        ArchetypeId::new("longsword"),
        ArchetypeStats::melee(12.0, 60.0, 0.2).with_duties(vec![Duty::Guard]),
    );
    archetypes.insert(
        ArchetypeId::new("rifle"),
        ArchetypeStats::ranged(18.0, 100.0, 60.0, 1, 30.0).with_duties(vec![Duty::Hunter]),
    );
    archetypes.insert(
        ArchetypeId::new("assault_rifle"),
        ArchetypeStats::ranged(12.0, 90.0, 30.0, 3, 28.0)
            .with_required_skill(6)
            .with_duties(vec![Duty::Soldier]),
    );
    archetypes
}

fn standard_policy() -> Vec<PolicyRule> {
    vec![PolicyRule {
        duty: Duty::Worker,
        forbid: vec![ArchetypeId::new("assault_rifle")],
    }]
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let content = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SimError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, SimError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.engine.validate()?;
        if !(self.world.map_size > 0.0) {
            return Err(SimError::Invalid(format!(
                "world.map_size must be positive, got {}",
                self.world.map_size
            )));
        }
        if !(self.world.move_speed >= 0.0 && self.world.move_speed.is_finite()) {
            return Err(SimError::Invalid(format!(
                "world.move_speed must be a non-negative number, got {}",
                self.world.move_speed
            )));
        }
        if self.archetypes.is_empty() {
            return Err(SimError::Invalid("at least one archetype is required".into()));
        }
        for (name, chance) in [
            ("world.armed_fraction", self.world.armed_fraction),
            ("world.pin_fraction", self.world.pin_fraction),
            ("hazards.fumble_chance", self.hazards.fumble_chance),
            ("hazards.recover_chance", self.hazards.recover_chance),
            ("hazards.ignite_chance", self.hazards.ignite_chance),
            ("hazards.activity_change_chance", self.hazards.activity_change_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(SimError::Invalid(format!("{} must be within 0..=1, got {}", name, chance)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = SimConfig::from_str("").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.archetypes.len(), 5);
    }

    #[test]
    fn test_partial_sections_override() {
        let config = SimConfig::from_str(
            r#"
[world]
agents = 6

[engine.search]
radius = 12.0

[[policy]]
duty = "guard"
forbid = ["rifle"]
"#,
        )
        .unwrap();

        assert_eq!(config.world.agents, 6);
        assert_eq!(config.world.items, WorldConfig::default().items);
        assert_eq!(config.engine.search.radius, 12.0);
        assert_eq!(config.policy.len(), 1);
        assert_eq!(config.policy[0].duty, Duty::Guard);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = SimConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(SimConfig::from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            SimConfig::from_str("[world]\nmap_size = 0.0\n"),
            Err(SimError::Invalid(_))
        ));
        assert!(matches!(
            SimConfig::from_str("[hazards]\nfumble_chance = 2.0\n"),
            Err(SimError::Invalid(_))
        ));
        assert!(matches!(
            SimConfig::from_str("[engine.search]\nupgrade_threshold = 0.5\n"),
            Err(SimError::Config(_))
        ));
        assert!(matches!(SimConfig::from_str("world = 3"), Err(SimError::Toml(_))));
    }
}

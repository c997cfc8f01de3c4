//! Configuration loading for the engine.
//!
//! All tuning values are loaded from a TOML file. Every section falls back to
//! its defaults, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::Path;

use loadout_events::Tick;

use crate::error::ConfigError;
use crate::model::{Activity, ContainerKind};

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidate search settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Cooldown durations per outcome
    #[serde(default)]
    pub cooldowns: CooldownConfig,
    /// Dropped-item memory windows
    #[serde(default)]
    pub dropped: DroppedConfig,
    /// Pinned-equipment grace settings
    #[serde(default)]
    pub pins: PinConfig,
    /// Cleanup sweep cadence and budget
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Scoring tables and weights
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Agent and item eligibility rules
    #[serde(default)]
    pub eligibility: EligibilityConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks cross-field constraints the decision loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.search.upgrade_threshold > 1.0) {
            return invalid(format!(
                "search.upgrade_threshold must be > 1.0, got {}",
                self.search.upgrade_threshold
            ));
        }
        if self.search.max_candidates == 0 {
            return invalid("search.max_candidates must be at least 1".into());
        }
        if !(self.search.radius > 0.0) {
            return invalid(format!("search.radius must be positive, got {}", self.search.radius));
        }

        let c = &self.cooldowns;
        if c.emergency == 0 || c.pin_hold == 0 {
            return invalid("cooldowns must be at least one tick".into());
        }
        if !(c.emergency <= c.post_swap && c.post_swap <= c.failed_search) {
            return invalid(format!(
                "cooldowns must satisfy emergency <= post_swap <= failed_search ({} / {} / {})",
                c.emergency, c.post_swap, c.failed_search
            ));
        }

        if self.dropped.swap_ttl == 0 || self.dropped.external_drop_ttl == 0 {
            return invalid("dropped ttls must be at least one tick".into());
        }
        if self.dropped.pending_ttl < self.dropped.swap_ttl {
            return invalid("dropped.pending_ttl must be >= dropped.swap_ttl".into());
        }

        if self.pins.check_interval == 0 {
            return invalid("pins.check_interval must be at least one tick".into());
        }
        if self.pins.hard_timeout < self.pins.grace_window {
            return invalid("pins.hard_timeout must be >= pins.grace_window".into());
        }

        if self.cleanup.sweep_interval == 0 || self.cleanup.budget_per_sweep == 0 {
            return invalid("cleanup.sweep_interval and budget_per_sweep must be positive".into());
        }
        if self.cleanup.drift_interval < self.cleanup.sweep_interval {
            return invalid("cleanup.drift_interval must be >= cleanup.sweep_interval".into());
        }

        let s = &self.scoring;
        if s.quality_damage_multipliers.len() != 7 {
            return invalid(format!(
                "scoring.quality_damage_multipliers needs 7 entries, got {}",
                s.quality_damage_multipliers.len()
            ));
        }
        if s.quality_damage_multipliers.windows(2).any(|w| w[1] < w[0]) {
            return invalid("scoring.quality_damage_multipliers must be non-decreasing".into());
        }
        if !(s.quality_bonus_per_tier > 0.0) {
            return invalid("scoring.quality_bonus_per_tier must be positive".into());
        }
        if !(s.skill_bonus_growth >= 1.0) {
            return invalid("scoring.skill_bonus_growth must be >= 1.0".into());
        }

        Ok(())
    }
}

/// Candidate search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search radius around the agent
    pub radius: f32,
    /// Maximum candidates scored per evaluation
    pub max_candidates: usize,
    /// A candidate must exceed current score times this ratio
    pub upgrade_threshold: f32,
    /// Allow upgrading pinned equipment within its pinned archetype
    pub allow_pin_upgrades: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius: 30.0,
            max_candidates: 8,
            upgrade_threshold: 1.15,
            allow_pin_upgrades: false,
        }
    }
}

/// Cooldown durations in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// After a swap by an agent that started unarmed
    pub emergency: Tick,
    /// After a swap by an armed agent
    pub post_swap: Tick,
    /// After a search that found nothing worth taking
    pub failed_search: Tick,
    /// After skipping the search because of a pin
    pub pin_hold: Tick,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            emergency: 60,
            post_swap: 250,
            failed_search: 900,
            pin_hold: 120,
        }
    }
}

/// Dropped-item memory windows in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroppedConfig {
    /// Immunity after the engine swaps an item away
    pub swap_ttl: Tick,
    /// Blanket over a whole drop-then-equip sequence
    pub pending_ttl: Tick,
    /// Immunity after a drop the engine did not originate
    pub external_drop_ttl: Tick,
}

impl Default for DroppedConfig {
    fn default() -> Self {
        Self {
            swap_ttl: 120,
            pending_ttl: 600,
            external_drop_ttl: 120,
        }
    }
}

/// Pinned-equipment grace settings in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// How long a pinned item may lie off its agent
    pub grace_window: Tick,
    /// Absolute limit even while the agent keeps trying to re-equip
    pub hard_timeout: Tick,
    /// Interval between grace checks
    pub check_interval: Tick,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            grace_window: 300,
            hard_timeout: 1200,
            check_interval: 60,
        }
    }
}

/// Cleanup coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Ticks between sweep slices
    pub sweep_interval: Tick,
    /// Registry entries examined per slice
    pub budget_per_sweep: usize,
    /// Ticks between scheduler audits
    pub drift_interval: Tick,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval: 250,
            budget_per_sweep: 64,
            drift_interval: 5000,
        }
    }
}

/// A threshold band: values at or above `at_least` earn `bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub at_least: f32,
    pub bonus: f32,
}

impl Band {
    pub const fn new(at_least: f32, bonus: f32) -> Self {
        Self { at_least, bonus }
    }
}

/// Returns the bonus of the highest band the value reaches, or 0.
pub fn band_bonus(bands: &[Band], value: f32) -> f32 {
    bands
        .iter()
        .filter(|b| value >= b.at_least)
        .max_by(|a, b| a.at_least.total_cmp(&b.at_least))
        .map_or(0.0, |b| b.bonus)
}

/// Scoring tables and weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Damage multiplier per quality tier, Awful through Legendary
    pub quality_damage_multipliers: Vec<f32>,
    /// Flat bonus per quality ordinal
    pub quality_bonus_per_tier: f32,
    /// Weight applied to damage per 60 ticks
    pub dps_weight: f32,
    /// Raw effectiveness above this counts at half weight
    pub dampen_threshold: f32,
    pub range_bands: Vec<Band>,
    pub burst_bands: Vec<Band>,
    pub armor_penetration_bands: Vec<Band>,
    pub brawler_melee_multiplier: f32,
    pub brawler_ranged_multiplier: f32,
    pub trigger_happy_burst_multiplier: f32,
    pub careful_shooter_multiplier: f32,
    /// Range at which an item counts as long-range
    pub long_range: f32,
    pub duty_match_bonus: f32,
    pub skill_bonus_base: f32,
    pub skill_bonus_growth: f32,
    pub skill_bonus_cap: f32,
    /// Share of the base score lost at zero condition
    pub condition_weight: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            quality_damage_multipliers: vec![0.8, 0.9, 1.0, 1.1, 1.2, 1.35, 1.5],
            quality_bonus_per_tier: 1.0,
            dps_weight: 4.0,
            dampen_threshold: 40.0,
            range_bands: vec![
                Band::new(0.0, 0.0),
                Band::new(12.0, 4.0),
                Band::new(25.0, 8.0),
                Band::new(35.0, 12.0),
            ],
            burst_bands: vec![Band::new(1.0, 0.0), Band::new(3.0, 4.0), Band::new(5.0, 7.0)],
            armor_penetration_bands: vec![
                Band::new(0.0, 0.0),
                Band::new(0.1, 2.0),
                Band::new(0.2, 5.0),
                Band::new(0.35, 9.0),
            ],
            brawler_melee_multiplier: 1.4,
            brawler_ranged_multiplier: 0.4,
            trigger_happy_burst_multiplier: 1.2,
            careful_shooter_multiplier: 1.2,
            long_range: 25.0,
            duty_match_bonus: 8.0,
            skill_bonus_base: 1.5,
            skill_bonus_growth: 1.3,
            skill_bonus_cap: 30.0,
            condition_weight: 0.5,
        }
    }
}

/// Eligibility rules for agents and items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityConfig {
    /// Activities during which agents are never re-equipped
    pub exempt_activities: Vec<Activity>,
    /// Containers the engine never takes items out of
    pub disallowed_containers: Vec<ContainerKind>,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            exempt_activities: vec![Activity::Sleeping, Activity::Downed, Activity::Fighting],
            disallowed_containers: vec![
                ContainerKind::Grave,
                ContainerKind::Sarcophagus,
                ContainerKind::Corpse,
            ],
        }
    }
}

/// Returns the default configuration as a TOML string.
pub fn default_config_toml() -> String {
    EngineConfig::default()
        .to_toml()
        .unwrap_or_else(|e| format!("# failed to render default config: {e}\n"))
}

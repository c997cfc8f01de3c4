//! Base Score
//!
//! Effectiveness proxy that depends only on archetype stats and quality, so it
//! can be cached per `(archetype, quality)` for the whole session.

use crate::config::{band_bonus, ScoringConfig};
use crate::model::{ArchetypeStats, Quality};

/// Share of raw effectiveness that counts above the dampening threshold.
pub const DAMPEN_FACTOR: f32 = 0.5;

/// Ticks over which damage output is measured.
const DPS_WINDOW_TICKS: f32 = 60.0;

/// Counts anything above `threshold` at half weight.
pub fn dampen(raw: f32, threshold: f32) -> f32 {
    if raw > threshold {
        threshold + (raw - threshold) * DAMPEN_FACTOR
    } else {
        raw
    }
}

/// Damage per 60 ticks after the quality multiplier.
pub fn damage_per_window(config: &ScoringConfig, stats: &ArchetypeStats, quality: Quality) -> f32 {
    let multiplier = config
        .quality_damage_multipliers
        .get(quality.ordinal() as usize)
        .copied()
        .unwrap_or(1.0);
    let cycle = (stats.cooldown_ticks + stats.warmup_ticks).max(1.0);
    let shots = stats.burst_count.max(1) as f32;

    stats.damage.max(0.0) * multiplier * shots * DPS_WINDOW_TICKS / cycle
}

/// Computes the uncached base score for an archetype at a quality tier.
pub fn compute_base_score(config: &ScoringConfig, stats: &ArchetypeStats, quality: Quality) -> f32 {
    let raw = damage_per_window(config, stats, quality) * config.dps_weight;
    let effectiveness = dampen(raw, config.dampen_threshold);

    let range = if stats.melee {
        0.0
    } else {
        band_bonus(&config.range_bands, stats.range)
    };
    let burst = band_bonus(&config.burst_bands, stats.burst_count as f32);
    let penetration = band_bonus(&config.armor_penetration_bands, stats.armor_penetration);
    let tier = quality.ordinal() as f32 * config.quality_bonus_per_tier;

    effectiveness + range + burst + penetration + tier
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rifle() -> ArchetypeStats {
        ArchetypeStats::ranged(18.0, 100.0, 60.0, 1, 30.0).with_armor_penetration(0.27)
    }

    #[test]
    fn test_dampen_halves_excess() {
        assert_eq!(dampen(30.0, 40.0), 30.0);
        assert_eq!(dampen(40.0, 40.0), 40.0);
        assert_eq!(dampen(60.0, 40.0), 50.0);
    }

    #[test]
    fn test_damage_per_window() {
        let config = ScoringConfig::default();
        // 18 * 1.0 * 1 * 60 / 160 = 6.75
        let dpw = damage_per_window(&config, &rifle(), Quality::Normal);
        assert!((dpw - 6.75).abs() < 0.001);
    }

    #[test]
    fn test_base_score_components() {
        let config = ScoringConfig::default();
        // raw 27.0 (below threshold) + range 8 + burst 0 + ap 5 + tier 2
        let score = compute_base_score(&config, &rifle(), Quality::Normal);
        assert!((score - 42.0).abs() < 0.001);
    }

    #[test]
    fn test_monotonic_in_quality() {
        let config = ScoringConfig::default();
        let heavy = ArchetypeStats::ranged(40.0, 40.0, 20.0, 3, 20.0);
        for stats in [rifle(), heavy, ArchetypeStats::melee(12.0, 80.0, 0.1)] {
            let scores: Vec<f32> = Quality::all()
                .iter()
                .map(|&q| compute_base_score(&config, &stats, q))
                .collect();
            assert!(scores.windows(2).all(|w| w[1] > w[0]), "{scores:?}");
        }
    }

    #[test]
    fn test_power_creep_is_dampened() {
        let config = ScoringConfig::default();
        let light = ArchetypeStats::melee(10.0, 60.0, 0.0);
        let huge = ArchetypeStats::melee(100.0, 60.0, 0.0);
        let light_score = compute_base_score(&config, &light, Quality::Normal);
        let huge_score = compute_base_score(&config, &huge, Quality::Normal);
        // 10x the damage earns well under 10x the score
        assert!(huge_score > light_score);
        assert!(huge_score < light_score * 6.0);
    }
}

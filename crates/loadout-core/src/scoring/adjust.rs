//! Agent-Specific Adjustments
//!
//! Terms that depend on who is holding the item. None of these ever enter the
//! base-score cache.

use crate::config::ScoringConfig;
use crate::model::{AgentTrait, AgentView, ArchetypeStats, ItemView};

/// Breakdown of the uncached part of a score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Adjustments {
    /// `base * (trait multiplier - 1)`
    pub trait_delta: f32,
    pub duty_bonus: f32,
    pub skill_bonus: f32,
    /// Subtracted for worn items
    pub condition_penalty: f32,
}

impl Adjustments {
    pub fn total(&self) -> f32 {
        self.trait_delta + self.duty_bonus + self.skill_bonus - self.condition_penalty
    }
}

/// Combined multiplier from the agent's trait flags.
pub fn trait_multiplier(config: &ScoringConfig, agent: &AgentView, stats: &ArchetypeStats) -> f32 {
    let mut multiplier = 1.0;
    for t in &agent.traits {
        multiplier *= match t {
            AgentTrait::Brawler if stats.melee => config.brawler_melee_multiplier,
            AgentTrait::Brawler => config.brawler_ranged_multiplier,
            AgentTrait::TriggerHappy if stats.burst_count >= 3 => config.trigger_happy_burst_multiplier,
            AgentTrait::CarefulShooter if !stats.melee && stats.range >= config.long_range => {
                config.careful_shooter_multiplier
            }
            _ => 1.0,
        };
    }
    multiplier
}

/// Bonus growing geometrically with how far the matching skill leads the
/// opposing one, capped.
pub fn skill_bonus(config: &ScoringConfig, agent: &AgentView, stats: &ArchetypeStats) -> f32 {
    let (matching, opposing) = agent.skills.matching_and_opposing(stats.melee);
    let gap = matching.saturating_sub(opposing);
    if gap == 0 {
        return 0.0;
    }
    let bonus = config.skill_bonus_base * (config.skill_bonus_growth.powi(gap as i32) - 1.0);
    bonus.min(config.skill_bonus_cap)
}

pub fn compute_adjustments(
    config: &ScoringConfig,
    agent: &AgentView,
    item: &ItemView,
    stats: &ArchetypeStats,
    base: f32,
) -> Adjustments {
    let duty_bonus = match agent.duty {
        Some(duty) if stats.suits(duty) => config.duty_match_bonus,
        _ => 0.0,
    };
    let wear = 1.0 - item.condition.clamp(0.0, 1.0);

    Adjustments {
        trait_delta: base * (trait_multiplier(config, agent, stats) - 1.0),
        duty_bonus,
        skill_bonus: skill_bonus(config, agent, stats),
        condition_penalty: base * wear * config.condition_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Duty, Position, Quality, Skills};
    use loadout_events::{AgentId, ItemId};

    fn agent() -> AgentView {
        AgentView::new(AgentId(1), Position::default())
    }

    fn item() -> ItemView {
        ItemView::new(ItemId(1), "club", Quality::Normal, Position::default())
    }

    #[test]
    fn test_brawler_prefers_melee() {
        let config = ScoringConfig::default();
        let mut brawler = agent();
        brawler.traits.push(AgentTrait::Brawler);

        let club = ArchetypeStats::melee(10.0, 60.0, 0.1);
        let bow = ArchetypeStats::ranged(10.0, 60.0, 30.0, 1, 28.0);
        assert!(trait_multiplier(&config, &brawler, &club) > 1.0);
        assert!(trait_multiplier(&config, &brawler, &bow) < 1.0);
        assert_eq!(trait_multiplier(&config, &agent(), &club), 1.0);
    }

    #[test]
    fn test_skill_bonus_grows_and_caps() {
        let config = ScoringConfig::default();
        let club = ArchetypeStats::melee(10.0, 60.0, 0.1);

        let mut small = agent();
        small.skills = Skills::new(6, 4);
        let mut large = agent();
        large.skills = Skills::new(14, 4);
        let mut huge = agent();
        huge.skills = Skills::new(20, 0);
        let mut reversed = agent();
        reversed.skills = Skills::new(2, 15);

        let s = skill_bonus(&config, &small, &club);
        let l = skill_bonus(&config, &large, &club);
        assert!(s > 0.0);
        assert!(l > s * 2.0);
        assert_eq!(skill_bonus(&config, &huge, &club), config.skill_bonus_cap);
        assert_eq!(skill_bonus(&config, &reversed, &club), 0.0);
    }

    #[test]
    fn test_duty_and_condition() {
        let config = ScoringConfig::default();
        let bow = ArchetypeStats::ranged(10.0, 60.0, 30.0, 1, 28.0).with_duties(vec![Duty::Hunter]);

        let mut hunter = agent();
        hunter.duty = Some(Duty::Hunter);
        let mut worn = item();
        worn.condition = 0.5;

        let adj = compute_adjustments(&config, &hunter, &worn, &bow, 20.0);
        assert_eq!(adj.duty_bonus, config.duty_match_bonus);
        // 20 * 0.5 * 0.5
        assert!((adj.condition_penalty - 5.0).abs() < 0.001);
        assert!((adj.total() - (config.duty_match_bonus - 5.0)).abs() < 0.001);

        let fresh = compute_adjustments(&config, &agent(), &item(), &bow, 20.0);
        assert_eq!(fresh.total(), 0.0);
    }
}

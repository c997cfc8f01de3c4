//! Scoring Engine
//!
//! `score(agent, item)` is a cached base score that depends only on the
//! item's archetype and quality, plus uncached agent-specific adjustments.
//! Any rejection short-circuits before a single adjustment is computed.

pub mod adjust;
pub mod base;

use std::collections::HashMap;

use loadout_events::ArchetypeId;

use crate::config::ScoringConfig;
use crate::host::HostWorld;
use crate::model::{AgentTrait, AgentView, ArchetypeStats, ItemView, Quality};

pub use adjust::{compute_adjustments, Adjustments};
pub use base::{compute_base_score, dampen};

/// Why an item can never be chosen by this agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Allow-list forbids it
    Policy,
    /// Bonded to a different agent
    BoundToOther,
    /// Host has no stats for the archetype
    UnknownArchetype,
    /// Agent refuses to wield anything
    Incapable,
}

/// Result of scoring one item for one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Rejected(RejectReason),
    Value(f32),
}

impl Score {
    pub fn value(&self) -> Option<f32> {
        match self {
            Score::Value(v) => Some(*v),
            Score::Rejected(_) => None,
        }
    }

    /// Rejected items count as nothing at all.
    pub fn value_or_zero(&self) -> f32 {
        self.value().unwrap_or(0.0)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Score::Rejected(_))
    }
}

/// Full breakdown of an accepted score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub base: f32,
    pub adjustments: Adjustments,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f32 {
        self.base + self.adjustments.total()
    }
}

/// Scorer with the session-long base-score cache.
#[derive(Debug, Default)]
pub struct Scorer {
    cache: HashMap<(ArchetypeId, Quality), f32>,
    hits: u64,
    misses: u64,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base score for an archetype at a quality tier, computed once.
    pub fn base_score(
        &mut self,
        config: &ScoringConfig,
        archetype: &ArchetypeId,
        stats: &ArchetypeStats,
        quality: Quality,
    ) -> f32 {
        if let Some(&cached) = self.cache.get(&(archetype.clone(), quality)) {
            self.hits += 1;
            return cached;
        }
        self.misses += 1;
        let score = compute_base_score(config, stats, quality);
        self.cache.insert((archetype.clone(), quality), score);
        score
    }

    /// Score with its breakdown, or the first rejection that applies.
    pub fn score_detailed(
        &mut self,
        config: &ScoringConfig,
        host: &dyn HostWorld,
        agent: &AgentView,
        item: &ItemView,
    ) -> Result<ScoreBreakdown, RejectReason> {
        if !host.is_policy_allowed(agent.id, item.id) {
            return Err(RejectReason::Policy);
        }
        if item.bound_to.is_some_and(|owner| owner != agent.id) {
            return Err(RejectReason::BoundToOther);
        }
        if agent.has_trait(AgentTrait::Pacifist) {
            return Err(RejectReason::Incapable);
        }
        let stats = host
            .archetype(&item.archetype)
            .ok_or(RejectReason::UnknownArchetype)?;

        let base = self.base_score(config, &item.archetype, &stats, item.quality);
        Ok(ScoreBreakdown {
            base,
            adjustments: compute_adjustments(config, agent, item, &stats, base),
        })
    }

    pub fn score(
        &mut self,
        config: &ScoringConfig,
        host: &dyn HostWorld,
        agent: &AgentView,
        item: &ItemView,
    ) -> Score {
        match self.score_detailed(config, host, agent, item) {
            Ok(breakdown) => Score::Value(breakdown.total()),
            Err(reason) => Score::Rejected(reason),
        }
    }

    /// Drop every cached base score. Only a model change calls this.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use crate::model::Position;
    use loadout_events::{AgentId, ItemId, Tick};

    struct Catalog {
        deny: Option<ItemId>,
    }

    impl HostWorld for Catalog {
        fn current_tick(&self) -> Tick {
            0
        }
        fn agent(&self, _id: AgentId) -> Option<AgentView> {
            None
        }
        fn item(&self, _id: ItemId) -> Option<ItemView> {
            None
        }
        fn archetype(&self, id: &ArchetypeId) -> Option<ArchetypeStats> {
            match id.as_str() {
                "rifle" => Some(ArchetypeStats::ranged(18.0, 100.0, 60.0, 1, 30.0)),
                "knife" => Some(ArchetypeStats::melee(9.0, 60.0, 0.1)),
                _ => None,
            }
        }
        fn spatial_query(&self, _origin: Position, _radius: f32) -> Result<Vec<ItemId>, HostError> {
            Ok(Vec::new())
        }
        fn is_policy_allowed(&self, _agent: AgentId, item: ItemId) -> bool {
            self.deny != Some(item)
        }
        fn move_item_to_agent(&mut self, _agent: AgentId, _item: ItemId) -> Result<(), HostError> {
            Ok(())
        }
        fn drop_item(&mut self, _agent: AgentId, _item: ItemId) -> Result<(), HostError> {
            Ok(())
        }
    }

    fn agent() -> AgentView {
        AgentView::new(AgentId(1), Position::default())
    }

    fn rifle(id: u64, quality: Quality) -> ItemView {
        ItemView::new(ItemId(id), "rifle", quality, Position::default())
    }

    #[test]
    fn test_cache_is_keyed_by_archetype_and_quality() {
        let config = ScoringConfig::default();
        let host = Catalog { deny: None };
        let mut scorer = Scorer::new();

        scorer.score(&config, &host, &agent(), &rifle(1, Quality::Normal));
        scorer.score(&config, &host, &agent(), &rifle(2, Quality::Normal));
        scorer.score(&config, &host, &agent(), &rifle(3, Quality::Excellent));

        assert_eq!(scorer.cached_entries(), 2);
        assert_eq!(scorer.misses(), 2);
        assert_eq!(scorer.hits(), 1);

        scorer.invalidate();
        assert_eq!(scorer.cached_entries(), 0);
    }

    #[test]
    fn test_agent_adjustments_stay_out_of_cache() {
        let config = ScoringConfig::default();
        let host = Catalog { deny: None };
        let mut scorer = Scorer::new();

        let mut marksman = agent();
        marksman.skills.shooting = 15;

        let plain = scorer.score(&config, &host, &agent(), &rifle(1, Quality::Normal));
        let skilled = scorer.score(&config, &host, &marksman, &rifle(1, Quality::Normal));
        assert!(skilled.value().unwrap() > plain.value().unwrap());

        // Same cache entry served both agents
        assert_eq!(scorer.cached_entries(), 1);
        let base = scorer.base_score(
            &config,
            &ArchetypeId::new("rifle"),
            &ArchetypeStats::ranged(18.0, 100.0, 60.0, 1, 30.0),
            Quality::Normal,
        );
        assert_eq!(Score::Value(base), plain);
    }

    #[test]
    fn test_rejections_short_circuit() {
        let config = ScoringConfig::default();
        let mut scorer = Scorer::new();

        let denied = Catalog { deny: Some(ItemId(5)) };
        assert_eq!(
            scorer.score(&config, &denied, &agent(), &rifle(5, Quality::Normal)),
            Score::Rejected(RejectReason::Policy)
        );

        let host = Catalog { deny: None };
        let mut bonded = rifle(6, Quality::Normal);
        bonded.bound_to = Some(AgentId(99));
        assert_eq!(
            scorer.score(&config, &host, &agent(), &bonded),
            Score::Rejected(RejectReason::BoundToOther)
        );
        bonded.bound_to = Some(AgentId(1));
        assert!(!scorer.score(&config, &host, &agent(), &bonded).is_rejected());

        let unknown = ItemView::new(ItemId(7), "trebuchet", Quality::Normal, Position::default());
        assert_eq!(
            scorer.score(&config, &host, &agent(), &unknown),
            Score::Rejected(RejectReason::UnknownArchetype)
        );

        let mut pacifist = agent();
        pacifist.traits.push(AgentTrait::Pacifist);
        assert_eq!(
            scorer.score(&config, &host, &pacifist, &rifle(8, Quality::Normal)),
            Score::Rejected(RejectReason::Incapable)
        );

        // No rejection ever touched the cache
        assert_eq!(scorer.cached_entries(), 1);
    }

    #[test]
    fn test_quality_ordering_for_scored_items() {
        let config = ScoringConfig::default();
        let host = Catalog { deny: None };
        let mut scorer = Scorer::new();

        let poor = scorer.score(&config, &host, &agent(), &rifle(1, Quality::Poor)).value_or_zero();
        let normal = scorer.score(&config, &host, &agent(), &rifle(2, Quality::Normal)).value_or_zero();
        let excellent = scorer.score(&config, &host, &agent(), &rifle(3, Quality::Excellent)).value_or_zero();
        assert!(excellent > normal && normal > poor);
    }
}

//! Candidate Locator
//!
//! Finds the items near an agent that it could plausibly take right now.
//! Every item the host returns runs through a fixed chain of eligibility
//! checks, cheapest first, and the first denial wins. Survivors are ordered
//! nearest-first and capped before anything gets scored.

use std::collections::HashMap;

use thiserror::Error;

use loadout_events::{AgentId, Tick};

use crate::config::EligibilityConfig;
use crate::host::{HostCapabilities, HostError, HostWorld};
use crate::model::{AgentView, ItemView};
use crate::registry::{DroppedItemMemory, PinnedEquipmentTracker};

/// The spatial query failed; the caller treats this as "nothing found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("candidate search for {agent} failed: {source}")]
pub struct LocateError {
    pub agent: AgentId,
    #[source]
    pub source: HostError,
}

/// Why an item was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    AlreadyEquipped,
    Destroyed,
    RecentlyDropped,
    PinnedElsewhere,
    HeldByOther,
    DisallowedContainer,
    Burning,
    MissingSkill,
    Policy,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allow,
    Deny(DenyReason),
}

/// One link of the eligibility chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityCheck {
    NotSelf,
    NotDestroyed,
    NotRecentlyDropped,
    NotPinnedElsewhere,
    NotHeldByOther,
    NotInDisallowedContainer,
    NotBurning,
    PrerequisitesMet,
    PolicyAllowed,
    Reservable,
}

impl EligibilityCheck {
    /// The chain in evaluation order.
    pub const CHAIN: [EligibilityCheck; 10] = [
        EligibilityCheck::NotSelf,
        EligibilityCheck::NotDestroyed,
        EligibilityCheck::NotRecentlyDropped,
        EligibilityCheck::NotPinnedElsewhere,
        EligibilityCheck::NotHeldByOther,
        EligibilityCheck::NotInDisallowedContainer,
        EligibilityCheck::NotBurning,
        EligibilityCheck::PrerequisitesMet,
        EligibilityCheck::PolicyAllowed,
        EligibilityCheck::Reservable,
    ];

    /// Whether this check runs at all on a host with these capabilities.
    pub fn applies(self, caps: &HostCapabilities) -> bool {
        match self {
            EligibilityCheck::NotInDisallowedContainer => caps.containers,
            EligibilityCheck::NotBurning => caps.fire,
            EligibilityCheck::Reservable => caps.reservations,
            _ => true,
        }
    }

    pub fn evaluate(self, ctx: &LocateContext<'_>, agent: &AgentView, item: &ItemView) -> Eligibility {
        let denied = match self {
            EligibilityCheck::NotSelf => {
                (agent.equipped == Some(item.id) || item.is_held_by(agent.id)).then_some(DenyReason::AlreadyEquipped)
            }
            EligibilityCheck::NotDestroyed => item.destroyed.then_some(DenyReason::Destroyed),
            EligibilityCheck::NotRecentlyDropped => ctx
                .dropped
                .is_dropped(item.id, ctx.now)
                .then_some(DenyReason::RecentlyDropped),
            EligibilityCheck::NotPinnedElsewhere => ctx
                .pins
                .pinned_owner(item.id)
                .is_some_and(|owner| owner != agent.id)
                .then_some(DenyReason::PinnedElsewhere),
            EligibilityCheck::NotHeldByOther => item
                .holder
                .is_some_and(|holder| holder != agent.id)
                .then_some(DenyReason::HeldByOther),
            EligibilityCheck::NotInDisallowedContainer => item
                .container
                .is_some_and(|c| ctx.eligibility.disallowed_containers.contains(&c))
                .then_some(DenyReason::DisallowedContainer),
            EligibilityCheck::NotBurning => item.burning.then_some(DenyReason::Burning),
            EligibilityCheck::PrerequisitesMet => match ctx.host.archetype(&item.archetype) {
                Some(stats) => {
                    let (skill, _) = agent.skills.matching_and_opposing(stats.melee);
                    (skill < stats.required_skill).then_some(DenyReason::MissingSkill)
                }
                // Unknown archetypes are rejected by the scorer instead
                None => None,
            },
            EligibilityCheck::PolicyAllowed => {
                (!ctx.host.is_policy_allowed(agent.id, item.id)).then_some(DenyReason::Policy)
            }
            EligibilityCheck::Reservable => {
                (!ctx.host.can_reserve(agent.id, item.id)).then_some(DenyReason::Reserved)
            }
        };
        denied.map_or(Eligibility::Allow, Eligibility::Deny)
    }
}

/// Everything the chain reads besides the agent and item.
pub struct LocateContext<'a> {
    pub host: &'a dyn HostWorld,
    pub dropped: &'a DroppedItemMemory,
    pub pins: &'a PinnedEquipmentTracker,
    pub eligibility: &'a EligibilityConfig,
    pub capabilities: HostCapabilities,
    pub now: Tick,
}

/// An eligible item with its distance from the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub item: ItemView,
    pub distance: f32,
}

/// Running tallies across searches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorStats {
    pub searches: u64,
    pub query_failures: u64,
    /// Ids the host returned but could no longer resolve
    pub stale: u64,
    pub denied: HashMap<DenyReason, u64>,
}

impl LocatorStats {
    pub fn denied_for(&self, reason: DenyReason) -> u64 {
        self.denied.get(&reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct CandidateLocator {
    stats: LocatorStats,
}

impl CandidateLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one item through the chain.
    pub fn check(&mut self, ctx: &LocateContext<'_>, agent: &AgentView, item: &ItemView) -> Eligibility {
        for check in EligibilityCheck::CHAIN {
            if !check.applies(&ctx.capabilities) {
                continue;
            }
            if let Eligibility::Deny(reason) = check.evaluate(ctx, agent, item) {
                *self.stats.denied.entry(reason).or_insert(0) += 1;
                return Eligibility::Deny(reason);
            }
        }
        Eligibility::Allow
    }

    /// Eligible items within `radius`, nearest first (ties by id), at most
    /// `limit` of them.
    pub fn find_candidates(
        &mut self,
        ctx: &LocateContext<'_>,
        agent: &AgentView,
        radius: f32,
        limit: usize,
    ) -> Result<Vec<Candidate>, LocateError> {
        self.stats.searches += 1;
        let ids = ctx
            .host
            .spatial_query(agent.position, radius)
            .map_err(|source| {
                self.stats.query_failures += 1;
                LocateError { agent: agent.id, source }
            })?;

        let mut nearby: Vec<(f32, ItemView)> = Vec::with_capacity(ids.len());
        for id in ids {
            match ctx.host.item(id) {
                Some(item) => {
                    let distance = agent.position.distance(&item.position);
                    if distance <= radius {
                        nearby.push((distance, item));
                    }
                }
                None => self.stats.stale += 1,
            }
        }
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        let mut candidates = Vec::new();
        for (distance, item) in nearby {
            if candidates.len() >= limit {
                break;
            }
            if self.check(ctx, agent, &item) == Eligibility::Allow {
                candidates.push(Candidate { item, distance });
            }
        }

        tracing::debug!("{} has {} candidates within {}", agent.id, candidates.len(), radius);
        Ok(candidates)
    }

    pub fn stats(&self) -> &LocatorStats {
        &self.stats
    }
}

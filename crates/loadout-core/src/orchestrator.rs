//! Cooldown-Gated Decision Loop
//!
//! One evaluation walks Idle -> Evaluating -> {CoolingDown | Acting} and ends
//! in exactly one [`Decision`], with an event in the outbox for every branch
//! that armed a cooldown.

use std::collections::BTreeSet;

use loadout_events::{AgentId, ArchetypeId, CooldownKind, DeferReason, EngineEventKind, ItemId, Tick};

use crate::engine::Engine;
use crate::host::{HostError, HostWorld};
use crate::locator::{Candidate, LocateContext};
use crate::model::{AgentView, ItemView};
use crate::registry::duration_for;

/// Why an evaluation stopped before looking at any item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Stale id
    InvalidAgent,
    CoolingDown,
    /// Dead, not under control, or busy with an exempt activity
    Ineligible,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Skipped(SkipReason),
    /// Pinned equipment kept; short hold cooldown armed
    Held,
    Deferred(DeferReason),
    Swapped { from: Option<ItemId>, to: ItemId },
}

impl Decision {
    pub fn is_swap(&self) -> bool {
        matches!(self, Decision::Swapped { .. })
    }
}

/// Best scored candidate.
struct Choice {
    item: ItemView,
    score: f32,
}

/// Whether `candidate` is worth swapping to from `current`.
pub fn beats(current: f32, candidate: f32, threshold: f32) -> bool {
    if current <= 0.0 {
        candidate > 0.0
    } else {
        candidate > current * threshold
    }
}

impl Engine {
    /// Evaluate one agent and act on the result. Hosts call [`Engine::on_tick`]
    /// first each tick so expiries due now are already dispatched.
    pub fn evaluate(&mut self, host: &mut dyn HostWorld, agent: AgentId) -> Decision {
        self.now = self.now.max(host.current_tick());
        self.stats.evaluations += 1;

        let Some(view) = host.agent(agent) else {
            return self.skip(SkipReason::InvalidAgent);
        };
        if self.cooldowns.is_cooling(&self.scheduler, agent, self.now) {
            return self.skip(SkipReason::CoolingDown);
        }
        if !view.alive || !view.controllable || self.config.eligibility.exempt_activities.contains(&view.activity) {
            return self.skip(SkipReason::Ineligible);
        }

        let current = view.equipped.and_then(|id| host.item(id));
        let pinned_current = current.as_ref().filter(|item| self.pins.is_pinned(agent, item)).map(|i| i.id);
        let grace_item = self
            .pins
            .record(agent)
            .and_then(|r| r.item)
            .filter(|&item| self.pins.in_grace(item));

        if grace_item.is_some() || (pinned_current.is_some() && !self.config.search.allow_pin_upgrades) {
            return self.hold(agent, grace_item.or(pinned_current));
        }

        let current_score = current
            .as_ref()
            .map(|item| {
                self.scorer
                    .score(&self.config.scoring, &*host, &view, item)
                    .value_or_zero()
            })
            .unwrap_or(0.0);

        let candidates = {
            let ctx = LocateContext {
                host: &*host,
                dropped: &self.dropped,
                pins: &self.pins,
                eligibility: &self.config.eligibility,
                capabilities: self.capabilities,
                now: self.now,
            };
            self.locator.find_candidates(
                &ctx,
                &view,
                self.config.search.radius,
                self.config.search.max_candidates,
            )
        };
        let candidates = match candidates {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("{}", e);
                return self.defer(agent, DeferReason::HostFailure);
            }
        };

        let allowed = self.pin_filter(&*host, agent);
        let candidates: Vec<Candidate> = match &allowed {
            Some(archetypes) => candidates
                .into_iter()
                .filter(|c| archetypes.contains(&c.item.archetype))
                .collect(),
            None => candidates,
        };
        if candidates.is_empty() {
            return self.defer(agent, DeferReason::NoCandidates);
        }

        let mut best: Option<Choice> = None;
        for candidate in candidates {
            let score = self.scorer.score(&self.config.scoring, &*host, &view, &candidate.item);
            let Some(score) = score.value() else {
                continue;
            };
            // Candidates come nearest-first, so ties keep the nearer item
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(Choice {
                    item: candidate.item,
                    score,
                });
            }
        }

        match best {
            Some(choice) if beats(current_score, choice.score, self.config.search.upgrade_threshold) => {
                tracing::debug!(
                    "{} prefers {} ({:.1}) over {:?} ({:.1})",
                    agent,
                    choice.item.id,
                    choice.score,
                    view.equipped,
                    current_score
                );
                self.swap(host, &view, pinned_current, current_score, choice)
            }
            _ => self.defer(agent, DeferReason::BelowThreshold),
        }
    }

    /// Archetypes an agent with pins may switch to, or `None` if unrestricted.
    fn pin_filter(&self, host: &dyn HostWorld, agent: AgentId) -> Option<BTreeSet<ArchetypeId>> {
        let record = self.pins.record(agent)?;
        let mut allowed = record.archetypes.clone();
        if let Some(item) = record.item.and_then(|id| host.item(id)) {
            allowed.insert(item.archetype);
        }
        (!allowed.is_empty()).then_some(allowed)
    }

    fn swap(
        &mut self,
        host: &mut dyn HostWorld,
        view: &AgentView,
        pinned_current: Option<ItemId>,
        from_score: f32,
        choice: Choice,
    ) -> Decision {
        let agent = view.id;
        let to = choice.item.id;
        let from = view.equipped;
        let now = self.now;

        if self.capabilities.reservations && !host.reserve(agent, to) {
            tracing::debug!("{} lost the reservation race for {}", agent, to);
            return self.defer(agent, DeferReason::ReservationDenied);
        }

        if let Err(e) = self.release_old(host, agent, from) {
            tracing::warn!("Swap for {} failed: {}", agent, e);
            if self.capabilities.reservations {
                host.release(agent, to);
            }
            return self.defer(agent, DeferReason::HostFailure);
        }
        if let Err(e) = host.move_item_to_agent(agent, to) {
            tracing::warn!("Swap for {} failed: {}", agent, e);
            if self.capabilities.reservations {
                host.release(agent, to);
            }
            return self.roll_back(host, agent, from);
        }

        if let Some(old) = from {
            self.dropped
                .complete_pending_drop(&mut self.scheduler, old, now, self.config.dropped.swap_ttl);
        }
        if self.capabilities.reservations {
            host.release(agent, to);
        }
        if pinned_current.is_some_and(|old| self.pins.pinned_owner(old) == Some(agent)) {
            self.pins.pin_item(&mut self.scheduler, agent, to);
        }

        let cooldown = if from.is_none() {
            CooldownKind::Emergency
        } else {
            CooldownKind::PostSwap
        };
        let cooldown_until = self.arm(agent, cooldown);
        self.stats.swaps += 1;
        tracing::info!("{} swapped {:?} -> {} at tick {}", agent, from, to, now);
        self.emit(EngineEventKind::Swapped {
            agent,
            from,
            to,
            from_score,
            to_score: choice.score,
            cooldown,
            cooldown_until,
        });
        Decision::Swapped { from, to }
    }

    /// Drop the old item under a pending window. Nothing is left marked if
    /// the host refuses.
    fn release_old(
        &mut self,
        host: &mut dyn HostWorld,
        agent: AgentId,
        from: Option<ItemId>,
    ) -> Result<(), HostError> {
        let Some(old) = from else {
            return Ok(());
        };
        self.dropped.mark_pending_drop(
            &mut self.scheduler,
            old,
            self.now,
            self.config.dropped.pending_ttl,
            Some(agent),
        );
        if let Err(e) = host.drop_item(agent, old) {
            self.dropped.clear(&mut self.scheduler, old);
            return Err(e);
        }
        Ok(())
    }

    /// The new item could not be equipped after the old one was dropped.
    /// Hand the old item back; if that fails too the agent is now unarmed and
    /// the old item is treated like any other drop.
    fn roll_back(&mut self, host: &mut dyn HostWorld, agent: AgentId, from: Option<ItemId>) -> Decision {
        let Some(old) = from else {
            return self.defer(agent, DeferReason::HostFailure);
        };
        self.dropped.clear(&mut self.scheduler, old);
        match host.move_item_to_agent(agent, old) {
            Ok(()) => {
                tracing::debug!("{} took back {}", agent, old);
                self.defer(agent, DeferReason::HostFailure)
            }
            Err(e) => {
                tracing::warn!("{} left without {}: {}", agent, old, e);
                self.on_drop(agent, old);
                self.defer_with(agent, DeferReason::HostFailure, CooldownKind::Emergency)
            }
        }
    }

    fn arm(&mut self, agent: AgentId, kind: CooldownKind) -> Tick {
        let duration = duration_for(&self.config.cooldowns, kind);
        self.cooldowns.arm(&mut self.scheduler, agent, self.now, kind, duration)
    }

    fn skip(&mut self, reason: SkipReason) -> Decision {
        self.stats.skips += 1;
        Decision::Skipped(reason)
    }

    fn hold(&mut self, agent: AgentId, item: Option<ItemId>) -> Decision {
        let cooldown_until = self.arm(agent, CooldownKind::PinHold);
        self.stats.holds += 1;
        self.emit(EngineEventKind::PinHeld {
            agent,
            item,
            cooldown_until,
        });
        Decision::Held
    }

    fn defer(&mut self, agent: AgentId, reason: DeferReason) -> Decision {
        self.defer_with(agent, reason, CooldownKind::FailedSearch)
    }

    fn defer_with(&mut self, agent: AgentId, reason: DeferReason, cooldown: CooldownKind) -> Decision {
        let cooldown_until = self.arm(agent, cooldown);
        self.stats.deferrals += 1;
        tracing::debug!("{} deferred: {:?}", agent, reason);
        self.emit(EngineEventKind::SearchDeferred {
            agent,
            reason,
            cooldown_until,
        });
        Decision::Deferred(reason)
    }
}

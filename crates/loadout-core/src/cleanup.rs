//! Cleanup Coordinator
//!
//! Registries are kept honest by a self-rescheduling sweep rather than
//! per-tick polling. Each sweep works through one slice of one registry,
//! round-robin, and every so often audits the scheduler itself.

use loadout_events::{AgentId, EngineEventKind, ItemId, PinClearReason, Registry, Tick};

use crate::engine::Engine;
use crate::host::HostWorld;
use crate::scheduler::EventKind;

/// Registry a sweep slice works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Dropped,
    Cooldowns,
    Pins,
    Grace,
}

impl SweepPhase {
    pub fn next(self) -> Self {
        match self {
            SweepPhase::Dropped => SweepPhase::Cooldowns,
            SweepPhase::Cooldowns => SweepPhase::Pins,
            SweepPhase::Pins => SweepPhase::Grace,
            SweepPhase::Grace => SweepPhase::Dropped,
        }
    }
}

/// Round-robin position and worklist of the sweep.
#[derive(Debug)]
pub struct CleanupCoordinator {
    phase: SweepPhase,
    worklist: Vec<u64>,
    cursor: usize,
    loaded: bool,
    last_audit: Tick,
    sweeps: u64,
}

impl CleanupCoordinator {
    pub fn new(now: Tick) -> Self {
        Self {
            phase: SweepPhase::Dropped,
            worklist: Vec::new(),
            cursor: 0,
            loaded: false,
            last_audit: now,
            sweeps: 0,
        }
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Install a snapshot of the current phase's keys.
    fn load(&mut self, ids: Vec<u64>) {
        self.worklist = ids;
        self.cursor = 0;
        self.loaded = true;
    }

    /// Next slice of at most `budget` ids from the worklist.
    fn take(&mut self, budget: usize) -> Vec<u64> {
        let end = (self.cursor + budget).min(self.worklist.len());
        let slice = self.worklist[self.cursor..end].to_vec();
        self.cursor = end;
        slice
    }

    fn finished(&self) -> bool {
        self.cursor >= self.worklist.len()
    }

    fn advance(&mut self) {
        self.phase = self.phase.next();
        self.worklist.clear();
        self.cursor = 0;
        self.loaded = false;
    }

    pub fn reset(&mut self, now: Tick) {
        *self = Self::new(now);
    }
}

impl Engine {
    /// One sweep slice, then the periodic audit, then the next sweep.
    pub(crate) fn run_cleanup(&mut self, host: &dyn HostWorld, now: Tick) {
        self.cleanup.sweeps += 1;
        let budget = self.config.cleanup.budget_per_sweep;

        // Skip over empty phases, at most one full lap
        for _ in 0..4 {
            if !self.cleanup.loaded {
                let ids = self.snapshot(self.cleanup.phase);
                self.cleanup.load(ids);
            }
            if !self.cleanup.finished() {
                break;
            }
            self.cleanup.advance();
        }

        let phase = self.cleanup.phase;
        for id in self.cleanup.take(budget) {
            match phase {
                SweepPhase::Dropped => self.sweep_dropped(host, ItemId(id), now),
                SweepPhase::Cooldowns => self.sweep_cooldown(host, AgentId(id), now),
                SweepPhase::Pins => self.sweep_pin(host, AgentId(id)),
                SweepPhase::Grace => self.sweep_grace(ItemId(id), now),
            }
        }
        if self.cleanup.finished() {
            self.cleanup.advance();
        }

        if now >= self.cleanup.last_audit + self.config.cleanup.drift_interval {
            self.cleanup.last_audit = now;
            self.audit(host);
        }

        self.schedule_sweep();
    }

    /// Recount the scheduler; on mismatch discard derived state and rebuild
    /// it from ground truth.
    pub fn audit(&mut self, host: &dyn HostWorld) -> bool {
        let audit = self.scheduler.verify();
        if audit.is_consistent() {
            if audit.stale_slots > 0 {
                self.scheduler.compact();
            }
            return true;
        }

        let detail = format!(
            "{} indexed events but {} live slots",
            audit.indexed, audit.live_slots
        );
        tracing::warn!("Scheduler drift in engine {}: {}", self.session, detail);
        self.correct_drift(Registry::Scheduler, detail);

        let truth = self.export_ground_truth();
        self.rebuild_from_ground_truth(host, &truth);
        false
    }

    fn snapshot(&self, phase: SweepPhase) -> Vec<u64> {
        match phase {
            SweepPhase::Dropped => self.dropped.items().into_iter().map(|i| i.0).collect(),
            SweepPhase::Cooldowns => self.cooldowns.agents().into_iter().map(|a| a.0).collect(),
            SweepPhase::Pins => self.pins.agents().into_iter().map(|a| a.0).collect(),
            SweepPhase::Grace => self.pins.grace_items().into_iter().map(|i| i.0).collect(),
        }
    }

    fn correct_drift(&mut self, registry: Registry, detail: String) {
        self.stats.drift_corrections += 1;
        self.emit(EngineEventKind::DriftCorrected { registry, detail });
    }

    fn sweep_dropped(&mut self, host: &dyn HostWorld, item: ItemId, now: Tick) {
        let Some(record) = self.dropped.get(item).copied() else {
            return;
        };
        if !host.item(item).is_some_and(|view| !view.destroyed) {
            self.dropped.clear(&mut self.scheduler, item);
            return;
        }
        if record.expires_at <= now {
            self.scheduler.cancel(EventKind::DroppedExpiry, item.0);
            self.dropped.expire(item, now);
            return;
        }
        if self.scheduler.due_tick(EventKind::DroppedExpiry, item.0) != Some(record.expires_at) {
            self.scheduler
                .schedule(record.expires_at, EventKind::DroppedExpiry, item.0);
            let detail = format!("{} had no expiry at {}", item, record.expires_at);
            tracing::warn!("Dropped memory drift: {}", detail);
            self.correct_drift(Registry::Dropped, detail);
        }
    }

    fn sweep_cooldown(&mut self, host: &dyn HostWorld, agent: AgentId, now: Tick) {
        let Some(entry) = self.cooldowns.get(agent).copied() else {
            return;
        };
        if !host.agent(agent).is_some_and(|view| view.alive) {
            self.cooldowns.remove(&mut self.scheduler, agent);
            return;
        }
        if entry.until <= now {
            self.scheduler.cancel(EventKind::CooldownExpiry, agent.0);
            self.cooldowns.expire(agent, now);
            return;
        }
        if self.scheduler.due_tick(EventKind::CooldownExpiry, agent.0) != Some(entry.until) {
            self.scheduler
                .schedule(entry.until, EventKind::CooldownExpiry, agent.0);
            let detail = format!("{} had no cooldown expiry at {}", agent, entry.until);
            tracing::warn!("Cooldown drift: {}", detail);
            self.correct_drift(Registry::Cooldowns, detail);
        }
    }

    fn sweep_pin(&mut self, host: &dyn HostWorld, agent: AgentId) {
        let Some(record) = self.pins.record(agent).cloned() else {
            return;
        };
        if !host.agent(agent).is_some_and(|view| view.alive) {
            self.pins.unpin(&mut self.scheduler, agent);
            self.emit(EngineEventKind::PinCleared {
                agent,
                item: record.item,
                reason: PinClearReason::AgentGone,
            });
            return;
        }
        let Some(item) = record.item else {
            return;
        };

        if self.pins.pinned_owner(item) != Some(agent) {
            let repaired = self.pins.repair_index();
            let detail = format!("{} reverse index missed {} ({} entries repaired)", agent, item, repaired);
            tracing::warn!("Pin index drift: {}", detail);
            self.correct_drift(Registry::Pins, detail);
        }

        match host.item(item) {
            Some(view) if !view.destroyed => {
                if !view.is_held_by(agent) && !self.pins.in_grace(item) {
                    let detail = format!("{} off {} without grace", item, agent);
                    tracing::warn!("Pin drift: {}", detail);
                    self.correct_drift(Registry::Pins, detail);
                    self.start_grace(agent, item);
                }
            }
            _ => {
                self.pins.clear_item_pin(&mut self.scheduler, item);
                self.emit(EngineEventKind::PinCleared {
                    agent,
                    item: Some(item),
                    reason: PinClearReason::ItemGone,
                });
            }
        }
    }

    fn sweep_grace(&mut self, item: ItemId, now: Tick) {
        let Some(state) = self.pins.grace(item).copied() else {
            return;
        };
        if self.pins.pinned_owner(item) != Some(state.agent) {
            self.pins.end_grace(&mut self.scheduler, item);
            let detail = format!("grace on {} outlived its pin", item);
            tracing::warn!("Grace drift: {}", detail);
            self.correct_drift(Registry::Grace, detail);
            return;
        }
        if !self.scheduler.is_scheduled(EventKind::GraceCheck, item.0) {
            let next = self
                .scheduler
                .schedule(now + self.config.pins.check_interval, EventKind::GraceCheck, item.0);
            let detail = format!("grace on {} had no check, next at {}", item, next);
            tracing::warn!("Grace drift: {}", detail);
            self.correct_drift(Registry::Grace, detail);
        }
    }
}

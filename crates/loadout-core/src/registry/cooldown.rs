//! Per-agent cooldowns.
//!
//! The last action an agent took is the ground truth; the scheduled
//! `CooldownExpiry` event is the gate. An agent is cooling while that event
//! is pending and its due tick is still ahead.

use std::collections::HashMap;

use loadout_events::{AgentId, CooldownKind, Tick};

use crate::config::CooldownConfig;
use crate::scheduler::{EventKind, TickScheduler};

/// Last action taken by an agent and the cooldown it armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownEntry {
    pub tick: Tick,
    pub kind: CooldownKind,
    pub until: Tick,
}

#[derive(Debug, Default)]
pub struct CooldownRegistry {
    entries: HashMap<AgentId, CooldownEntry>,
}

/// Configured length of a cooldown kind.
pub fn duration_for(config: &CooldownConfig, kind: CooldownKind) -> Tick {
    match kind {
        CooldownKind::Emergency => config.emergency,
        CooldownKind::PostSwap => config.post_swap,
        CooldownKind::FailedSearch => config.failed_search,
        CooldownKind::PinHold => config.pin_hold,
    }
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an action at `now` and gate the agent for `duration` ticks.
    /// Re-arming replaces the previous window.
    pub fn arm(
        &mut self,
        scheduler: &mut TickScheduler,
        agent: AgentId,
        now: Tick,
        kind: CooldownKind,
        duration: Tick,
    ) -> Tick {
        let until = scheduler.schedule(now + duration, EventKind::CooldownExpiry, agent.0);
        self.entries.insert(agent, CooldownEntry { tick: now, kind, until });
        until
    }

    /// An expiry that is due but not yet dispatched no longer gates.
    pub fn is_cooling(&self, scheduler: &TickScheduler, agent: AgentId, now: Tick) -> bool {
        scheduler
            .due_tick(EventKind::CooldownExpiry, agent.0)
            .is_some_and(|due| due > now)
    }

    pub fn get(&self, agent: AgentId) -> Option<&CooldownEntry> {
        self.entries.get(&agent)
    }

    /// Expiry handler.
    pub fn expire(&mut self, agent: AgentId, now: Tick) -> bool {
        match self.entries.get(&agent) {
            Some(entry) if entry.until <= now => {
                self.entries.remove(&agent);
                true
            }
            _ => false,
        }
    }

    /// Forget an agent entirely, e.g. when it dies or leaves.
    pub fn remove(&mut self, scheduler: &mut TickScheduler, agent: AgentId) -> Option<CooldownEntry> {
        scheduler.cancel(EventKind::CooldownExpiry, agent.0);
        self.entries.remove(&agent)
    }

    /// Re-arm from a persisted last action. Windows already closed by `now`
    /// are dropped.
    pub fn restore(
        &mut self,
        scheduler: &mut TickScheduler,
        agent: AgentId,
        tick: Tick,
        kind: CooldownKind,
        duration: Tick,
        now: Tick,
    ) -> bool {
        if tick + duration <= now {
            return false;
        }
        self.arm(scheduler, agent, tick, kind, duration);
        true
    }

    pub fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self.entries.keys().copied().collect();
        agents.sort();
        agents
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &CooldownEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

//! Loadout Engine
//!
//! One explicitly constructed context per world. It owns the scheduler, the
//! score cache, the locator and every anti-thrash registry, and it is the
//! only thing the host talks to.
//!
//! Each tick the host calls [`Engine::on_tick`] first, which drains the due
//! bucket and dispatches every event through a handler table registered once
//! at construction, and only then evaluates agents.

use serde::Serialize;
use uuid::Uuid;

use loadout_events::{
    generate_event_id, AgentId, ArchetypeId, DroppedSnapshot, EngineEvent, EngineEventKind, GroundTruth,
    ItemId, LastAction, PinClearReason, PinSnapshot, Tick,
};

use crate::cleanup::CleanupCoordinator;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::host::{HostCapabilities, HostWorld};
use crate::locator::{CandidateLocator, LocatorStats};
use crate::model::ItemView;
use crate::registry::{
    duration_for, CooldownRegistry, DroppedItemMemory, GraceObservation, GraceVerdict, PinnedEquipmentTracker,
};
use crate::scheduler::{EventKind, TickScheduler};
use crate::scoring::Scorer;

/// Handler for one event kind: `(engine, host, payload id, tick)`.
pub type Handler = fn(&mut Engine, &mut dyn HostWorld, u64, Tick);

/// Counters over the life of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub evaluations: u64,
    pub swaps: u64,
    pub holds: u64,
    pub deferrals: u64,
    pub skips: u64,
    /// Events dispatched, indexed by `EventKind::index`
    pub fired: [u64; EventKind::COUNT],
    pub drift_corrections: u64,
    pub rebuilds: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl EngineStats {
    pub fn fired(&self, kind: EventKind) -> u64 {
        self.fired[kind.index()]
    }
}

pub struct Engine {
    pub(crate) session: Uuid,
    pub(crate) config: EngineConfig,
    pub(crate) capabilities: HostCapabilities,
    pub(crate) scheduler: TickScheduler,
    handlers: [Handler; EventKind::COUNT],
    pub(crate) scorer: Scorer,
    pub(crate) locator: CandidateLocator,
    pub(crate) dropped: DroppedItemMemory,
    pub(crate) pins: PinnedEquipmentTracker,
    pub(crate) cooldowns: CooldownRegistry,
    pub(crate) cleanup: CleanupCoordinator,
    outbox: Vec<EngineEvent>,
    pub(crate) stats: EngineStats,
    next_event: u64,
    pub(crate) now: Tick,
}

impl Engine {
    /// Build an engine for `host`. Capabilities are probed here, once.
    pub fn new(config: EngineConfig, host: &dyn HostWorld) -> Result<Self, EngineError> {
        config.validate()?;
        let now = host.current_tick();

        let mut handlers: [Handler; EventKind::COUNT] = [handle_noop; EventKind::COUNT];
        handlers[EventKind::CooldownExpiry.index()] = handle_cooldown_expiry;
        handlers[EventKind::DroppedExpiry.index()] = handle_dropped_expiry;
        handlers[EventKind::GraceCheck.index()] = handle_grace_check;
        handlers[EventKind::CleanupSweep.index()] = handle_cleanup_sweep;

        let mut engine = Self {
            session: Uuid::new_v4(),
            capabilities: host.capabilities(),
            cleanup: CleanupCoordinator::new(now),
            config,
            scheduler: TickScheduler::new(),
            handlers,
            scorer: Scorer::new(),
            locator: CandidateLocator::new(),
            dropped: DroppedItemMemory::new(),
            pins: PinnedEquipmentTracker::new(),
            cooldowns: CooldownRegistry::new(),
            outbox: Vec::new(),
            stats: EngineStats::default(),
            next_event: 0,
            now,
        };
        engine.schedule_sweep();

        tracing::info!(
            "Loadout engine {} started at tick {} with capabilities {:?}",
            engine.session,
            now,
            engine.capabilities
        );
        Ok(engine)
    }

    /// Dispatch every event due at or before the host's current tick.
    /// Returns the number of events fired.
    pub fn on_tick(&mut self, host: &mut dyn HostWorld) -> usize {
        let now = self.sync_clock(&*host);
        let mut due = self.scheduler.drain_due(now);
        let fired = due.len();
        // Sweeps see the tick after every other handler has run
        due.sort_by_key(|key| key.kind == EventKind::CleanupSweep);

        for key in due {
            self.stats.fired[key.kind.index()] += 1;
            let handler = self.handlers[key.kind.index()];
            handler(self, host, key.id, now);
        }
        fired
    }

    /// Bring the engine clock up to the host's tick without firing anything.
    /// Hosts reporting lifecycle changes before `on_tick` call this first.
    pub fn sync_clock(&mut self, host: &dyn HostWorld) -> Tick {
        self.now = self.now.max(host.current_tick());
        self.now
    }

    /// Lifecycle: `agent` just equipped `item`, by whatever path.
    pub fn on_equip(&mut self, agent: AgentId, item: ItemId) {
        self.dropped.clear(&mut self.scheduler, item);

        match self.pins.pinned_owner(item) {
            Some(owner) if owner == agent => {
                if self.pins.end_grace(&mut self.scheduler, item).is_some() {
                    tracing::debug!("{} recovered pinned {}", agent, item);
                    self.emit(EngineEventKind::GraceEnded { agent, item });
                }
            }
            Some(owner) => {
                self.pins.clear_item_pin(&mut self.scheduler, item);
                tracing::info!("{} claimed {} pinned to {}", agent, item, owner);
                self.emit(EngineEventKind::PinCleared {
                    agent: owner,
                    item: Some(item),
                    reason: PinClearReason::Claimed,
                });
            }
            None => {}
        }
    }

    /// Lifecycle: `agent` dropped `item` without the engine asking.
    pub fn on_drop(&mut self, agent: AgentId, item: ItemId) {
        if self.pins.pinned_owner(item) == Some(agent) {
            self.start_grace(agent, item);
            return;
        }
        self.dropped.mark_dropped(
            &mut self.scheduler,
            item,
            self.now,
            self.config.dropped.external_drop_ttl,
            Some(agent),
        );
    }

    /// Operator command: pin `item` to `agent`. False if either id is stale.
    pub fn pin_item(&mut self, host: &dyn HostWorld, agent: AgentId, item: ItemId) -> bool {
        let (Some(_), Some(view)) = (host.agent(agent), host.item(item)) else {
            return false;
        };
        if let Some(displaced) = self.pins.pin_item(&mut self.scheduler, agent, item) {
            self.emit(EngineEventKind::PinCleared {
                agent: displaced,
                item: Some(item),
                reason: PinClearReason::Claimed,
            });
        }
        if !view.is_held_by(agent) {
            self.start_grace(agent, item);
        }
        tracing::info!("Pinned {} to {}", item, agent);
        true
    }

    /// Operator command: pin an archetype to `agent`.
    pub fn pin_archetype(&mut self, host: &dyn HostWorld, agent: AgentId, archetype: ArchetypeId) -> bool {
        if host.agent(agent).is_none() {
            return false;
        }
        tracing::info!("Pinned archetype {} to {}", archetype, agent);
        self.pins.pin_archetype(agent, archetype);
        true
    }

    /// Operator command: drop every pin the agent has.
    pub fn unpin(&mut self, agent: AgentId) -> bool {
        match self.pins.unpin(&mut self.scheduler, agent) {
            Some(record) => {
                self.emit(EngineEventKind::PinCleared {
                    agent,
                    item: record.item,
                    reason: PinClearReason::Unpinned,
                });
                true
            }
            None => false,
        }
    }

    /// Item definitions changed; cached base scores are no longer valid.
    pub fn on_model_changed(&mut self) {
        tracing::info!("Item model changed, dropping {} cached scores", self.scorer.cached_entries());
        self.scorer.invalidate();
    }

    /// Swap in a new configuration. The old one stays on validation failure.
    pub fn reload_config(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        let sweep_changed = config.cleanup.sweep_interval != self.config.cleanup.sweep_interval;
        let scoring_changed = config.scoring != self.config.scoring;
        self.config = config;
        if scoring_changed {
            self.scorer.invalidate();
        }
        if sweep_changed {
            self.schedule_sweep();
        }
        tracing::info!("Engine {} reloaded configuration", self.session);
        Ok(())
    }

    /// Discard every schedule and registry entry.
    pub fn reset_all(&mut self) {
        self.scheduler.reset_all();
        self.dropped.reset();
        self.pins.reset();
        self.cooldowns.reset();
        self.cleanup.reset(self.now);
        self.scorer.invalidate();
        self.schedule_sweep();
    }

    /// The persistable minimum: last actions, pins, and open dropped windows.
    pub fn export_ground_truth(&self) -> GroundTruth {
        let mut truth = GroundTruth::new(self.now);
        truth.session = Some(self.session);

        for agent in self.cooldowns.agents() {
            if let Some(entry) = self.cooldowns.get(agent) {
                truth.last_actions.push(LastAction {
                    agent,
                    tick: entry.tick,
                    kind: entry.kind,
                });
            }
        }
        for agent in self.pins.agents() {
            if let Some(record) = self.pins.record(agent) {
                truth.pins.push(PinSnapshot {
                    agent,
                    item: record.item,
                    archetypes: record.archetypes.iter().cloned().collect(),
                    dropped_at: record.item.and_then(|item| self.pins.grace(item)).map(|g| g.dropped_at),
                });
            }
        }
        for item in self.dropped.items() {
            if let Some(record) = self.dropped.get(item) {
                if record.expires_at > self.now {
                    truth.dropped.push(DroppedSnapshot {
                        item,
                        expires_at: record.expires_at,
                        owner: record.owner,
                    });
                }
            }
        }
        truth
    }

    /// Reset, then re-derive every schedule from `truth`. Stale ids and
    /// windows already closed are skipped; pinned items found off their agent
    /// start a fresh grace period.
    pub fn rebuild_from_ground_truth(&mut self, host: &dyn HostWorld, truth: &GroundTruth) {
        self.reset_all();
        let now = self.now;
        let mut cooldowns = 0;
        let mut pins = 0;
        let mut dropped = 0;

        for action in &truth.last_actions {
            if host.agent(action.agent).is_none() {
                continue;
            }
            let duration = duration_for(&self.config.cooldowns, action.kind);
            if self
                .cooldowns
                .restore(&mut self.scheduler, action.agent, action.tick, action.kind, duration, now)
            {
                cooldowns += 1;
            }
        }

        for pin in &truth.pins {
            if host.agent(pin.agent).is_none() {
                continue;
            }
            for archetype in &pin.archetypes {
                self.pins.pin_archetype(pin.agent, archetype.clone());
            }
            if let Some(item) = pin.item {
                match host.item(item) {
                    Some(view) if !view.destroyed => {
                        self.pins.pin_item(&mut self.scheduler, pin.agent, item);
                        if !view.is_held_by(pin.agent) {
                            let dropped_at = pin.dropped_at.unwrap_or(now);
                            self.pins.begin_grace(
                                &mut self.scheduler,
                                pin.agent,
                                item,
                                dropped_at,
                                now,
                                &self.config.pins,
                            );
                        }
                    }
                    _ => continue,
                }
            }
            if self.pins.has_pin(pin.agent) {
                pins += 1;
            }
        }

        for window in &truth.dropped {
            if host.item(window.item).is_none() {
                continue;
            }
            if self
                .dropped
                .restore(&mut self.scheduler, window.item, window.expires_at, window.owner, now)
            {
                dropped += 1;
            }
        }

        self.stats.rebuilds += 1;
        tracing::info!(
            "Rebuilt state at tick {}: {} cooldowns, {} pins, {} dropped windows",
            now,
            cooldowns,
            pins,
            dropped
        );
        self.emit(EngineEventKind::StateRebuilt {
            cooldowns,
            pins,
            dropped,
        });
    }

    /// Rebuild from a JSON-serialized snapshot.
    pub fn import_ground_truth(&mut self, host: &dyn HostWorld, json: &str) -> Result<(), EngineError> {
        let truth = GroundTruth::from_json(json)?;
        self.rebuild_from_ground_truth(host, &truth);
        Ok(())
    }

    /// Take every event emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache_hits: self.scorer.hits(),
            cache_misses: self.scorer.misses(),
            ..self.stats.clone()
        }
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Last tick seen from the host.
    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn locator_stats(&self) -> &LocatorStats {
        self.locator.stats()
    }

    pub fn is_cooling(&self, agent: AgentId) -> bool {
        self.cooldowns.is_cooling(&self.scheduler, agent, self.now)
    }

    pub fn is_dropped(&self, item: ItemId) -> bool {
        self.dropped.is_dropped(item, self.now)
    }

    pub fn is_pinned(&self, agent: AgentId, item: &ItemView) -> bool {
        self.pins.is_pinned(agent, item)
    }

    pub fn pinned_owner(&self, item: ItemId) -> Option<AgentId> {
        self.pins.pinned_owner(item)
    }

    pub fn in_grace(&self, item: ItemId) -> bool {
        self.pins.in_grace(item)
    }

    pub fn dropped(&self) -> &DroppedItemMemory {
        &self.dropped
    }

    pub fn pins(&self) -> &PinnedEquipmentTracker {
        &self.pins
    }

    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    pub(crate) fn emit(&mut self, kind: EngineEventKind) {
        let event = EngineEvent::new(generate_event_id(self.next_event), self.now, kind);
        self.next_event += 1;
        self.outbox.push(event);
    }

    pub(crate) fn start_grace(&mut self, agent: AgentId, item: ItemId) -> bool {
        let started = self
            .pins
            .begin_grace(&mut self.scheduler, agent, item, self.now, self.now, &self.config.pins);
        if started {
            self.emit(EngineEventKind::GraceStarted { agent, item });
        }
        started
    }

    pub(crate) fn schedule_sweep(&mut self) -> Tick {
        self.scheduler.schedule(
            self.now + self.config.cleanup.sweep_interval,
            EventKind::CleanupSweep,
            0,
        )
    }

    fn grace_check(&mut self, host: &dyn HostWorld, item: ItemId, now: Tick) {
        let Some(state) = self.pins.grace(item).copied() else {
            return;
        };

        if !host.agent(state.agent).is_some_and(|a| a.alive) {
            self.pins.unpin(&mut self.scheduler, state.agent);
            self.emit(EngineEventKind::PinCleared {
                agent: state.agent,
                item: Some(item),
                reason: PinClearReason::AgentGone,
            });
            return;
        }

        let observation = match host.item(item) {
            None => GraceObservation::ItemGone,
            Some(view) if view.destroyed => GraceObservation::ItemGone,
            Some(view) if view.is_held_by(state.agent) => GraceObservation::OnAgent,
            Some(_) if self.capabilities.tasks && host.is_targeting(state.agent, item) => {
                GraceObservation::Targeting
            }
            Some(_) => GraceObservation::Away,
        };

        let verdict = self
            .pins
            .check_grace(&mut self.scheduler, item, now, observation, &self.config.pins);
        match verdict {
            Some(GraceVerdict::Recovered) => {
                self.emit(EngineEventKind::GraceEnded {
                    agent: state.agent,
                    item,
                });
            }
            Some(GraceVerdict::Extended(next_check)) => {
                self.emit(EngineEventKind::GraceExtended {
                    agent: state.agent,
                    item,
                    next_check,
                });
            }
            Some(GraceVerdict::Waiting(next)) => {
                tracing::debug!("{} still off {}, next check at {}", item, state.agent, next);
            }
            Some(GraceVerdict::Cleared(reason)) => {
                tracing::info!("Pin of {} on {} cleared: {:?}", item, state.agent, reason);
                self.emit(EngineEventKind::PinCleared {
                    agent: state.agent,
                    item: Some(item),
                    reason,
                });
            }
            None => {}
        }
    }
}

fn handle_noop(_engine: &mut Engine, _host: &mut dyn HostWorld, _id: u64, _now: Tick) {}

fn handle_cooldown_expiry(engine: &mut Engine, _host: &mut dyn HostWorld, id: u64, now: Tick) {
    engine.cooldowns.expire(AgentId(id), now);
}

fn handle_dropped_expiry(engine: &mut Engine, _host: &mut dyn HostWorld, id: u64, now: Tick) {
    engine.dropped.expire(ItemId(id), now);
}

fn handle_grace_check(engine: &mut Engine, host: &mut dyn HostWorld, id: u64, now: Tick) {
    engine.grace_check(&*host, ItemId(id), now);
}

fn handle_cleanup_sweep(engine: &mut Engine, host: &mut dyn HostWorld, _id: u64, now: Tick) {
    engine.run_cleanup(&*host, now);
}

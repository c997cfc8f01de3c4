//! Pinned Equipment Tracker
//!
//! Operator pins bind an agent to a specific item or to archetypes. An item
//! pin survives a temporary drop for a grace period, extended while the agent
//! is still working toward the item and bounded by a hard timeout.

use std::collections::{BTreeSet, HashMap};

use loadout_events::{AgentId, ArchetypeId, ItemId, PinClearReason, Tick};

use crate::config::PinConfig;
use crate::model::ItemView;
use crate::scheduler::{EventKind, TickScheduler};

/// One agent's pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinRecord {
    pub item: Option<ItemId>,
    pub archetypes: BTreeSet<ArchetypeId>,
}

impl PinRecord {
    pub fn is_empty(&self) -> bool {
        self.item.is_none() && self.archetypes.is_empty()
    }

    pub fn covers(&self, item: &ItemView) -> bool {
        self.item == Some(item.id) || self.archetypes.contains(&item.archetype)
    }
}

/// A pinned item currently lying off its agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceState {
    pub agent: AgentId,
    pub item: ItemId,
    /// Best known tick the item left the agent; windows count from here
    pub dropped_at: Tick,
    /// Tick the engine learned of it
    pub first_observed: Tick,
    pub extensions: u32,
}

/// What the host shows about a pinned item when its grace check fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceObservation {
    /// Stale id or destroyed
    ItemGone,
    /// Back in the agent's slot
    OnAgent,
    /// Agent's task or reservation still targets it
    Targeting,
    Away,
}

/// Outcome of a grace check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceVerdict {
    /// Item returned; grace over, pin kept
    Recovered,
    /// Agent still busy with it; next check scheduled
    Extended(Tick),
    /// Window still open; next check scheduled
    Waiting(Tick),
    /// Pin on the item removed
    Cleared(PinClearReason),
}

#[derive(Debug, Default)]
pub struct PinnedEquipmentTracker {
    pins: HashMap<AgentId, PinRecord>,
    /// Item pins only; an item is pinned to at most one agent
    item_owner: HashMap<ItemId, AgentId>,
    grace: HashMap<ItemId, GraceState>,
}

impl PinnedEquipmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `item` to `agent`, replacing the agent's previous item pin. If the
    /// item was pinned to another agent, that pin is removed and the displaced
    /// agent returned.
    pub fn pin_item(
        &mut self,
        scheduler: &mut TickScheduler,
        agent: AgentId,
        item: ItemId,
    ) -> Option<AgentId> {
        let displaced = match self.item_owner.get(&item).copied() {
            Some(owner) if owner != agent => {
                self.clear_item_pin(scheduler, item);
                Some(owner)
            }
            _ => None,
        };

        let previous = self.pins.get(&agent).and_then(|r| r.item);
        if let Some(previous) = previous.filter(|&p| p != item) {
            self.item_owner.remove(&previous);
            self.end_grace(scheduler, previous);
        }

        self.pins.entry(agent).or_default().item = Some(item);
        self.item_owner.insert(item, agent);
        displaced
    }

    pub fn pin_archetype(&mut self, agent: AgentId, archetype: ArchetypeId) -> bool {
        self.pins.entry(agent).or_default().archetypes.insert(archetype)
    }

    /// Remove every pin the agent has, cancelling any grace in progress.
    pub fn unpin(&mut self, scheduler: &mut TickScheduler, agent: AgentId) -> Option<PinRecord> {
        let record = self.pins.remove(&agent)?;
        if let Some(item) = record.item {
            self.item_owner.remove(&item);
            self.end_grace(scheduler, item);
        }
        Some(record)
    }

    /// Remove the item pin on `item`, keeping the owner's archetype pins.
    pub fn clear_item_pin(&mut self, scheduler: &mut TickScheduler, item: ItemId) -> Option<AgentId> {
        let owner = self.item_owner.remove(&item)?;
        self.end_grace(scheduler, item);
        if let Some(record) = self.pins.get_mut(&owner) {
            if record.item == Some(item) {
                record.item = None;
            }
            if record.is_empty() {
                self.pins.remove(&owner);
            }
        }
        Some(owner)
    }

    pub fn is_pinned(&self, agent: AgentId, item: &ItemView) -> bool {
        self.pins.get(&agent).is_some_and(|r| r.covers(item))
    }

    /// Agent the item is pinned to, if any.
    pub fn pinned_owner(&self, item: ItemId) -> Option<AgentId> {
        self.item_owner.get(&item).copied()
    }

    pub fn record(&self, agent: AgentId) -> Option<&PinRecord> {
        self.pins.get(&agent)
    }

    pub fn has_pin(&self, agent: AgentId) -> bool {
        self.pins.contains_key(&agent)
    }

    /// Start grace for a pinned item seen off its agent at `now`, having left
    /// at `dropped_at`. Returns false if the item is not pinned to `agent` or
    /// grace already runs.
    pub fn begin_grace(
        &mut self,
        scheduler: &mut TickScheduler,
        agent: AgentId,
        item: ItemId,
        dropped_at: Tick,
        now: Tick,
        config: &PinConfig,
    ) -> bool {
        if self.item_owner.get(&item) != Some(&agent) || self.grace.contains_key(&item) {
            return false;
        }
        let dropped_at = dropped_at.min(now);
        self.grace.insert(
            item,
            GraceState {
                agent,
                item,
                dropped_at,
                first_observed: now,
                extensions: 0,
            },
        );
        let first = (now + config.check_interval).min(dropped_at + config.grace_window);
        scheduler.schedule(first, EventKind::GraceCheck, item.0);
        true
    }

    /// End grace without touching the pin.
    pub fn end_grace(&mut self, scheduler: &mut TickScheduler, item: ItemId) -> Option<GraceState> {
        scheduler.cancel(EventKind::GraceCheck, item.0);
        self.grace.remove(&item)
    }

    pub fn in_grace(&self, item: ItemId) -> bool {
        self.grace.contains_key(&item)
    }

    pub fn grace(&self, item: ItemId) -> Option<&GraceState> {
        self.grace.get(&item)
    }

    /// Apply a fired grace check. `None` when no grace runs for the item.
    pub fn check_grace(
        &mut self,
        scheduler: &mut TickScheduler,
        item: ItemId,
        now: Tick,
        observation: GraceObservation,
        config: &PinConfig,
    ) -> Option<GraceVerdict> {
        let state = *self.grace.get(&item)?;
        let elapsed = now.saturating_sub(state.dropped_at);

        let verdict = match observation {
            GraceObservation::ItemGone => {
                self.clear_item_pin(scheduler, item);
                GraceVerdict::Cleared(PinClearReason::ItemGone)
            }
            GraceObservation::OnAgent => {
                self.end_grace(scheduler, item);
                GraceVerdict::Recovered
            }
            GraceObservation::Targeting if elapsed >= config.hard_timeout => {
                self.clear_item_pin(scheduler, item);
                GraceVerdict::Cleared(PinClearReason::HardTimeout)
            }
            GraceObservation::Targeting => {
                let next = (now + config.check_interval).min(state.dropped_at + config.hard_timeout);
                let next = scheduler.schedule(next, EventKind::GraceCheck, item.0);
                if let Some(grace) = self.grace.get_mut(&item) {
                    grace.extensions += 1;
                }
                GraceVerdict::Extended(next)
            }
            GraceObservation::Away if elapsed >= config.grace_window => {
                self.clear_item_pin(scheduler, item);
                GraceVerdict::Cleared(PinClearReason::GraceExpired)
            }
            GraceObservation::Away => {
                let next = (now + config.check_interval).min(state.dropped_at + config.grace_window);
                GraceVerdict::Waiting(scheduler.schedule(next, EventKind::GraceCheck, item.0))
            }
        };
        Some(verdict)
    }

    /// Agents with any pin, sorted.
    pub fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self.pins.keys().copied().collect();
        agents.sort();
        agents
    }

    /// Items currently in grace, sorted.
    pub fn grace_items(&self) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self.grace.keys().copied().collect();
        items.sort();
        items
    }

    /// Rebuild the item reverse index from the forward map, returning how
    /// many entries had to change.
    pub fn repair_index(&mut self) -> usize {
        let mut expected: HashMap<ItemId, AgentId> = HashMap::new();
        for (&agent, record) in &self.pins {
            if let Some(item) = record.item {
                expected.insert(item, agent);
            }
        }
        let mut changed = self
            .item_owner
            .iter()
            .filter(|(item, owner)| expected.get(item) != Some(owner))
            .count();
        changed += expected
            .keys()
            .filter(|item| !self.item_owner.contains_key(item))
            .count();
        self.item_owner = expected;
        changed
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn grace_len(&self) -> usize {
        self.grace.len()
    }

    pub fn reset(&mut self) {
        self.pins.clear();
        self.item_owner.clear();
        self.grace.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Position, Quality};

    fn config() -> PinConfig {
        PinConfig {
            grace_window: 300,
            hard_timeout: 1200,
            check_interval: 60,
        }
    }

    fn sword(id: u64) -> ItemView {
        ItemView::new(ItemId(id), "longsword", Quality::Normal, Position::default())
    }

    #[test]
    fn test_item_pinned_to_one_agent() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();

        assert_eq!(pins.pin_item(&mut scheduler, AgentId(1), ItemId(10)), None);
        assert_eq!(pins.pin_item(&mut scheduler, AgentId(2), ItemId(10)), Some(AgentId(1)));

        assert_eq!(pins.pinned_owner(ItemId(10)), Some(AgentId(2)));
        assert!(!pins.is_pinned(AgentId(1), &sword(10)));
        assert!(pins.is_pinned(AgentId(2), &sword(10)));
        assert!(!pins.has_pin(AgentId(1)));
    }

    #[test]
    fn test_archetype_pin_survives_item_clear() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();

        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));
        pins.pin_archetype(AgentId(1), ArchetypeId::new("longsword"));
        pins.clear_item_pin(&mut scheduler, ItemId(10));

        assert!(pins.has_pin(AgentId(1)));
        assert!(pins.is_pinned(AgentId(1), &sword(99)));
        assert_eq!(pins.pinned_owner(ItemId(10)), None);
    }

    #[test]
    fn test_grace_recovery_keeps_pin() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));

        assert!(pins.begin_grace(&mut scheduler, AgentId(1), ItemId(10), 1000, 1000, &config()));
        assert!(!pins.begin_grace(&mut scheduler, AgentId(1), ItemId(10), 1001, 1001, &config()));
        assert_eq!(scheduler.due_tick(EventKind::GraceCheck, 10), Some(1060));

        let verdict = pins.check_grace(&mut scheduler, ItemId(10), 1060, GraceObservation::OnAgent, &config());
        assert_eq!(verdict, Some(GraceVerdict::Recovered));
        assert!(!pins.in_grace(ItemId(10)));
        assert_eq!(pins.pinned_owner(ItemId(10)), Some(AgentId(1)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_late_observation_keeps_drop_tick() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));

        assert!(pins.begin_grace(&mut scheduler, AgentId(1), ItemId(10), 100, 350, &config()));
        let state = *pins.grace(ItemId(10)).unwrap();
        assert_eq!(state.dropped_at, 100);
        assert_eq!(state.first_observed, 350);
        assert_eq!(scheduler.due_tick(EventKind::GraceCheck, 10), Some(400));

        let verdict = pins.check_grace(&mut scheduler, ItemId(10), 400, GraceObservation::Away, &config());
        assert_eq!(verdict, Some(GraceVerdict::Cleared(PinClearReason::GraceExpired)));
    }

    #[test]
    fn test_grace_window_expires_when_abandoned() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));
        pins.begin_grace(&mut scheduler, AgentId(1), ItemId(10), 0, 0, &config());

        let mut now = 60;
        loop {
            match pins.check_grace(&mut scheduler, ItemId(10), now, GraceObservation::Away, &config()) {
                Some(GraceVerdict::Waiting(next)) => now = next,
                Some(GraceVerdict::Cleared(reason)) => {
                    assert_eq!(reason, PinClearReason::GraceExpired);
                    break;
                }
                other => panic!("unexpected verdict {other:?}"),
            }
        }
        assert_eq!(now, 300);
        assert!(!pins.has_pin(AgentId(1)));
    }

    #[test]
    fn test_targeting_extends_until_hard_timeout() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));
        pins.begin_grace(&mut scheduler, AgentId(1), ItemId(10), 0, 0, &config());

        let mut now = 60;
        let mut extensions = 0;
        let reason = loop {
            match pins.check_grace(&mut scheduler, ItemId(10), now, GraceObservation::Targeting, &config()) {
                Some(GraceVerdict::Extended(next)) => {
                    extensions += 1;
                    now = next;
                }
                Some(GraceVerdict::Cleared(reason)) => break reason,
                other => panic!("unexpected verdict {other:?}"),
            }
        };
        assert_eq!(reason, PinClearReason::HardTimeout);
        assert_eq!(now, 1200);
        assert!(extensions > 4);
        assert_eq!(pins.pinned_owner(ItemId(10)), None);
    }

    #[test]
    fn test_item_gone_clears_pin() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(3), ItemId(30));
        pins.begin_grace(&mut scheduler, AgentId(3), ItemId(30), 5, 5, &config());

        let verdict = pins.check_grace(&mut scheduler, ItemId(30), 65, GraceObservation::ItemGone, &config());
        assert_eq!(verdict, Some(GraceVerdict::Cleared(PinClearReason::ItemGone)));
        assert!(pins.is_empty());
        assert_eq!(pins.check_grace(&mut scheduler, ItemId(30), 70, GraceObservation::Away, &config()), None);
    }

    #[test]
    fn test_unpin_cancels_grace() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));
        pins.begin_grace(&mut scheduler, AgentId(1), ItemId(10), 0, 0, &config());

        let record = pins.unpin(&mut scheduler, AgentId(1)).unwrap();
        assert_eq!(record.item, Some(ItemId(10)));
        assert_eq!(pins.grace_len(), 0);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_repair_index() {
        let mut scheduler = TickScheduler::new();
        let mut pins = PinnedEquipmentTracker::new();
        pins.pin_item(&mut scheduler, AgentId(1), ItemId(10));
        pins.item_owner.insert(ItemId(77), AgentId(9));
        pins.item_owner.remove(&ItemId(10));

        assert_eq!(pins.repair_index(), 2);
        assert_eq!(pins.pinned_owner(ItemId(10)), Some(AgentId(1)));
        assert_eq!(pins.pinned_owner(ItemId(77)), None);
        assert_eq!(pins.repair_index(), 0);
    }
}

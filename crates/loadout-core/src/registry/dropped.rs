//! Dropped-Item Memory
//!
//! Items an agent voluntarily released stay off-limits to every agent until
//! their window closes. This breaks drop -> pickup -> drop loops between
//! decision paths that disagree about an item.

use std::collections::HashMap;

use loadout_events::{AgentId, ItemId, Tick};

use crate::scheduler::{EventKind, TickScheduler};

/// A live dropped-item window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedRecord {
    pub expires_at: Tick,
    pub owner: Option<AgentId>,
    /// Window is the long blanket over an unfinished drop-then-equip sequence
    pub pending: bool,
}

#[derive(Debug, Default)]
pub struct DroppedItemMemory {
    records: HashMap<ItemId, DroppedRecord>,
}

impl DroppedItemMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(
        &mut self,
        scheduler: &mut TickScheduler,
        item: ItemId,
        due: Tick,
        owner: Option<AgentId>,
        pending: bool,
    ) -> Tick {
        let expires_at = scheduler.schedule(due, EventKind::DroppedExpiry, item.0);
        self.records.insert(
            item,
            DroppedRecord {
                expires_at,
                owner,
                pending,
            },
        );
        expires_at
    }

    /// Open or extend a window of `ttl` ticks from `now`. An existing longer
    /// window is kept; a shorter one is cancelled and rescheduled.
    pub fn mark_dropped(
        &mut self,
        scheduler: &mut TickScheduler,
        item: ItemId,
        now: Tick,
        ttl: Tick,
        owner: Option<AgentId>,
    ) -> Tick {
        let due = now + ttl;
        match self.records.get(&item) {
            Some(existing) if existing.expires_at >= due => existing.expires_at,
            Some(existing) => {
                let owner = owner.or(existing.owner);
                let pending = existing.pending;
                self.set(scheduler, item, due, owner, pending)
            }
            None => self.set(scheduler, item, due, owner, false),
        }
    }

    /// Blanket the item for a whole drop-then-equip sequence.
    pub fn mark_pending_drop(
        &mut self,
        scheduler: &mut TickScheduler,
        item: ItemId,
        now: Tick,
        pending_ttl: Tick,
        owner: Option<AgentId>,
    ) -> Tick {
        let due = (now + pending_ttl).max(self.records.get(&item).map_or(0, |r| r.expires_at));
        self.set(scheduler, item, due, owner, true)
    }

    /// Replace a pending blanket with the regular window once the sequence
    /// finished. Without a pending record this behaves like `mark_dropped`.
    pub fn complete_pending_drop(
        &mut self,
        scheduler: &mut TickScheduler,
        item: ItemId,
        now: Tick,
        ttl: Tick,
    ) -> Tick {
        match self.records.get(&item).copied() {
            Some(record) if record.pending => self.set(scheduler, item, now + ttl, record.owner, false),
            _ => self.mark_dropped(scheduler, item, now, ttl, None),
        }
    }

    /// True while the item's window is open.
    pub fn is_dropped(&self, item: ItemId, now: Tick) -> bool {
        self.records.get(&item).is_some_and(|r| now < r.expires_at)
    }

    pub fn get(&self, item: ItemId) -> Option<&DroppedRecord> {
        self.records.get(&item)
    }

    /// Explicit pickup: forget the item and cancel its expiry.
    pub fn clear(&mut self, scheduler: &mut TickScheduler, item: ItemId) -> bool {
        scheduler.cancel(EventKind::DroppedExpiry, item.0);
        self.records.remove(&item).is_some()
    }

    /// Expiry handler: remove the record if its window has closed by `now`.
    pub fn expire(&mut self, item: ItemId, now: Tick) -> bool {
        match self.records.get(&item) {
            Some(record) if record.expires_at <= now => {
                self.records.remove(&item);
                true
            }
            _ => false,
        }
    }

    /// Re-register a window from persisted state. Closed windows are skipped.
    pub fn restore(
        &mut self,
        scheduler: &mut TickScheduler,
        item: ItemId,
        expires_at: Tick,
        owner: Option<AgentId>,
        now: Tick,
    ) -> bool {
        if expires_at <= now {
            return false;
        }
        self.set(scheduler, item, expires_at, owner, false);
        true
    }

    pub fn items(&self) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self.records.keys().copied().collect();
        items.sort();
        items
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &DroppedRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}

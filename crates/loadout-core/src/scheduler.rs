//! Time-Bucketed Event Scheduler
//!
//! Expiries and periodic checks are registered for a future tick instead of
//! being polled. Each `(kind, id)` key has at most one pending event;
//! scheduling it again moves it.
//!
//! Buckets hold slots tagged with a sequence number. The reverse index maps a
//! key to the `(tick, seq)` of its live slot, so cancel is a single index
//! removal and a bucket slot whose sequence no longer matches is skipped when
//! the bucket drains.

use std::collections::{BTreeMap, HashMap};

use loadout_events::Tick;

/// Fixed set of event kinds the engine schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// Agent's re-evaluation gate lifts
    CooldownExpiry,
    /// Dropped-item immunity ends
    DroppedExpiry,
    /// Periodic check on a pinned item lying off its agent
    GraceCheck,
    /// Cleanup coordinator slice
    CleanupSweep,
}

impl EventKind {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn all() -> [EventKind; Self::COUNT] {
        [
            EventKind::CooldownExpiry,
            EventKind::DroppedExpiry,
            EventKind::GraceCheck,
            EventKind::CleanupSweep,
        ]
    }
}

/// Identity of a scheduled event: kind plus the agent/item id it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub kind: EventKind,
    pub id: u64,
}

impl EventKey {
    pub fn new(kind: EventKind, id: u64) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    key: EventKey,
    seq: u64,
}

/// Result of recounting live slots against the reverse index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerAudit {
    pub indexed: usize,
    pub live_slots: usize,
    pub stale_slots: usize,
}

impl SchedulerAudit {
    pub fn is_consistent(&self) -> bool {
        self.indexed == self.live_slots
    }
}

/// Tick-indexed event buckets with O(1) cancel and reschedule.
#[derive(Debug, Default, Clone)]
pub struct TickScheduler {
    buckets: BTreeMap<Tick, Vec<Slot>>,
    index: HashMap<EventKey, (Tick, u64)>,
    next_seq: u64,
    /// Highest tick already drained; nothing may be scheduled at or before it
    last_drained: Option<Tick>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `(kind, id)` to fire at `due`, replacing any pending event for
    /// the same key. Returns the tick actually used, which is pushed past the
    /// last drained tick if `due` is not in the future.
    pub fn schedule(&mut self, due: Tick, kind: EventKind, id: u64) -> Tick {
        let due = match self.last_drained {
            Some(drained) if due <= drained => drained + 1,
            _ => due,
        };
        let key = EventKey::new(kind, id);

        if let Some(&(tick, _)) = self.index.get(&key) {
            if tick == due {
                return due;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.buckets.entry(due).or_default().push(Slot { key, seq });
        self.index.insert(key, (due, seq));
        due
    }

    /// Remove the pending event for `(kind, id)`, returning its due tick.
    /// Cancelling an unknown key is a no-op.
    pub fn cancel(&mut self, kind: EventKind, id: u64) -> Option<Tick> {
        self.index
            .remove(&EventKey::new(kind, id))
            .map(|(tick, _)| tick)
    }

    pub fn due_tick(&self, kind: EventKind, id: u64) -> Option<Tick> {
        self.index.get(&EventKey::new(kind, id)).map(|&(tick, _)| tick)
    }

    pub fn is_scheduled(&self, kind: EventKind, id: u64) -> bool {
        self.index.contains_key(&EventKey::new(kind, id))
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Remove and return every live event due at or before `current`, in due
    /// order and, within a tick, insertion order. Each fires exactly once.
    pub fn drain_due(&mut self, current: Tick) -> Vec<EventKey> {
        let later = self.buckets.split_off(&current.saturating_add(1));
        let due = std::mem::replace(&mut self.buckets, later);

        let mut fired = Vec::new();
        for (tick, slots) in due {
            for slot in slots {
                if self.index.get(&slot.key) == Some(&(tick, slot.seq)) {
                    self.index.remove(&slot.key);
                    fired.push(slot.key);
                }
            }
        }

        self.last_drained = Some(self.last_drained.map_or(current, |t| t.max(current)));
        fired
    }

    /// Recount live slots against the index.
    pub fn verify(&self) -> SchedulerAudit {
        let mut live_slots = 0;
        let mut stale_slots = 0;
        for (&tick, slots) in &self.buckets {
            for slot in slots {
                if self.index.get(&slot.key) == Some(&(tick, slot.seq)) {
                    live_slots += 1;
                } else {
                    stale_slots += 1;
                }
            }
        }
        SchedulerAudit {
            indexed: self.index.len(),
            live_slots,
            stale_slots,
        }
    }

    /// Drop cancelled slots still sitting in buckets.
    pub fn compact(&mut self) -> usize {
        let mut removed = 0;
        let index = &self.index;
        self.buckets.retain(|&tick, slots| {
            let before = slots.len();
            slots.retain(|slot| index.get(&slot.key) == Some(&(tick, slot.seq)));
            removed += before - slots.len();
            !slots.is_empty()
        });
        removed
    }

    /// Clear every bucket and index entry. The drain watermark is kept so
    /// events re-scheduled afterwards still land in the future.
    pub fn reset_all(&mut self) {
        self.buckets.clear();
        self.index.clear();
    }

    pub fn last_drained(&self) -> Option<Tick> {
        self.last_drained
    }

    /// Lose every bucket while keeping the index, leaving it inconsistent.
    #[cfg(test)]
    pub(crate) fn drop_buckets(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_at_due_tick() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(10, EventKind::DroppedExpiry, 7);

        assert!(scheduler.drain_due(9).is_empty());
        assert_eq!(
            scheduler.drain_due(10),
            vec![EventKey::new(EventKind::DroppedExpiry, 7)]
        );
        assert!(scheduler.drain_due(10).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_reschedule_replaces_prior_event() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(150, EventKind::DroppedExpiry, 1);
        scheduler.schedule(310, EventKind::DroppedExpiry, 1);

        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.drain_due(150).is_empty());
        assert_eq!(scheduler.drain_due(310).len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(5, EventKind::CooldownExpiry, 3);

        assert_eq!(scheduler.cancel(EventKind::CooldownExpiry, 3), Some(5));
        assert_eq!(scheduler.cancel(EventKind::CooldownExpiry, 3), None);
        assert_eq!(scheduler.cancel(EventKind::GraceCheck, 99), None);
        assert!(scheduler.drain_due(5).is_empty());
    }

    #[test]
    fn test_cancel_then_reschedule_same_tick_fires_once() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(20, EventKind::GraceCheck, 4);
        scheduler.cancel(EventKind::GraceCheck, 4);
        scheduler.schedule(20, EventKind::GraceCheck, 4);

        assert_eq!(scheduler.drain_due(20).len(), 1);
        let audit = scheduler.verify();
        assert!(audit.is_consistent());
        assert_eq!(audit.indexed, 0);
    }

    #[test]
    fn test_same_key_different_kinds_are_independent() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(8, EventKind::CooldownExpiry, 1);
        scheduler.schedule(8, EventKind::DroppedExpiry, 1);
        assert_eq!(scheduler.len(), 2);
        let cooldowns = scheduler.index.keys().filter(|k| k.kind == EventKind::CooldownExpiry).count();
        assert_eq!(cooldowns, 1);
    }

    #[test]
    fn test_insertion_order_within_tick() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(3, EventKind::DroppedExpiry, 30);
        scheduler.schedule(3, EventKind::CooldownExpiry, 10);
        scheduler.schedule(3, EventKind::DroppedExpiry, 20);

        let ids: Vec<u64> = scheduler.drain_due(3).into_iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[test]
    fn test_skipped_ticks_still_fire() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(4, EventKind::CooldownExpiry, 1);
        scheduler.schedule(6, EventKind::CooldownExpiry, 2);
        scheduler.schedule(9, EventKind::CooldownExpiry, 3);

        let fired: Vec<u64> = scheduler.drain_due(7).into_iter().map(|k| k.id).collect();
        assert_eq!(fired, vec![1, 2]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_past_due_is_pushed_forward() {
        let mut scheduler = TickScheduler::new();
        scheduler.drain_due(100);

        let used = scheduler.schedule(90, EventKind::CleanupSweep, 0);
        assert_eq!(used, 101);
        assert_eq!(scheduler.drain_due(101).len(), 1);
    }

    #[test]
    fn test_verify_and_compact() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(10, EventKind::DroppedExpiry, 1);
        scheduler.schedule(20, EventKind::DroppedExpiry, 1);
        scheduler.schedule(30, EventKind::DroppedExpiry, 2);
        scheduler.cancel(EventKind::DroppedExpiry, 2);

        let audit = scheduler.verify();
        assert_eq!(audit.indexed, 1);
        assert_eq!(audit.live_slots, 1);
        assert_eq!(audit.stale_slots, 2);
        assert!(audit.is_consistent());

        assert_eq!(scheduler.compact(), 2);
        assert_eq!(scheduler.verify().stale_slots, 0);
    }

    #[test]
    fn test_reset_all() {
        let mut scheduler = TickScheduler::new();
        scheduler.drain_due(50);
        scheduler.schedule(60, EventKind::GraceCheck, 1);
        scheduler.reset_all();

        assert!(scheduler.is_empty());
        assert!(scheduler.drain_due(60).is_empty());
        assert_eq!(scheduler.last_drained(), Some(60));
        assert_eq!(scheduler.schedule(10, EventKind::GraceCheck, 1), 61);
    }
}

//! Anti-Thrash Registries
//!
//! Dropped-item memory, pinned equipment with its grace sub-state, and
//! per-agent cooldowns. All expiries are events on the shared scheduler.

pub mod cooldown;
pub mod dropped;
pub mod pinned;

pub use cooldown::{duration_for, CooldownEntry, CooldownRegistry};
pub use dropped::{DroppedItemMemory, DroppedRecord};
pub use pinned::{GraceObservation, GraceState, GraceVerdict, PinRecord, PinnedEquipmentTracker};

//! Shared identifiers, engine event records and persisted state for the loadout engine.
//!
//! This crate contains pure data structures with no decision logic.
//! It is a dependency for all other crates in the workspace.

pub mod event;
pub mod ids;
pub mod snapshot;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export id types
pub use ids::{AgentId, ArchetypeId, ItemId, Tick};

// Re-export event types
pub use event::{
    generate_event_id, CooldownKind, DeferReason, EngineEvent, EngineEventKind, PinClearReason,
    Registry,
};

// Re-export snapshot types
pub use snapshot::{DroppedSnapshot, GroundTruth, LastAction, PinSnapshot};

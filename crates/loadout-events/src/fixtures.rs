//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // loadout-events = { path = "../loadout-events", features = ["test-fixtures"] }
//!
//! use loadout_events::fixtures;
//!
//! let truth = fixtures::sample_ground_truth();
//! ```

use crate::{AgentId, ArchetypeId, CooldownKind, DroppedSnapshot, GroundTruth, ItemId, LastAction, PinSnapshot};

/// Returns a ground truth snapshot taken at tick 1000.
///
/// Contains:
/// - agent 1 swapped at tick 900 (post-swap cooldown still running at 1000 by default)
/// - agent 2 failed a search at tick 100 (long expired)
/// - agent 3 pinned to item 30, agent 4 pinned to the "longsword" archetype
/// - item 11 dropped with a window ending at tick 1100
pub fn sample_ground_truth() -> GroundTruth {
    GroundTruth {
        session: None,
        tick: 1000,
        last_actions: vec![
            LastAction {
                agent: AgentId(1),
                tick: 900,
                kind: CooldownKind::PostSwap,
            },
            LastAction {
                agent: AgentId(2),
                tick: 100,
                kind: CooldownKind::FailedSearch,
            },
        ],
        pins: vec![
            PinSnapshot {
                agent: AgentId(3),
                item: Some(ItemId(30)),
                archetypes: Vec::new(),
                dropped_at: None,
            },
            PinSnapshot {
                agent: AgentId(4),
                item: None,
                archetypes: vec![ArchetypeId::new("longsword")],
                dropped_at: None,
            },
        ],
        dropped: vec![DroppedSnapshot {
            item: ItemId(11),
            expires_at: 1100,
            owner: Some(AgentId(1)),
        }],
    }
}

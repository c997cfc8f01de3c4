//! Host Interface
//!
//! Everything the engine needs from the surrounding simulation. Lookups return
//! `Option` because agents and items vanish out-of-band all the time; mutators
//! return `Result` so the engine can degrade instead of retrying in a loop.

use thiserror::Error;

use loadout_events::{AgentId, ArchetypeId, ItemId, Tick};

use crate::model::{AgentView, ArchetypeStats, ItemView, Position};

/// Failure reported by a host call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("spatial query failed: {0}")]
    SpatialQuery(String),
    #[error("{agent} could not equip {item}: {reason}")]
    Equip {
        agent: AgentId,
        item: ItemId,
        reason: String,
    },
    #[error("{agent} could not drop {item}: {reason}")]
    Drop {
        agent: AgentId,
        item: ItemId,
        reason: String,
    },
    #[error("host does not support {0}")]
    Unsupported(&'static str),
}

/// Optional host features, probed once when the engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Host tracks item reservations (`can_reserve`/`reserve`/`release`)
    pub reservations: bool,
    /// Host reports containers on items
    pub containers: bool,
    /// Host reports items on fire
    pub fire: bool,
    /// Host can tell whether an agent's current task targets an item
    pub tasks: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            reservations: true,
            containers: true,
            fire: true,
            tasks: true,
        }
    }
}

impl HostCapabilities {
    /// A host with none of the optional integrations.
    pub fn minimal() -> Self {
        Self {
            reservations: false,
            containers: false,
            fire: false,
            tasks: false,
        }
    }
}

/// The simulation the engine is embedded in.
pub trait HostWorld {
    /// Current simulation tick.
    fn current_tick(&self) -> Tick;

    /// Optional integrations this host supports.
    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::default()
    }

    /// Fresh view of an agent; `None` once the id is stale.
    fn agent(&self, id: AgentId) -> Option<AgentView>;

    /// Fresh view of an item; `None` once the id is stale.
    fn item(&self, id: ItemId) -> Option<ItemView>;

    /// Stats for an archetype, if known.
    fn archetype(&self, id: &ArchetypeId) -> Option<ArchetypeStats>;

    /// Items within `radius` of `origin`, in any order.
    fn spatial_query(&self, origin: Position, radius: f32) -> Result<Vec<ItemId>, HostError>;

    /// Whether the player-configured allow-list permits this agent to use the item.
    fn is_policy_allowed(&self, agent: AgentId, item: ItemId) -> bool;

    /// Whether `reserve` would currently succeed, without reserving.
    fn can_reserve(&self, _agent: AgentId, _item: ItemId) -> bool {
        true
    }

    /// Reserve the item for the agent; false when someone else holds it.
    fn reserve(&mut self, _agent: AgentId, _item: ItemId) -> bool {
        true
    }

    fn release(&mut self, _agent: AgentId, _item: ItemId) {}

    /// Put the item into the agent's equipment slot.
    fn move_item_to_agent(&mut self, agent: AgentId, item: ItemId) -> Result<(), HostError>;

    /// Drop the item from the agent onto the ground at the agent's feet.
    fn drop_item(&mut self, agent: AgentId, item: ItemId) -> Result<(), HostError>;

    /// Whether the agent's current task or an active reservation targets the item.
    fn is_targeting(&self, _agent: AgentId, _item: ItemId) -> bool {
        false
    }
}

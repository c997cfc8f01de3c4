//! Ground Truth Snapshot
//!
//! The minimal state from which the engine can re-derive every schedule after
//! a reload: last action per agent, pins, and optionally live dropped windows.
//! Where this lives on disk is up to the host.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::CooldownKind;
use crate::ids::{AgentId, ArchetypeId, ItemId, Tick};

/// Last cooldown-arming action taken for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    pub agent: AgentId,
    pub tick: Tick,
    pub kind: CooldownKind,
}

/// Pins held by one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSnapshot {
    pub agent: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archetypes: Vec<ArchetypeId>,
    /// When the pinned item left the agent, if it was in grace at export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropped_at: Option<Tick>,
}

/// A dropped-item window still open at export time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedSnapshot {
    pub item: ItemId,
    pub expires_at: Tick,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<AgentId>,
}

/// Persistable engine ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Session that exported this snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Uuid>,
    /// Tick at which the snapshot was taken
    pub tick: Tick,
    #[serde(default)]
    pub last_actions: Vec<LastAction>,
    #[serde(default)]
    pub pins: Vec<PinSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedSnapshot>,
}

impl GroundTruth {
    pub fn new(tick: Tick) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_actions.is_empty() && self.pins.is_empty() && self.dropped.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

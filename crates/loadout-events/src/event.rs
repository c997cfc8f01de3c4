//! Engine Event Types
//!
//! Records emitted by the decision engine for every outcome worth auditing.
//! The host drains them after each tick and may log them as JSON lines.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ItemId, Tick};

/// Which cooldown duration was armed after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKind {
    /// Agent started the evaluation with nothing equipped
    Emergency,
    /// Agent completed a swap
    PostSwap,
    /// No candidate beat the current item, or the host failed
    FailedSearch,
    /// Agent holds pinned equipment and upgrades are disabled
    PinHold,
}

/// Why an evaluation ended without a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    /// The locator returned nothing eligible
    NoCandidates,
    /// Best candidate did not clear the upgrade threshold
    BelowThreshold,
    /// Best candidate could no longer be reserved at action time
    ReservationDenied,
    /// A host call failed (spatial query, drop or equip)
    HostFailure,
}

/// Why a pin was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinClearReason {
    /// Operator issued an unpin command
    Unpinned,
    /// Grace window elapsed with the item still off the agent
    GraceExpired,
    /// Agent kept trying to re-equip past the hard timeout
    HardTimeout,
    /// Item was destroyed or is no longer known to the host
    ItemGone,
    /// Agent is no longer valid
    AgentGone,
    /// Another agent equipped or was pinned to the item
    Claimed,
}

/// Registry named in drift reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registry {
    Scheduler,
    Dropped,
    Cooldowns,
    Pins,
    Grace,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEventKind {
    Swapped {
        agent: AgentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<ItemId>,
        to: ItemId,
        from_score: f32,
        to_score: f32,
        cooldown: CooldownKind,
        cooldown_until: Tick,
    },
    SearchDeferred {
        agent: AgentId,
        reason: DeferReason,
        cooldown_until: Tick,
    },
    PinHeld {
        agent: AgentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        item: Option<ItemId>,
        cooldown_until: Tick,
    },
    GraceStarted {
        agent: AgentId,
        item: ItemId,
    },
    GraceExtended {
        agent: AgentId,
        item: ItemId,
        next_check: Tick,
    },
    GraceEnded {
        agent: AgentId,
        item: ItemId,
    },
    PinCleared {
        agent: AgentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        item: Option<ItemId>,
        reason: PinClearReason,
    },
    DriftCorrected {
        registry: Registry,
        detail: String,
    },
    StateRebuilt {
        cooldowns: usize,
        pins: usize,
        dropped: usize,
    },
}

/// A single engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_id: String,
    pub tick: Tick,
    #[serde(flatten)]
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(event_id: impl Into<String>, tick: Tick, kind: EngineEventKind) -> Self {
        Self {
            event_id: event_id.into(),
            tick,
            kind,
        }
    }

    /// Agent this event concerns, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match &self.kind {
            EngineEventKind::Swapped { agent, .. }
            | EngineEventKind::SearchDeferred { agent, .. }
            | EngineEventKind::PinHeld { agent, .. }
            | EngineEventKind::GraceStarted { agent, .. }
            | EngineEventKind::GraceExtended { agent, .. }
            | EngineEventKind::GraceEnded { agent, .. }
            | EngineEventKind::PinCleared { agent, .. } => Some(*agent),
            EngineEventKind::DriftCorrected { .. } | EngineEventKind::StateRebuilt { .. } => None,
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self.kind, EngineEventKind::Swapped { .. })
    }

    /// Serializes the event to a JSON line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an event from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("ldo_{:08}", sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_format() {
        assert_eq!(generate_event_id(1), "ldo_00000001");
        assert_eq!(generate_event_id(12345678), "ldo_12345678");
    }

    #[test]
    fn test_swap_event_shape() {
        let event = EngineEvent::new(
            generate_event_id(3),
            120,
            EngineEventKind::Swapped {
                agent: AgentId(1),
                from: None,
                to: ItemId(9),
                from_score: 0.0,
                to_score: 41.5,
                cooldown: CooldownKind::Emergency,
                cooldown_until: 180,
            },
        );

        let json: serde_json::Value = serde_json::from_str(&event.to_jsonl().unwrap()).unwrap();
        assert_eq!(json["type"], "swapped");
        assert_eq!(json["agent"], 1);
        assert_eq!(json["cooldown"], "emergency");
        assert!(json.get("from").is_none());

        let parsed = EngineEvent::from_jsonl(&event.to_jsonl().unwrap()).unwrap();
        assert_eq!(parsed, event);
        assert!(parsed.is_swap());
        assert_eq!(parsed.agent(), Some(AgentId(1)));
    }

    #[test]
    fn test_drift_event_has_no_agent() {
        let event = EngineEvent::new(
            "ldo_00000001",
            5000,
            EngineEventKind::DriftCorrected {
                registry: Registry::Scheduler,
                detail: "index 4 != live 3".into(),
            },
        );
        assert_eq!(event.agent(), None);
        assert!(event.to_jsonl().unwrap().contains("\"registry\":\"scheduler\""));
    }
}

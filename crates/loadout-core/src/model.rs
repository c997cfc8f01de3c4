//! World Model
//!
//! Read-only views of agents, items and archetypes as the host reports them.
//! The engine never owns world state; it asks the host for a fresh view every
//! time and treats a missing view as a stale id.

use serde::{Deserialize, Serialize};

use loadout_events::{AgentId, ArchetypeId, ItemId};

/// A point on the world plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Position) -> f32 {
        self.distance_sq(other).sqrt()
    }
}

/// Ordinal quality tier of an item instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Awful,
    Poor,
    #[default]
    Normal,
    Good,
    Excellent,
    Masterwork,
    Legendary,
}

impl Quality {
    /// Ordinal position, 0 for Awful.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn all() -> &'static [Quality] {
        &[
            Quality::Awful,
            Quality::Poor,
            Quality::Normal,
            Quality::Good,
            Quality::Excellent,
            Quality::Masterwork,
            Quality::Legendary,
        ]
    }
}

/// Agent skill levels, 0 to 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Skills {
    pub melee: u8,
    pub shooting: u8,
}

impl Skills {
    pub fn new(melee: u8, shooting: u8) -> Self {
        Self { melee, shooting }
    }

    /// Returns (matching, opposing) skill for an item style.
    pub fn matching_and_opposing(&self, melee_item: bool) -> (u8, u8) {
        if melee_item {
            (self.melee, self.shooting)
        } else {
            (self.shooting, self.melee)
        }
    }
}

/// Personality flags that bend item preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTrait {
    /// Prefers melee, dislikes ranged
    Brawler,
    /// Favors items that fire in bursts
    TriggerHappy,
    /// Favors long-range precise items
    CarefulShooter,
    /// Refuses to wield anything
    Pacifist,
}

/// Standing assignment an agent is working under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duty {
    Hunter,
    Guard,
    Soldier,
    Worker,
}

/// What the agent is busy with right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    Working,
    Fighting,
    Sleeping,
    Downed,
    Traveling,
}

/// Kind of container an item sits in, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Stockpile,
    Shelf,
    Grave,
    Sarcophagus,
    Corpse,
}

/// Snapshot of an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    pub id: AgentId,
    pub position: Position,
    pub equipped: Option<ItemId>,
    pub skills: Skills,
    pub traits: Vec<AgentTrait>,
    pub duty: Option<Duty>,
    pub alive: bool,
    pub controllable: bool,
    pub activity: Activity,
}

impl AgentView {
    pub fn new(id: AgentId, position: Position) -> Self {
        Self {
            id,
            position,
            equipped: None,
            skills: Skills::default(),
            traits: Vec::new(),
            duty: None,
            alive: true,
            controllable: true,
            activity: Activity::Idle,
        }
    }

    pub fn has_trait(&self, t: AgentTrait) -> bool {
        self.traits.contains(&t)
    }
}

/// Snapshot of an item instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub id: ItemId,
    pub archetype: ArchetypeId,
    pub quality: Quality,
    /// Remaining condition, 0.0 to 1.0
    pub condition: f32,
    pub holder: Option<AgentId>,
    pub position: Position,
    pub destroyed: bool,
    pub burning: bool,
    pub container: Option<ContainerKind>,
    /// Agent this item is bonded to, if any
    pub bound_to: Option<AgentId>,
}

impl ItemView {
    pub fn new(id: ItemId, archetype: impl Into<ArchetypeId>, quality: Quality, position: Position) -> Self {
        Self {
            id,
            archetype: archetype.into(),
            quality,
            condition: 1.0,
            holder: None,
            position,
            destroyed: false,
            burning: false,
            container: None,
            bound_to: None,
        }
    }

    pub fn is_held_by(&self, agent: AgentId) -> bool {
        self.holder == Some(agent)
    }
}

/// Shared stats of an item archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeStats {
    pub damage: f32,
    /// Ticks between bursts
    pub cooldown_ticks: f32,
    /// Ticks spent aiming before a burst
    pub warmup_ticks: f32,
    pub burst_count: u32,
    pub range: f32,
    /// Fraction of armor ignored, 0.0 to 1.0
    pub armor_penetration: f32,
    pub melee: bool,
    /// Minimum matching skill to use effectively
    #[serde(default)]
    pub required_skill: u8,
    #[serde(default)]
    pub duties: Vec<Duty>,
}

impl ArchetypeStats {
    pub fn melee(damage: f32, cooldown_ticks: f32, armor_penetration: f32) -> Self {
        Self {
            damage,
            cooldown_ticks,
            warmup_ticks: 0.0,
            burst_count: 1,
            range: 1.5,
            armor_penetration,
            melee: true,
            required_skill: 0,
            duties: Vec::new(),
        }
    }

    pub fn ranged(damage: f32, cooldown_ticks: f32, warmup_ticks: f32, burst_count: u32, range: f32) -> Self {
        Self {
            damage,
            cooldown_ticks,
            warmup_ticks,
            burst_count,
            range,
            armor_penetration: 0.1,
            melee: false,
            required_skill: 0,
            duties: Vec::new(),
        }
    }

    pub fn with_armor_penetration(mut self, ap: f32) -> Self {
        self.armor_penetration = ap;
        self
    }

    pub fn with_required_skill(mut self, skill: u8) -> Self {
        self.required_skill = skill;
        self
    }

    pub fn with_duties(mut self, duties: Vec<Duty>) -> Self {
        self.duties = duties;
        self
    }

    pub fn suits(&self, duty: Duty) -> bool {
        self.duties.contains(&duty)
    }
}

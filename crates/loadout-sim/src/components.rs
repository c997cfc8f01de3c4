//! Host World Components
//!
//! Colonists and the gear lying around them. Engine ids are the entity bits,
//! so a despawned entity's id simply stops resolving.

use bevy_ecs::prelude::*;

use loadout_core::{Activity, AgentTrait, ContainerKind, Duty, Position, Quality, Skills};
use loadout_events::{AgentId, ArchetypeId, ItemId, Tick};

/// A colonist the engine equips
#[derive(Component, Debug, Clone)]
pub struct Colonist {
    pub name: String,
    pub skills: Skills,
    pub traits: Vec<AgentTrait>,
    pub duty: Option<Duty>,
    pub alive: bool,
    /// Player-drafted colonists are still under our control; mind-broken ones are not
    pub controllable: bool,
    pub activity: Activity,
}

impl Colonist {
    pub fn new(name: impl Into<String>, skills: Skills) -> Self {
        Self {
            name: name.into(),
            skills,
            traits: Vec::new(),
            duty: None,
            alive: true,
            controllable: true,
            activity: Activity::Idle,
        }
    }
}

/// The single equipment slot
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Equipment {
    pub slot: Option<Entity>,
}

/// Where an entity stands. Held gear keeps its last ground position and
/// reports its holder's instead.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Location(pub Position);

/// A piece of equipment
#[derive(Component, Debug, Clone)]
pub struct Gear {
    pub archetype: ArchetypeId,
    pub quality: Quality,
    /// 0.0 to 1.0
    pub condition: f32,
    pub holder: Option<Entity>,
    pub destroyed: bool,
    pub burning: bool,
    pub container: Option<ContainerKind>,
    pub bound_to: Option<Entity>,
}

impl Gear {
    pub fn new(archetype: impl Into<ArchetypeId>, quality: Quality) -> Self {
        Self {
            archetype: archetype.into(),
            quality,
            condition: 1.0,
            holder: None,
            destroyed: false,
            burning: false,
            container: None,
            bound_to: None,
        }
    }

    pub fn is_loose(&self) -> bool {
        self.holder.is_none() && !self.destroyed
    }
}

/// Colonist walking back to pick up something they fumbled
#[derive(Component, Debug, Clone, Copy)]
pub struct Recovering {
    pub target: Entity,
    pub since: Tick,
}

pub fn agent_id(entity: Entity) -> AgentId {
    AgentId(entity.to_bits())
}

pub fn item_id(entity: Entity) -> ItemId {
    ItemId(entity.to_bits())
}

/// Entity behind an engine id, if the bits are well formed.
pub fn entity_of(bits: u64) -> Option<Entity> {
    Entity::try_from_bits(bits).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_through_entity_bits() {
        let mut world = World::new();
        let entity = world.spawn(Location::default()).id();

        assert_eq!(entity_of(agent_id(entity).0), Some(entity));
        assert_eq!(entity_of(item_id(entity).0), Some(entity));
    }

    #[test]
    fn test_loose_gear() {
        let mut world = World::new();
        let holder = world.spawn(Equipment::default()).id();

        let mut gear = Gear::new("club", Quality::Normal);
        assert!(gear.is_loose());
        gear.holder = Some(holder);
        assert!(!gear.is_loose());
        gear.holder = None;
        gear.destroyed = true;
        assert!(!gear.is_loose());
    }
}

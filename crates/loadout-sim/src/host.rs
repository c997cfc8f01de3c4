//! ECS Host Adapter
//!
//! Presents a bevy `World` to the engine through `HostWorld`. Every lookup
//! goes through the entity bits, so despawned or recycled entities read as
//! missing rather than as someone else.

use bevy_ecs::prelude::*;

use loadout_core::{AgentView, ArchetypeStats, HostError, HostWorld, ItemView, Position};
use loadout_events::{AgentId, ArchetypeId, ItemId, Tick};

use crate::components::{agent_id, entity_of, item_id, Colonist, Equipment, Gear, Location, Recovering};
use crate::resources::{AllowList, ArchetypeCatalog, ItemGrid, Reservations, SimClock};

/// Borrowed view of the world for one engine call
pub struct EcsHost<'w> {
    world: &'w mut World,
}

impl<'w> EcsHost<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    fn colonist(&self, id: AgentId) -> Option<(Entity, &Colonist)> {
        let entity = entity_of(id.0)?;
        self.world.get::<Colonist>(entity).map(|c| (entity, c))
    }

    fn gear(&self, id: ItemId) -> Option<(Entity, &Gear)> {
        let entity = entity_of(id.0)?;
        self.world.get::<Gear>(entity).map(|g| (entity, g))
    }

    fn position(&self, entity: Entity) -> Option<Position> {
        self.world.get::<Location>(entity).map(|l| l.0)
    }

    fn equip_error(agent: AgentId, item: ItemId, reason: &str) -> HostError {
        HostError::Equip {
            agent,
            item,
            reason: reason.to_string(),
        }
    }

    fn drop_error(agent: AgentId, item: ItemId, reason: &str) -> HostError {
        HostError::Drop {
            agent,
            item,
            reason: reason.to_string(),
        }
    }
}

impl HostWorld for EcsHost<'_> {
    fn current_tick(&self) -> Tick {
        self.world.get_resource::<SimClock>().map_or(0, |c| c.tick)
    }

    fn agent(&self, id: AgentId) -> Option<AgentView> {
        let (entity, colonist) = self.colonist(id)?;
        let position = self.position(entity)?;
        let equipped = self
            .world
            .get::<Equipment>(entity)
            .and_then(|e| e.slot)
            .map(item_id);

        Some(AgentView {
            id,
            position,
            equipped,
            skills: colonist.skills,
            traits: colonist.traits.clone(),
            duty: colonist.duty,
            alive: colonist.alive,
            controllable: colonist.controllable,
            activity: colonist.activity,
        })
    }

    fn item(&self, id: ItemId) -> Option<ItemView> {
        let (entity, gear) = self.gear(id)?;
        let position = gear
            .holder
            .and_then(|holder| self.position(holder))
            .or_else(|| self.position(entity))?;

        let mut view = ItemView::new(id, gear.archetype.clone(), gear.quality, position);
        view.condition = gear.condition;
        view.holder = gear.holder.map(agent_id);
        view.destroyed = gear.destroyed;
        view.burning = gear.burning;
        view.container = gear.container;
        view.bound_to = gear.bound_to.map(agent_id);
        Some(view)
    }

    fn archetype(&self, id: &ArchetypeId) -> Option<ArchetypeStats> {
        self.world.get_resource::<ArchetypeCatalog>()?.get(id).cloned()
    }

    fn spatial_query(&self, origin: Position, radius: f32) -> Result<Vec<ItemId>, HostError> {
        let grid = self
            .world
            .get_resource::<ItemGrid>()
            .ok_or_else(|| HostError::SpatialQuery("item grid is not built".into()))?;
        Ok(grid.within(origin, radius).into_iter().map(item_id).collect())
    }

    fn is_policy_allowed(&self, agent: AgentId, item: ItemId) -> bool {
        let (Some((_, colonist)), Some((_, gear))) = (self.colonist(agent), self.gear(item)) else {
            return false;
        };
        self.world
            .get_resource::<AllowList>()
            .map_or(true, |list| list.allows(colonist.duty, &gear.archetype))
    }

    fn can_reserve(&self, agent: AgentId, item: ItemId) -> bool {
        let (Some(a), Some(i)) = (entity_of(agent.0), entity_of(item.0)) else {
            return false;
        };
        self.world
            .get_resource::<Reservations>()
            .map_or(true, |r| r.holder(i).map_or(true, |owner| owner == a))
    }

    fn reserve(&mut self, agent: AgentId, item: ItemId) -> bool {
        let (Some(a), Some(i)) = (entity_of(agent.0), entity_of(item.0)) else {
            return false;
        };
        match self.world.get_resource_mut::<Reservations>() {
            Some(mut reservations) => reservations.claim(a, i),
            None => true,
        }
    }

    fn release(&mut self, agent: AgentId, item: ItemId) {
        if let (Some(a), Some(i)) = (entity_of(agent.0), entity_of(item.0)) {
            if let Some(mut reservations) = self.world.get_resource_mut::<Reservations>() {
                reservations.release(a, i);
            }
        }
    }

    fn move_item_to_agent(&mut self, agent: AgentId, item: ItemId) -> Result<(), HostError> {
        let a = self
            .colonist(agent)
            .map(|(e, _)| e)
            .ok_or_else(|| Self::equip_error(agent, item, "agent is gone"))?;
        let (i, gear) = self
            .gear(item)
            .ok_or_else(|| Self::equip_error(agent, item, "item is gone"))?;
        if gear.destroyed {
            return Err(Self::equip_error(agent, item, "item is destroyed"));
        }
        if gear.holder.is_some_and(|h| h != a) {
            return Err(Self::equip_error(agent, item, "item is held by someone else"));
        }
        if self.world.get::<Equipment>(a).and_then(|e| e.slot).is_some_and(|s| s != i) {
            return Err(Self::equip_error(agent, item, "equipment slot is occupied"));
        }

        if let Some(mut gear) = self.world.get_mut::<Gear>(i) {
            gear.holder = Some(a);
        }
        match self.world.get_mut::<Equipment>(a) {
            Some(mut equipment) => equipment.slot = Some(i),
            None => {
                self.world.entity_mut(a).insert(Equipment { slot: Some(i) });
            }
        }
        Ok(())
    }

    fn drop_item(&mut self, agent: AgentId, item: ItemId) -> Result<(), HostError> {
        let a = self
            .colonist(agent)
            .map(|(e, _)| e)
            .ok_or_else(|| Self::drop_error(agent, item, "agent is gone"))?;
        let i = self
            .gear(item)
            .map(|(e, _)| e)
            .ok_or_else(|| Self::drop_error(agent, item, "item is gone"))?;
        if self.world.get::<Equipment>(a).and_then(|e| e.slot) != Some(i) {
            return Err(Self::drop_error(agent, item, "item is not equipped"));
        }
        let feet = self.position(a).unwrap_or_default();

        if let Some(mut equipment) = self.world.get_mut::<Equipment>(a) {
            equipment.slot = None;
        }
        if let Some(mut gear) = self.world.get_mut::<Gear>(i) {
            gear.holder = None;
        }
        match self.world.get_mut::<Location>(i) {
            Some(mut location) => location.0 = feet,
            None => {
                self.world.entity_mut(i).insert(Location(feet));
            }
        }
        Ok(())
    }

    fn is_targeting(&self, agent: AgentId, item: ItemId) -> bool {
        let (Some(a), Some(i)) = (entity_of(agent.0), entity_of(item.0)) else {
            return false;
        };
        let walking_to = self.world.get::<Recovering>(a).is_some_and(|r| r.target == i);
        let claimed = self
            .world
            .get_resource::<Reservations>()
            .is_some_and(|r| r.holder(i) == Some(a));
        walking_to || claimed
    }
}

//! Shared World Resources
//!
//! The clock, RNG, item index and the bits of colony state the engine asks
//! the host about: archetype stats, the allow-list and reservations.

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use loadout_core::{ArchetypeStats, Duty, Engine, Position};
use loadout_events::{ArchetypeId, Tick};
use serde::Serialize;

use crate::config::PolicyRule;

pub use crate::SimRng;

/// Current simulation tick
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct SimClock {
    pub tick: Tick,
}

/// Loose gear bucketed into square cells, rebuilt every tick
#[derive(Resource, Debug)]
pub struct ItemGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<(Entity, Position)>>,
}

impl Default for ItemGrid {
    fn default() -> Self {
        Self::new(16.0)
    }
}

impl ItemGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, position: Position) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, entity: Entity, position: Position) {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push((entity, position));
    }

    /// Items within `radius` of `origin`, ordered by entity.
    pub fn within(&self, origin: Position, radius: f32) -> Vec<Entity> {
        let reach = (radius / self.cell_size).ceil() as i32;
        let (cx, cy) = self.cell_of(origin);
        let radius_sq = radius * radius;

        let mut found = Vec::new();
        for x in cx - reach..=cx + reach {
            for y in cy - reach..=cy + reach {
                if let Some(entries) = self.cells.get(&(x, y)) {
                    found.extend(
                        entries
                            .iter()
                            .filter(|(_, pos)| pos.distance_sq(&origin) <= radius_sq)
                            .map(|(entity, _)| *entity),
                    );
                }
            }
        }
        found.sort_by_key(|e| e.to_bits());
        found
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(Vec::is_empty)
    }
}

/// Known archetypes and their stats
#[derive(Resource, Debug, Clone, Default)]
pub struct ArchetypeCatalog {
    archetypes: BTreeMap<ArchetypeId, ArchetypeStats>,
}

impl ArchetypeCatalog {
    pub fn new(archetypes: BTreeMap<ArchetypeId, ArchetypeStats>) -> Self {
        Self { archetypes }
    }

    pub fn get(&self, id: &ArchetypeId) -> Option<&ArchetypeStats> {
        self.archetypes.get(id)
    }

    /// Archetype names in a stable order
    pub fn ids(&self) -> Vec<ArchetypeId> {
        self.archetypes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

/// Player allow-list: archetypes forbidden to colonists on a duty
#[derive(Resource, Debug, Clone, Default)]
pub struct AllowList {
    forbidden: HashMap<Duty, BTreeSet<ArchetypeId>>,
}

impl AllowList {
    pub fn from_rules(rules: &[PolicyRule]) -> Self {
        let mut list = Self::default();
        for rule in rules {
            list.forbidden
                .entry(rule.duty)
                .or_default()
                .extend(rule.forbid.iter().cloned());
        }
        list
    }

    pub fn allows(&self, duty: Option<Duty>, archetype: &ArchetypeId) -> bool {
        duty.and_then(|d| self.forbidden.get(&d))
            .map_or(true, |set| !set.contains(archetype))
    }
}

/// Item -> colonist holding a claim on it
#[derive(Resource, Debug, Default)]
pub struct Reservations {
    claims: HashMap<Entity, Entity>,
}

impl Reservations {
    pub fn holder(&self, item: Entity) -> Option<Entity> {
        self.claims.get(&item).copied()
    }

    /// Claim `item` for `agent`; false if someone else already has it.
    pub fn claim(&mut self, agent: Entity, item: Entity) -> bool {
        match self.claims.get(&item) {
            Some(&owner) => owner == agent,
            None => {
                self.claims.insert(item, agent);
                true
            }
        }
    }

    /// Drop `agent`'s claim on `item`. Claims by others are left alone.
    pub fn release(&mut self, agent: Entity, item: Entity) {
        if self.claims.get(&item) == Some(&agent) {
            self.claims.remove(&item);
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Equipment changes the world made on its own this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Equipped { agent: Entity, item: Entity },
    Dropped { agent: Entity, item: Entity },
}

/// Out-of-band equip/drop notices waiting for the engine
#[derive(Resource, Debug, Default)]
pub struct LifecycleQueue {
    pending: Vec<Lifecycle>,
}

impl LifecycleQueue {
    pub fn push(&mut self, notice: Lifecycle) {
        self.pending.push(notice);
    }

    pub fn drain(&mut self) -> Vec<Lifecycle> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The decision engine living inside the world
#[derive(Resource)]
pub struct LoadoutEngine(pub Engine);

/// Counters for things the world did to colonists' gear
#[derive(Resource, Debug, Default, Clone, Serialize)]
pub struct SimCounters {
    pub loot_spawned: u64,
    pub fumbles: u64,
    pub recoveries: u64,
    pub abandoned_recoveries: u64,
    pub fires: u64,
    pub destroyed: u64,
    pub decisions_logged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_within_radius() {
        let mut world = World::new();
        let near = world.spawn_empty().id();
        let edge = world.spawn_empty().id();
        let far = world.spawn_empty().id();

        let mut grid = ItemGrid::new(10.0);
        grid.insert(near, Position::new(3.0, 4.0));
        grid.insert(edge, Position::new(-20.0, 0.0));
        grid.insert(far, Position::new(80.0, 80.0));

        assert_eq!(grid.len(), 3);
        assert_eq!(grid.within(Position::new(0.0, 0.0), 5.0), vec![near]);
        let wide = grid.within(Position::new(0.0, 0.0), 20.0);
        assert!(wide.contains(&near) && wide.contains(&edge));
        assert!(!wide.contains(&far));

        grid.clear();
        assert!(grid.is_empty());
    }

    #[test]
    fn test_reservation_claims() {
        let mut world = World::new();
        let alice = world.spawn_empty().id();
        let bob = world.spawn_empty().id();
        let rifle = world.spawn_empty().id();

        let mut reservations = Reservations::default();
        assert!(reservations.claim(alice, rifle));
        assert!(reservations.claim(alice, rifle));
        assert!(!reservations.claim(bob, rifle));

        reservations.release(bob, rifle);
        assert_eq!(reservations.holder(rifle), Some(alice));
        reservations.release(alice, rifle);
        assert!(reservations.is_empty());
    }

    #[test]
    fn test_allow_list_by_duty() {
        let list = AllowList::from_rules(&[PolicyRule {
            duty: Duty::Worker,
            forbid: vec![ArchetypeId::new("assault_rifle")],
        }]);
        let rifle = ArchetypeId::new("assault_rifle");

        assert!(!list.allows(Some(Duty::Worker), &rifle));
        assert!(list.allows(Some(Duty::Guard), &rifle));
        assert!(list.allows(None, &rifle));
        assert!(list.allows(Some(Duty::Worker), &ArchetypeId::new("club")));
    }
}

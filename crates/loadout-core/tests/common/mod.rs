//! In-memory host world shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};

use loadout_core::{
    AgentView, ArchetypeStats, Engine, EngineConfig, HostCapabilities, HostError, HostWorld, ItemView, Position,
    Quality,
};
use loadout_events::{AgentId, ArchetypeId, ItemId, Tick};

pub struct MockWorld {
    pub tick: Tick,
    pub agents: BTreeMap<AgentId, AgentView>,
    pub items: BTreeMap<ItemId, ItemView>,
    pub archetypes: HashMap<ArchetypeId, ArchetypeStats>,
    pub denied: HashSet<ItemId>,
    pub reservations: HashMap<ItemId, AgentId>,
    pub targeting: HashSet<(AgentId, ItemId)>,
    pub capabilities: HostCapabilities,
    pub fail_equip: bool,
    /// Items the host refuses to hand to anyone
    pub refuse_equip: HashSet<ItemId>,
    pub fail_reserve: bool,
    pub fail_query: bool,
}

impl MockWorld {
    pub fn new() -> Self {
        let mut archetypes = HashMap::new();
        archetypes.insert(ArchetypeId::new("club"), ArchetypeStats::melee(5.0, 80.0, 0.0));
        archetypes.insert(ArchetypeId::new("knife"), ArchetypeStats::melee(9.0, 60.0, 0.1));
        archetypes.insert(ArchetypeId::new("longsword"), ArchetypeStats::melee(12.0, 60.0, 0.2));
        archetypes.insert(
            ArchetypeId::new("rifle"),
            ArchetypeStats::ranged(18.0, 100.0, 60.0, 1, 30.0),
        );
        archetypes.insert(
            ArchetypeId::new("assault_rifle"),
            ArchetypeStats::ranged(12.0, 90.0, 30.0, 3, 28.0),
        );
        Self {
            tick: 0,
            agents: BTreeMap::new(),
            items: BTreeMap::new(),
            archetypes,
            denied: HashSet::new(),
            reservations: HashMap::new(),
            targeting: HashSet::new(),
            capabilities: HostCapabilities::default(),
            fail_equip: false,
            refuse_equip: HashSet::new(),
            fail_reserve: false,
            fail_query: false,
        }
    }

    pub fn at(tick: Tick) -> Self {
        Self {
            tick,
            ..Self::new()
        }
    }

    pub fn add_agent(&mut self, id: u64, x: f32, y: f32) -> AgentId {
        let agent = AgentId(id);
        self.agents.insert(agent, AgentView::new(agent, Position::new(x, y)));
        agent
    }

    pub fn add_item(&mut self, id: u64, archetype: &str, quality: Quality, x: f32, y: f32) -> ItemId {
        let item = ItemId(id);
        self.items
            .insert(item, ItemView::new(item, archetype, quality, Position::new(x, y)));
        item
    }

    /// Put an item straight into an agent's hands, bypassing the engine.
    pub fn give(&mut self, agent: AgentId, item: ItemId) {
        self.agents.get_mut(&agent).expect("agent").equipped = Some(item);
        self.items.get_mut(&item).expect("item").holder = Some(agent);
    }

    /// Take an item out of an agent's hands and leave it at its feet.
    pub fn take(&mut self, agent: AgentId, item: ItemId) {
        let position = self.agents[&agent].position;
        self.agents.get_mut(&agent).expect("agent").equipped = None;
        let view = self.items.get_mut(&item).expect("item");
        view.holder = None;
        view.position = position;
    }

    pub fn agent_view(&self, agent: AgentId) -> &AgentView {
        &self.agents[&agent]
    }

    pub fn item_view(&self, item: ItemId) -> &ItemView {
        &self.items[&item]
    }

    /// Advance tick by tick up to `tick`, letting the engine dispatch each one.
    pub fn run_until(&mut self, engine: &mut Engine, tick: Tick) {
        while self.tick < tick {
            self.tick += 1;
            engine.on_tick(self);
        }
    }
}

impl HostWorld for MockWorld {
    fn current_tick(&self) -> Tick {
        self.tick
    }

    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn agent(&self, id: AgentId) -> Option<AgentView> {
        self.agents.get(&id).cloned()
    }

    fn item(&self, id: ItemId) -> Option<ItemView> {
        self.items.get(&id).cloned()
    }

    fn archetype(&self, id: &ArchetypeId) -> Option<ArchetypeStats> {
        self.archetypes.get(id).cloned()
    }

    fn spatial_query(&self, origin: Position, radius: f32) -> Result<Vec<ItemId>, HostError> {
        if self.fail_query {
            return Err(HostError::SpatialQuery("grid offline".into()));
        }
        Ok(self
            .items
            .values()
            .filter(|item| item.position.distance(&origin) <= radius)
            .map(|item| item.id)
            .collect())
    }

    fn is_policy_allowed(&self, _agent: AgentId, item: ItemId) -> bool {
        !self.denied.contains(&item)
    }

    fn can_reserve(&self, agent: AgentId, item: ItemId) -> bool {
        self.reservations.get(&item).map_or(true, |&holder| holder == agent)
    }

    fn reserve(&mut self, agent: AgentId, item: ItemId) -> bool {
        if self.fail_reserve || !self.can_reserve(agent, item) {
            return false;
        }
        self.reservations.insert(item, agent);
        true
    }

    fn release(&mut self, agent: AgentId, item: ItemId) {
        if self.reservations.get(&item) == Some(&agent) {
            self.reservations.remove(&item);
        }
    }

    fn move_item_to_agent(&mut self, agent: AgentId, item: ItemId) -> Result<(), HostError> {
        if self.fail_equip || self.refuse_equip.contains(&item) {
            return Err(HostError::Equip {
                agent,
                item,
                reason: "hands are full".into(),
            });
        }
        if !self.items.contains_key(&item) || !self.agents.contains_key(&agent) {
            return Err(HostError::Equip {
                agent,
                item,
                reason: "stale id".into(),
            });
        }
        self.give(agent, item);
        Ok(())
    }

    fn drop_item(&mut self, agent: AgentId, item: ItemId) -> Result<(), HostError> {
        if self.agents.get(&agent).and_then(|a| a.equipped) != Some(item) {
            return Err(HostError::Drop {
                agent,
                item,
                reason: "not equipped".into(),
            });
        }
        self.take(agent, item);
        Ok(())
    }

    fn is_targeting(&self, agent: AgentId, item: ItemId) -> bool {
        self.targeting.contains(&(agent, item))
    }
}

pub fn engine(world: &MockWorld) -> Engine {
    Engine::new(EngineConfig::default(), world).expect("default config is valid")
}

pub fn engine_with(world: &MockWorld, config: EngineConfig) -> Engine {
    Engine::new(config, world).expect("config is valid")
}

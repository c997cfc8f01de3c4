//! Colony host world for the loadout engine.
//!
//! A bevy_ecs world of colonists and gear that implements `HostWorld`, runs
//! the engine once per tick and writes every decision to a JSONL log.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::io;

use loadout_core::{Engine, EngineConfig};
use loadout_events::{GroundTruth, Tick};

pub mod components;
pub mod config;
pub mod error;
pub mod host;
pub mod logger;
pub mod resources;
pub mod setup;
pub mod systems;

pub use config::SimConfig;
pub use error::SimError;
pub use host::EcsHost;
pub use logger::DecisionLogger;
pub use resources::SimCounters;

/// Seeded RNG for reproducible simulation
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// A populated world plus its tick schedule
pub struct Simulation {
    world: World,
    schedule: Schedule,
}

impl Simulation {
    /// Build the colony, start the engine and apply opening pins.
    pub fn new(config: SimConfig, seed: u64, logger: DecisionLogger) -> Result<Self, SimError> {
        config.validate()?;
        let mut world = World::new();

        world.insert_resource(resources::SimClock::default());
        world.insert_resource(SimRng(SmallRng::seed_from_u64(seed)));
        world.insert_resource(resources::ArchetypeCatalog::new(config.archetypes.clone()));
        world.insert_resource(resources::AllowList::from_rules(&config.policy));
        world.insert_resource(resources::ItemGrid::new(config.world.grid_cell));
        world.insert_resource(resources::Reservations::default());
        world.insert_resource(resources::LifecycleQueue::default());
        world.insert_resource(SimCounters::default());
        world.insert_resource(logger);

        setup::populate(&mut world, &config);

        let engine = Engine::new(config.engine.clone(), &EcsHost::new(&mut world))?;
        tracing::info!("Engine session {} started", engine.session());
        world.insert_resource(resources::LoadoutEngine(engine));
        world.insert_resource(config);
        setup::pin_starting_gear(&mut world);

        Ok(Self {
            world,
            schedule: systems::build_schedule(),
        })
    }

    /// Advance one tick.
    pub fn step(&mut self) {
        self.world.resource_mut::<resources::SimClock>().tick += 1;
        self.schedule.run(&mut self.world);
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn tick(&self) -> Tick {
        self.world.resource::<resources::SimClock>().tick
    }

    pub fn engine(&self) -> &Engine {
        &self.world.resource::<resources::LoadoutEngine>().0
    }

    pub fn counters(&self) -> &SimCounters {
        self.world.resource::<SimCounters>()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn export_ground_truth(&self) -> GroundTruth {
        self.engine().export_ground_truth()
    }

    /// Restore engine state from an exported snapshot of this same world.
    pub fn import_ground_truth(&mut self, json: &str) -> Result<(), SimError> {
        self.world.resource_scope(|world, mut engine: Mut<resources::LoadoutEngine>| {
            engine.0.import_ground_truth(&EcsHost::new(world), json)
        })?;
        Ok(())
    }

    /// Verify the engine's registries against its scheduler.
    pub fn audit(&mut self) -> bool {
        self.world
            .resource_scope(|world, mut engine: Mut<resources::LoadoutEngine>| engine.0.audit(&EcsHost::new(world)))
    }

    pub fn reload_config(&mut self, config: EngineConfig) -> Result<(), SimError> {
        self.world.resource_mut::<resources::LoadoutEngine>().0.reload_config(config)?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.world.resource_mut::<DecisionLogger>().flush()
    }
}

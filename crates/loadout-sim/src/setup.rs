//! World Setup
//!
//! Spawns the starting colony and applies the player's opening pins.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use loadout_core::{Activity, AgentTrait, ContainerKind, Duty, Position, Quality, Skills};

use crate::components::{agent_id, item_id, Colonist, Equipment, Gear, Location};
use crate::config::SimConfig;
use crate::host::EcsHost;
use crate::resources::{ArchetypeCatalog, LoadoutEngine, SimRng};

const NAMES: &[&str] = &[
    "Ada", "Bram", "Cass", "Dov", "Edda", "Finn", "Greta", "Hale", "Isla", "Joss", "Kit", "Lune",
];

const DUTIES: &[Option<Duty>] = &[
    Some(Duty::Hunter),
    Some(Duty::Guard),
    Some(Duty::Soldier),
    Some(Duty::Worker),
    None,
];

fn random_position(rng: &mut SmallRng, map_size: f32) -> Position {
    Position::new(rng.gen_range(0.0..map_size), rng.gen_range(0.0..map_size))
}

fn random_quality(rng: &mut SmallRng) -> Quality {
    match rng.gen_range(0..100) {
        0..=4 => Quality::Awful,
        5..=19 => Quality::Poor,
        20..=64 => Quality::Normal,
        65..=84 => Quality::Good,
        85..=94 => Quality::Excellent,
        95..=98 => Quality::Masterwork,
        _ => Quality::Legendary,
    }
}

/// A random piece of gear somewhere on the map.
pub fn random_gear(rng: &mut SmallRng, catalog: &ArchetypeCatalog, map_size: f32) -> (Gear, Location) {
    let ids = catalog.ids();
    let archetype = ids[rng.gen_range(0..ids.len())].clone();
    let mut gear = Gear::new(archetype, random_quality(rng));
    gear.condition = rng.gen_range(0.4..=1.0);
    gear.container = match rng.gen_range(0..100) {
        0..=7 => Some(ContainerKind::Stockpile),
        8..=11 => Some(ContainerKind::Shelf),
        12..=13 => Some(ContainerKind::Grave),
        _ => None,
    };
    (gear, Location(random_position(rng, map_size)))
}

fn random_colonist(rng: &mut SmallRng, index: usize) -> Colonist {
    let name = format!("{} {}", NAMES[index % NAMES.len()], index / NAMES.len() + 1);
    let mut colonist = Colonist::new(name, Skills::new(rng.gen_range(0..=15), rng.gen_range(0..=15)));
    colonist.duty = DUTIES[rng.gen_range(0..DUTIES.len())];

    for (t, chance) in [
        (AgentTrait::Brawler, 0.10),
        (AgentTrait::TriggerHappy, 0.08),
        (AgentTrait::CarefulShooter, 0.08),
        (AgentTrait::Pacifist, 0.03),
    ] {
        if rng.gen_bool(chance) {
            colonist.traits.push(t);
        }
    }
    colonist.activity = if rng.gen_bool(0.3) {
        Activity::Working
    } else {
        Activity::Idle
    };
    colonist
}

/// Spawn colonists, their starting gear and the loose gear around them.
pub fn populate(world: &mut World, config: &SimConfig) {
    let Some(mut rng) = world.remove_resource::<SimRng>() else {
        tracing::warn!("No RNG in the world, nothing spawned");
        return;
    };
    let catalog = world.resource::<ArchetypeCatalog>().clone();
    let map_size = config.world.map_size;

    for index in 0..config.world.agents {
        let colonist = random_colonist(&mut rng.0, index);
        let position = random_position(&mut rng.0, map_size);
        let armed = rng.0.gen_bool(config.world.armed_fraction);

        let agent = world
            .spawn((colonist, Location(position), Equipment::default()))
            .id();
        if armed {
            let (mut gear, _) = random_gear(&mut rng.0, &catalog, map_size);
            gear.holder = Some(agent);
            gear.container = None;
            let item = world.spawn((gear, Location(position))).id();
            world.entity_mut(agent).insert(Equipment { slot: Some(item) });
        }
    }

    for _ in 0..config.world.items {
        world.spawn(random_gear(&mut rng.0, &catalog, map_size));
    }

    world.insert_resource(rng);
}

/// Player pins some starting loadouts and asks a few unarmed colonists for
/// specific archetypes. Needs the engine in the world.
pub fn pin_starting_gear(world: &mut World) -> usize {
    let Some(mut rng) = world.remove_resource::<SimRng>() else {
        return 0;
    };
    let fraction = world.resource::<SimConfig>().world.pin_fraction;
    let archetypes = world.resource::<ArchetypeCatalog>().ids();

    let mut colonists = world.query_filtered::<(Entity, &Equipment), With<Colonist>>();
    let mut loadouts: Vec<(Entity, Option<Entity>)> = colonists.iter(world).map(|(e, eq)| (e, eq.slot)).collect();
    loadouts.sort_by_key(|(e, _)| e.to_bits());

    let pinned = world.resource_scope(|world, mut engine: Mut<LoadoutEngine>| {
        let host = EcsHost::new(world);
        let mut pinned = 0;
        for (agent, slot) in loadouts {
            match slot {
                Some(item) if rng.0.gen_bool(fraction) => {
                    if engine.0.pin_item(&host, agent_id(agent), item_id(item)) {
                        pinned += 1;
                    }
                }
                None if !archetypes.is_empty() && rng.0.gen_bool(fraction / 2.0) => {
                    let archetype = archetypes[rng.0.gen_range(0..archetypes.len())].clone();
                    if engine.0.pin_archetype(&host, agent_id(agent), archetype) {
                        pinned += 1;
                    }
                }
                _ => {}
            }
        }
        pinned
    });

    world.insert_resource(rng);
    tracing::info!("Player pinned {} starting loadouts", pinned);
    pinned
}

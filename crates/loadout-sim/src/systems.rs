//! Tick Systems
//!
//! The world moves first: colonists wander, fumble and recover gear, gear
//! wears out or burns, loot drops in. Then the item grid is rebuilt and the
//! engine runs last, seeing the world as it stands at the end of the tick.

use bevy_ecs::prelude::*;
use rand::Rng;

use loadout_core::{Activity, Position};

use crate::components::{agent_id, item_id, Colonist, Equipment, Gear, Location, Recovering};
use crate::config::SimConfig;
use crate::host::EcsHost;
use crate::logger::DecisionLogger;
use crate::resources::{
    ArchetypeCatalog, ItemGrid, Lifecycle, LifecycleQueue, LoadoutEngine, Reservations, SimClock, SimCounters,
    SimRng,
};
use crate::setup::random_gear;

/// Close enough to pick something up
const REACH: f32 = 1.5;

/// Chance per tick a fire burns itself out
const FIRE_OUT_CHANCE: f64 = 0.05;

const ACTIVITIES: &[Activity] = &[
    Activity::Idle,
    Activity::Working,
    Activity::Working,
    Activity::Traveling,
    Activity::Sleeping,
    Activity::Fighting,
];

/// Colonists drift between activities; now and then one goes down.
pub fn update_activities(config: Res<SimConfig>, mut rng: ResMut<SimRng>, mut colonists: Query<&mut Colonist>) {
    let chance = config.hazards.activity_change_chance;
    for mut colonist in colonists.iter_mut() {
        if !colonist.alive || !rng.0.gen_bool(chance) {
            continue;
        }
        colonist.activity = if rng.0.gen_bool(0.02) {
            Activity::Downed
        } else {
            ACTIVITIES[rng.0.gen_range(0..ACTIVITIES.len())]
        };
    }
}

fn step_toward(from: Position, to: Position, speed: f32) -> Position {
    let distance = from.distance(&to);
    if distance <= speed {
        return to;
    }
    let scale = speed / distance;
    Position::new(from.x + (to.x - from.x) * scale, from.y + (to.y - from.y) * scale)
}

fn clamp_to_map(position: Position, map_size: f32) -> Position {
    Position::new(position.x.clamp(0.0, map_size), position.y.clamp(0.0, map_size))
}

/// Recovering colonists head for their gear, everyone else ambles.
pub fn wander(
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut colonists: Query<(&Colonist, &mut Location, Option<&Recovering>), Without<Gear>>,
    gear: Query<&Location, (With<Gear>, Without<Colonist>)>,
) {
    let speed = config.world.move_speed;
    for (colonist, mut location, recovering) in colonists.iter_mut() {
        if !colonist.alive || matches!(colonist.activity, Activity::Sleeping | Activity::Downed) {
            continue;
        }
        let target = recovering.and_then(|r| gear.get(r.target).ok()).map(|l| l.0);
        let next = match target {
            Some(target) => step_toward(location.0, target, speed),
            None => Position::new(
                location.0.x + rng.0.gen_range(-speed..=speed),
                location.0.y + rng.0.gen_range(-speed..=speed),
            ),
        };
        location.0 = clamp_to_map(next, config.world.map_size);
    }
}

/// Pick fumbled gear back up, or give up on it.
#[allow(clippy::too_many_arguments)]
pub fn recover_items(
    mut commands: Commands,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    mut reservations: ResMut<Reservations>,
    mut lifecycle: ResMut<LifecycleQueue>,
    mut counters: ResMut<SimCounters>,
    mut colonists: Query<(Entity, &Location, &mut Equipment, &Recovering)>,
    mut gear: Query<(&Location, &mut Gear)>,
) {
    for (agent, location, mut equipment, recovering) in colonists.iter_mut() {
        let target = recovering.target;
        let expired = clock.tick.saturating_sub(recovering.since) > config.hazards.recover_give_up;

        let picked_up = match gear.get_mut(target) {
            Ok((spot, mut item)) if item.is_loose() && equipment.slot.is_none() && !expired => {
                if spot.0.distance(&location.0) > REACH {
                    continue;
                }
                item.holder = Some(agent);
                equipment.slot = Some(target);
                true
            }
            _ => false,
        };

        commands.entity(agent).remove::<Recovering>();
        reservations.release(agent, target);
        if picked_up {
            counters.recoveries += 1;
            lifecycle.push(Lifecycle::Equipped { agent, item: target });
        } else {
            counters.abandoned_recoveries += 1;
        }
    }
}

/// Armed colonists occasionally drop what they are holding.
#[allow(clippy::too_many_arguments)]
pub fn fumble_gear(
    mut commands: Commands,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut reservations: ResMut<Reservations>,
    mut lifecycle: ResMut<LifecycleQueue>,
    mut counters: ResMut<SimCounters>,
    mut colonists: Query<(Entity, &Colonist, &Location, &mut Equipment), Without<Recovering>>,
    mut gear: Query<(&mut Gear, &mut Location), Without<Colonist>>,
) {
    for (agent, colonist, location, mut equipment) in colonists.iter_mut() {
        let Some(item) = equipment.slot else {
            continue;
        };
        if !colonist.alive || !rng.0.gen_bool(config.hazards.fumble_chance) {
            continue;
        }
        let Ok((mut held, mut spot)) = gear.get_mut(item) else {
            continue;
        };

        held.holder = None;
        spot.0 = location.0;
        equipment.slot = None;
        counters.fumbles += 1;
        lifecycle.push(Lifecycle::Dropped { agent, item });
        tracing::debug!("{} fumbled {}", colonist.name, item_id(item));

        if rng.0.gen_bool(config.hazards.recover_chance) && reservations.claim(agent, item) {
            commands.entity(agent).insert(Recovering {
                target: item,
                since: clock.tick,
            });
        }
    }
}

/// Held gear wears, loose gear can catch fire, wrecks are cleared away.
pub fn wear_gear(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut lifecycle: ResMut<LifecycleQueue>,
    mut counters: ResMut<SimCounters>,
    mut gear: Query<(Entity, &mut Gear)>,
    mut equipment: Query<&mut Equipment>,
) {
    let hazards = &config.hazards;
    for (entity, mut item) in gear.iter_mut() {
        if item.destroyed {
            commands.entity(entity).despawn();
            continue;
        }

        if item.holder.is_some() {
            item.condition -= hazards.wear_per_tick;
        } else if item.burning {
            item.condition -= hazards.burn_rate;
            if rng.0.gen_bool(FIRE_OUT_CHANCE) {
                item.burning = false;
            }
        } else if item.container.is_none() && rng.0.gen_bool(hazards.ignite_chance) {
            item.burning = true;
            counters.fires += 1;
        }

        if item.condition > 0.0 {
            continue;
        }
        item.condition = 0.0;
        item.destroyed = true;
        item.burning = false;
        counters.destroyed += 1;

        if let Some(holder) = item.holder.take() {
            if let Ok(mut slot) = equipment.get_mut(holder) {
                if slot.slot == Some(entity) {
                    slot.slot = None;
                }
            }
            lifecycle.push(Lifecycle::Dropped {
                agent: holder,
                item: entity,
            });
        }
    }
}

/// Fresh gear turns up every `loot_interval` ticks.
pub fn scatter_loot(
    mut commands: Commands,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    catalog: Res<ArchetypeCatalog>,
    mut rng: ResMut<SimRng>,
    mut counters: ResMut<SimCounters>,
) {
    let interval = config.world.loot_interval;
    if interval == 0 || catalog.is_empty() || clock.tick % interval != 0 {
        return;
    }
    commands.spawn(random_gear(&mut rng.0, &catalog, config.world.map_size));
    counters.loot_spawned += 1;
}

/// Rebuild the spatial index of gear lying on the ground.
pub fn build_item_grid(mut grid: ResMut<ItemGrid>, gear: Query<(Entity, &Gear, &Location)>) {
    grid.clear();
    for (entity, item, location) in gear.iter() {
        if item.holder.is_none() {
            grid.insert(entity, location.0);
        }
    }
}

/// Hand the tick to the engine: lifecycle notices, due events, then one
/// evaluation per colonist. Everything it emits goes to the decision log.
pub fn run_loadout_engine(world: &mut World) {
    let notices = world.resource_mut::<LifecycleQueue>().drain();

    let mut colonists = world.query_filtered::<Entity, With<Colonist>>();
    let mut agents: Vec<Entity> = colonists.iter(world).collect();
    agents.sort_by_key(|e| e.to_bits());

    let events = world.resource_scope(|world, mut engine: Mut<LoadoutEngine>| {
        let engine = &mut engine.0;
        let mut host = EcsHost::new(world);

        // Lifecycle notices land before any due event fires
        engine.sync_clock(&host);
        for notice in notices {
            match notice {
                Lifecycle::Equipped { agent, item } => engine.on_equip(agent_id(agent), item_id(item)),
                Lifecycle::Dropped { agent, item } => engine.on_drop(agent_id(agent), item_id(item)),
            }
        }
        engine.on_tick(&mut host);
        for agent in agents {
            engine.evaluate(&mut host, agent_id(agent));
        }
        engine.drain_events()
    });

    if let Err(e) = world.resource_mut::<DecisionLogger>().log_batch(&events) {
        tracing::warn!("Failed to write decision log: {}", e);
    }
    world.resource_mut::<SimCounters>().decisions_logged += events.len() as u64;
}

/// The per-tick schedule, in order.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            update_activities,
            wander,
            recover_items,
            fumble_gear,
            wear_gear,
            scatter_loot,
            build_item_grid,
            run_loadout_engine,
        )
            .chain(),
    );
    schedule
}

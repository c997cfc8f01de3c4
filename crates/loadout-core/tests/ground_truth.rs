//! Ground-truth export, JSON round-trip and rebuild.

mod common;

use common::{engine, MockWorld};
use loadout_core::{EventKind, Quality};
use loadout_events::fixtures::sample_ground_truth;
use loadout_events::{AgentId, ArchetypeId, EngineEventKind, GroundTruth, ItemId};

/// World matching the ids used by the sample snapshot.
fn sample_world() -> MockWorld {
    let mut world = MockWorld::at(1000);
    for id in 1..=4 {
        world.add_agent(id, id as f32 * 10.0, 0.0);
    }
    world.add_item(30, "rifle", Quality::Good, 30.0, 0.0);
    world.give(AgentId(3), ItemId(30));
    world.add_item(11, "knife", Quality::Normal, 10.0, 0.0);
    world
}

#[test]
fn test_rebuild_from_sample_snapshot() {
    let world = sample_world();
    let mut engine = engine(&world);

    engine.rebuild_from_ground_truth(&world, &sample_ground_truth());

    // Agent 1 swapped at 900; post-swap runs to 1150. Agent 2 expired long ago.
    assert!(engine.is_cooling(AgentId(1)));
    assert_eq!(engine.scheduler().due_tick(EventKind::CooldownExpiry, 1), Some(1150));
    assert!(!engine.is_cooling(AgentId(2)));

    assert_eq!(engine.pinned_owner(ItemId(30)), Some(AgentId(3)));
    assert!(!engine.in_grace(ItemId(30)), "item 30 is still in agent 3's hands");
    let record = engine.pins().record(AgentId(4)).expect("archetype pin");
    assert!(record.archetypes.contains(&ArchetypeId::new("longsword")));

    assert!(engine.is_dropped(ItemId(11)));
    assert_eq!(engine.dropped().get(ItemId(11)).map(|r| r.expires_at), Some(1100));

    let events = engine.drain_events();
    assert_eq!(
        events.last().map(|e| &e.kind),
        Some(&EngineEventKind::StateRebuilt {
            cooldowns: 1,
            pins: 2,
            dropped: 1
        })
    );
    assert!(engine.scheduler().is_scheduled(EventKind::CleanupSweep, 0));
}

#[test]
fn test_rebuild_skips_stale_ids() {
    let mut world = sample_world();
    world.agents.remove(&AgentId(1));
    world.items.remove(&ItemId(30));
    let mut engine = engine(&world);

    engine.rebuild_from_ground_truth(&world, &sample_ground_truth());
    assert!(!engine.is_cooling(AgentId(1)));
    assert_eq!(engine.pinned_owner(ItemId(30)), None);
    assert!(!engine.pins().has_pin(AgentId(3)));
    assert!(engine.pins().has_pin(AgentId(4)));
}

#[test]
fn test_pinned_item_off_agent_resumes_grace() {
    let mut world = sample_world();
    world.take(AgentId(3), ItemId(30));
    let mut engine = engine(&world);

    engine.rebuild_from_ground_truth(&world, &sample_ground_truth());
    assert!(engine.in_grace(ItemId(30)));
    assert_eq!(engine.pins().grace(ItemId(30)).map(|g| g.dropped_at), Some(1000));
    assert_eq!(engine.pins().grace(ItemId(30)).map(|g| g.first_observed), Some(1000));
}

#[test]
fn test_grace_drop_tick_survives_reload() {
    let mut world = sample_world();
    let mut engine = engine(&world);
    engine.pin_item(&world, AgentId(3), ItemId(30));
    world.take(AgentId(3), ItemId(30));
    engine.on_drop(AgentId(3), ItemId(30));

    let truth = engine.export_ground_truth();
    let pin = truth.pins.iter().find(|p| p.agent == AgentId(3)).expect("pin exported");
    assert_eq!(pin.dropped_at, Some(1000));

    world.tick = 1100;
    let mut reloaded = common::engine(&world);
    reloaded.rebuild_from_ground_truth(&world, &truth);

    let grace = reloaded.pins().grace(ItemId(30)).copied().expect("grace resumed");
    assert_eq!(grace.dropped_at, 1000);
    assert_eq!(grace.first_observed, 1100);
    assert_eq!(reloaded.scheduler().due_tick(EventKind::GraceCheck, 30), Some(1160));
}

#[test]
fn test_export_import_round_trip() {
    let mut world = MockWorld::new();
    let swapper = world.add_agent(1, 0.0, 0.0);
    let searcher = world.add_agent(2, 200.0, 0.0);
    let guard = world.add_agent(3, 400.0, 0.0);
    let club = world.add_item(1, "club", Quality::Normal, 0.0, 0.0);
    world.add_item(2, "rifle", Quality::Good, 1.0, 0.0);
    let sword = world.add_item(3, "longsword", Quality::Masterwork, 400.0, 0.0);
    world.give(swapper, club);
    world.give(guard, sword);

    let mut original = engine(&world);
    assert!(original.evaluate(&mut world, swapper).is_swap());
    original.evaluate(&mut world, searcher);
    original.pin_item(&world, guard, sword);
    original.pin_archetype(&world, guard, ArchetypeId::new("longsword"));
    world.run_until(&mut original, 40);

    let truth = original.export_ground_truth();
    assert_eq!(truth.session, Some(original.session()));
    assert_eq!(truth.last_actions.len(), 2);
    assert_eq!(truth.pins.len(), 1);
    assert_eq!(truth.dropped.len(), 1);

    let json = truth.to_json().expect("serialize");
    let parsed = GroundTruth::from_json(&json).expect("parse");
    assert_eq!(parsed, truth);

    let mut restored = engine(&world);
    restored.import_ground_truth(&world, &json).expect("import");

    assert_eq!(restored.cooldowns().get(swapper), original.cooldowns().get(swapper));
    assert_eq!(restored.cooldowns().get(searcher), original.cooldowns().get(searcher));
    assert_eq!(restored.pins().record(guard), original.pins().record(guard));
    assert_eq!(
        restored.dropped().get(club).map(|r| r.expires_at),
        original.dropped().get(club).map(|r| r.expires_at)
    );
    assert_ne!(restored.session(), original.session());
}

#[test]
fn test_import_rejects_garbage() {
    let world = MockWorld::new();
    let mut engine = engine(&world);
    assert!(engine.import_ground_truth(&world, "{ not json").is_err());
}

//! Unwind pipelines: block categories, veto restoration, drop handling, and
//! leftover captures.

mod common;

use causeway::event::{ChangeBlockEvent, ChangeBlockKind, EventBus, EventListener, EventRecord};
use causeway::phase::state::TILE_ENTITY_UNLOAD;
use causeway::phase::{PhaseContext, PhaseKind, PhaseTracker};
use causeway::world::World;
use causeway_core::cause::{CauseValue, SpawnCause, SpawnType};
use causeway_core::config::{TrackerConfig, UnconsumedCapturePolicy};
use causeway_core::types::{Explosion, ItemDrop, ItemStack, WorldId};

use common::{alice, at, entity, pos, sim, sim_with, state};

struct CancelAll;

impl EventListener for CancelAll {
    fn on_change_block(&mut self, event: &mut ChangeBlockEvent) {
        event.set_cancelled(true);
    }
}

fn command() -> PhaseContext {
    PhaseContext::command(alice(), "/fill")
}

fn dirt_at(x: i32, quantity: u32) -> ItemDrop {
    ItemDrop::new(at(pos(x, 64, 0)), ItemStack::new("minecraft:dirt", quantity))
}

fn item_quantities(sim: &causeway::sim::Simulation) -> Vec<u32> {
    let mut quantities: Vec<u32> = sim
        .world()
        .entities()
        .filter_map(|e| e.item.as_ref().map(|s| s.quantity))
        .collect();
    quantities.sort_unstable();
    quantities
}

// ============================================================================
// Blocks
// ============================================================================

#[test]
fn block_events_fire_per_category_then_aggregate() {
    let mut sim = sim();
    sim.set_block(pos(0, 64, 0), state("minecraft:stone"));
    sim.set_block(pos(1, 64, 0), state("minecraft:oak_log"));

    let (_, report) = sim
        .run_phase(PhaseKind::Command, command(), |sim| {
            sim.set_block(pos(0, 64, 0), state("minecraft:air"));
            sim.set_block(pos(1, 64, 0), state("minecraft:stripped_oak_log"));
            sim.set_block(pos(2, 64, 0), state("minecraft:torch"));
        })
        .unwrap();

    let kinds: Vec<ChangeBlockKind> = sim
        .bus()
        .history()
        .iter()
        .filter_map(|r| match r {
            EventRecord::ChangeBlock { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            ChangeBlockKind::Break,
            ChangeBlockKind::Place,
            ChangeBlockKind::Modify,
            ChangeBlockKind::Post,
        ]
    );
    assert_eq!(report.block_events, 4);
    assert_eq!(report.applied, 3);
}

#[test]
fn vetoed_history_restores_original_state() {
    let mut sim = sim_with(vec![Box::new(CancelAll)]);
    let target = pos(0, 64, 0);

    let (_, report) = sim
        .run_phase(PhaseKind::Command, command(), |sim| {
            sim.set_block(target, state("minecraft:stone"));
            sim.set_block(target, state("minecraft:dirt"));
            sim.set_block(target, state("minecraft:glass"));
            assert_eq!(sim.block_at(target), state("minecraft:glass"));
        })
        .unwrap();

    assert_eq!(report.restored, 3);
    assert_eq!(report.applied, 0);
    assert!(sim.block_at(target).is_air());
    assert!(sim.world().changes().is_empty());
}

#[test]
fn rewriting_the_same_state_records_nothing() {
    let mut sim = sim();
    sim.set_block(pos(0, 64, 0), state("minecraft:stone"));

    let (_, report) = sim
        .run_phase(PhaseKind::Command, command(), |sim| {
            sim.set_block(pos(0, 64, 0), state("minecraft:stone"));
        })
        .unwrap();

    assert_eq!(report.block_events, 0);
    assert_eq!(sim.bus().counts().block, 0);
}

// ============================================================================
// Drops
// ============================================================================

#[test]
fn loose_drops_merge_per_block_under_command() {
    let mut sim = sim();

    let (_, report) = sim
        .run_phase(PhaseKind::Command, command(), |sim| {
            sim.drop_item(dirt_at(0, 1));
            sim.drop_item(dirt_at(0, 2));
            sim.drop_item(dirt_at(3, 1));
        })
        .unwrap();

    assert_eq!(report.drop_events, 1);
    assert_eq!(item_quantities(&sim), vec![1, 3]);
}

#[test]
fn explosion_keeps_drops_unmerged() {
    let mut sim = sim();
    let blast = Explosion::new(at(pos(0, 64, 0)), 2.0);

    sim.run_phase(PhaseKind::Explosion, PhaseContext::explosion(blast), |sim| {
        sim.drop_item(dirt_at(0, 1));
        sim.drop_item(dirt_at(0, 2));
    })
    .unwrap();

    assert_eq!(item_quantities(&sim), vec![1, 2]);
}

#[test]
fn killed_entity_drops_name_the_dropper() {
    let mut sim = sim();
    let zombie = sim
        .spawn_entity(entity("minecraft:zombie", pos(0, 64, 0)))
        .unwrap();
    let handle = sim.world().entity(zombie).unwrap().handle();

    let (killed, report) = sim
        .run_phase(PhaseKind::Command, PhaseContext::command(alice(), "/kill"), |sim| {
            sim.kill_entity(
                "minecraft:zombie",
                vec![
                    ItemStack::new("minecraft:rotten_flesh", 2),
                    ItemStack::new("minecraft:iron_ingot", 1),
                ],
            )
        })
        .unwrap();

    assert!(killed);
    assert_eq!(report.drop_events, 1);

    let EventRecord::DropItem { cause, entities, .. } = sim
        .bus()
        .history()
        .iter()
        .find(|r| matches!(r, EventRecord::DropItem { .. }))
        .unwrap()
    else {
        unreachable!();
    };
    assert_eq!(entities.len(), 2);
    assert_eq!(cause.named("dropper"), Some(&CauseValue::Entity(handle)));
    assert!(matches!(
        cause.spawn(),
        Some(SpawnCause::Entity {
            spawn_type: SpawnType::Dropped,
            ..
        })
    ));
    assert!(sim.world().find_entity("minecraft:zombie").is_none());
}

#[test]
fn kill_without_victim_reports_false() {
    let mut sim = sim();
    let (killed, report) = sim
        .run_phase(PhaseKind::Command, command(), |sim| {
            sim.kill_entity("minecraft:wither", vec![ItemStack::new("minecraft:nether_star", 1)])
        })
        .unwrap();
    assert!(!killed);
    assert_eq!(report.drop_events, 0);
}

#[test]
fn idle_drops_enter_world_without_events() {
    let mut sim = sim();
    sim.drop_item(dirt_at(0, 4));
    assert_eq!(sim.world().entity_count(), 1);
    assert_eq!(sim.bus().counts().drop, 0);
}

// ============================================================================
// Leftover captures
// ============================================================================

fn tracker(policy: UnconsumedCapturePolicy) -> PhaseTracker {
    PhaseTracker::new(TrackerConfig {
        unconsumed_captures: policy,
        ..TrackerConfig::default()
    })
}

fn push_unload_with_stray_entity(tracker: &mut PhaseTracker) {
    tracker
        .push_phase(
            &TILE_ENTITY_UNLOAD,
            PhaseContext::tile_entity_unload(WorldId::default(), pos(0, 64, 0)),
        )
        .unwrap();
    tracker
        .current_context_mut()
        .unwrap()
        .captures
        .entities
        .push(entity("minecraft:armor_stand", pos(0, 64, 0)));
}

#[test]
fn leftover_captures_are_drained_and_reported() {
    let mut tracker = tracker(UnconsumedCapturePolicy::DrainAndLog);
    let mut world = World::new(WorldId::default());
    let mut bus = EventBus::new();
    push_unload_with_stray_entity(&mut tracker);

    let report = tracker.pop_phase(&mut world, &mut bus).unwrap();

    let leftover = report.unconsumed.expect("leftover should be reported");
    assert_eq!(leftover.entities, 1);
    assert_eq!(world.entity_count(), 0);
    assert!(tracker.is_idle());
}

#[test]
#[should_panic(expected = "left captures behind")]
fn leftover_captures_panic_when_configured() {
    let mut tracker = tracker(UnconsumedCapturePolicy::Panic);
    let mut world = World::new(WorldId::default());
    let mut bus = EventBus::new();
    push_unload_with_stray_entity(&mut tracker);

    let _ = tracker.pop_phase(&mut world, &mut bus);
}

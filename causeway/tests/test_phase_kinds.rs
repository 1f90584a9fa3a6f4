//! End-to-end behaviour of each activity kind driven through a
//! [`Simulation`](causeway::sim::Simulation).

mod common;

use causeway::error::{PhaseError, UnwindError};
use causeway::event::{ChangeBlockEvent, EventListener, EventRecord};
use causeway::phase::{ContextPayload, PhaseContext, PhaseKind, RequiredField};
use causeway_core::cause::{CauseValue, SpawnCause, SpawnType};
use causeway_core::types::{BlockPos, EntityId, Explosion, WorldId};

use common::{alice, at, entity, pos, sim, sim_with, snapshot, state};

struct Protect(BlockPos);

impl EventListener for Protect {
    fn on_change_block(&mut self, event: &mut ChangeBlockEvent) {
        event.invalidate_at(self.0);
    }
}

fn last_spawn(history: &[EventRecord]) -> &EventRecord {
    history
        .iter()
        .rev()
        .find(|r| matches!(r, EventRecord::SpawnEntity { .. }))
        .expect("no spawn event recorded")
}

// ============================================================================
// Command
// ============================================================================

#[test]
fn command_spawn_is_rooted_at_player() {
    let mut sim = sim();
    let ctx = PhaseContext::command(alice(), "/summon minecraft:pig 0 64 0");

    let (captured, report) = sim
        .run_phase(PhaseKind::Command, ctx, |sim| {
            let id = sim.spawn_entity(entity("minecraft:pig", pos(0, 64, 0)));
            sim.set_block(pos(1, 64, 0), state("minecraft:oak_fence"));
            id.is_none()
        })
        .unwrap();

    assert!(captured, "spawn under a command must be captured");
    assert_eq!(report.spawn_events, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(sim.bus().counts().spawn, 1);
    assert_eq!(sim.block_at(pos(1, 64, 0)), state("minecraft:oak_fence"));

    let pig = sim.world().find_entity("minecraft:pig").unwrap();
    assert_eq!(pig.creator, Some(alice().id));

    let EventRecord::SpawnEntity { cause, entities, .. } = last_spawn(sim.bus().history()) else {
        unreachable!();
    };
    assert_eq!(entities.len(), 1);
    assert_eq!(cause.root(), &CauseValue::Player(alice()));
    match cause.spawn() {
        Some(SpawnCause::Entity {
            spawner,
            spawn_type,
        }) => {
            assert_eq!(spawner.id, EntityId(alice().id));
            assert_eq!(spawn_type, &SpawnType::Command);
        }
        other => panic!("expected entity spawn cause, got {other:?}"),
    }
}

#[test]
fn command_without_source_is_refused() {
    let mut sim = sim();
    let ctx = PhaseContext::new(ContextPayload::Command {
        command: "/say hi".into(),
    });

    let err = sim.begin(PhaseKind::Command, ctx).unwrap_err();

    assert!(matches!(
        err,
        PhaseError::MissingField {
            phase: PhaseKind::Command,
            field: RequiredField::Source,
            ..
        }
    ));
    assert!(err.is_refusal());
    assert!(sim.tracker().is_idle());
    assert_eq!(sim.tracker().refusals(), 1);
}

#[test]
fn context_of_another_kind_is_refused() {
    let mut sim = sim();
    let err = sim
        .begin(PhaseKind::Command, PhaseContext::plugin_task("worldedit"))
        .unwrap_err();
    assert!(matches!(
        err,
        PhaseError::ContextMismatch {
            phase: PhaseKind::Command,
            found: PhaseKind::PluginTask,
            ..
        }
    ));
    assert_eq!(sim.tracker().depth(), 0);
}

#[test]
fn internal_kinds_cannot_be_pushed() {
    let mut sim = sim();
    let err = sim
        .begin(PhaseKind::Post, PhaseContext::default())
        .unwrap_err();
    assert!(matches!(err, PhaseError::NotPushable { phase: PhaseKind::Post, .. }));
    assert!(sim.tracker().is_idle());
}

// ============================================================================
// Explosion
// ============================================================================

#[test]
fn explosion_partial_cancel_restores_only_vetoed_block() {
    let mut sim = sim_with(vec![Box::new(Protect(pos(1, 64, 0)))]);
    for x in 0..3 {
        sim.set_block(pos(x, 64, 0), state("minecraft:stone"));
    }
    let explosion = Explosion::new(at(pos(0, 64, 0)), 3.0);

    let (broken, report) = sim
        .run_phase(
            PhaseKind::Explosion,
            PhaseContext::explosion(explosion.clone()),
            |sim| sim.blast(&explosion),
        )
        .unwrap();

    assert_eq!(broken, 3);
    assert_eq!(report.applied, 2);
    assert_eq!(report.restored, 1);
    assert_eq!(report.discarded_drops, 1);
    assert_eq!(report.drop_events, 1);
    assert_eq!(sim.block_at(pos(1, 64, 0)), state("minecraft:stone"));
    assert!(sim.block_at(pos(0, 64, 0)).is_air());
    assert!(sim.block_at(pos(2, 64, 0)).is_air());

    // Two surviving blocks each dropped one stone.
    let items: Vec<_> = sim
        .world()
        .entities()
        .filter_map(|e| e.item.as_ref())
        .collect();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|s| s.item == "minecraft:stone"));
}

#[test]
fn explosion_cause_names_the_blast() {
    let mut sim = sim();
    let explosion = Explosion::new(at(pos(4, 64, 4)), 2.0);
    sim.run_phase(
        PhaseKind::Explosion,
        PhaseContext::explosion(explosion.clone()),
        |sim| {
            sim.spawn_entity(entity("minecraft:tnt", pos(4, 64, 4)));
        },
    )
    .unwrap();

    let cause = last_spawn(sim.bus().history()).cause();
    assert_eq!(cause.named("explosion"), Some(&CauseValue::Explosion(explosion)));
    assert!(matches!(
        cause.spawn(),
        Some(SpawnCause::Generic {
            spawn_type: SpawnType::Explosion
        })
    ));
}

#[test]
fn nested_explosion_at_same_spot_is_runaway() {
    let mut sim = sim();
    let blast = || PhaseContext::explosion(Explosion::new(at(pos(0, 64, 0)), 4.0));

    sim.begin(PhaseKind::Explosion, blast()).unwrap();
    let err = sim.begin(PhaseKind::Explosion, blast()).unwrap_err();
    assert!(matches!(
        err,
        PhaseError::Runaway {
            phase: PhaseKind::Explosion,
            depth: 1,
            ..
        }
    ));
    assert_eq!(sim.tracker().depth(), 1);

    // A different spot is a legitimate chain reaction.
    sim.begin(
        PhaseKind::Explosion,
        PhaseContext::explosion(Explosion::new(at(pos(8, 64, 0)), 4.0)),
    )
    .unwrap();
    assert_eq!(sim.tracker().depth(), 2);
    sim.end().unwrap();
    sim.end().unwrap();
    assert!(sim.tracker().is_idle());
}

// ============================================================================
// Nesting
// ============================================================================

#[test]
fn nested_spawns_coalesce_into_outermost_event() {
    let mut sim = sim();
    let ctx = PhaseContext::command(alice(), "/explode");

    let (inner, outer) = sim
        .run_phase(PhaseKind::Command, ctx, |sim| {
            sim.spawn_entity(entity("minecraft:cow", pos(0, 64, 0)));
            let (_, inner) = sim
                .run_phase(
                    PhaseKind::Explosion,
                    PhaseContext::explosion(Explosion::new(at(pos(5, 64, 5)), 2.0)),
                    |sim| {
                        sim.spawn_entity(entity("minecraft:pig", pos(5, 64, 5)));
                        sim.spawn_entity(entity("minecraft:pig", pos(6, 64, 5)));
                    },
                )
                .unwrap();
            inner
        })
        .unwrap();

    assert_eq!(inner.spawn_events, 0);
    assert_eq!(inner.handed_up, 2);
    assert_eq!(outer.spawn_events, 1);
    assert_eq!(outer.spawned, 3);
    assert_eq!(sim.bus().counts().spawn, 1);
    assert_eq!(sim.world().entity_count(), 3);
    assert!(sim.world().entities().all(|e| e.creator == Some(alice().id)));
}

#[test]
fn command_may_not_nest_inside_block_tick() {
    let mut sim = sim();
    sim.begin(
        PhaseKind::BlockTick,
        PhaseContext::block_tick(snapshot(pos(0, 64, 0), "minecraft:observer")),
    )
    .unwrap();

    let err = sim
        .begin(PhaseKind::Command, PhaseContext::command(alice(), "/tp"))
        .unwrap_err();
    assert!(matches!(
        err,
        PhaseError::IllegalTransition {
            from: PhaseKind::BlockTick,
            to: PhaseKind::Command,
            ..
        }
    ));
    assert_eq!(err.diagnostic().depth(), 1);
    sim.end().unwrap();
}

// ============================================================================
// Block tick
// ============================================================================

#[test]
fn block_tick_spawn_is_rooted_at_block() {
    let mut sim = sim();
    let dispenser = snapshot(pos(2, 64, 2), "minecraft:dispenser");

    sim.run_phase(
        PhaseKind::BlockTick,
        PhaseContext::block_tick(dispenser.clone()),
        |sim| {
            sim.spawn_entity(entity("minecraft:arrow", pos(3, 64, 2)));
        },
    )
    .unwrap();

    let cause = last_spawn(sim.bus().history()).cause();
    assert_eq!(cause.root(), &CauseValue::Block(dispenser.clone()));
    assert_eq!(
        cause.spawn(),
        Some(&SpawnCause::Block {
            block: dispenser,
            spawn_type: SpawnType::Placement,
        })
    );
    let arrow = sim.world().find_entity("minecraft:arrow").unwrap();
    assert_eq!(arrow.creator, None);
}

// ============================================================================
// Plugin task
// ============================================================================

#[test]
fn plugin_spawn_without_source_fails_unwind() {
    let mut sim = sim();

    sim.begin(PhaseKind::PluginTask, PhaseContext::plugin_task("mobarena"))
        .unwrap();
    sim.spawn_entity(entity("minecraft:zombie", pos(0, 64, 0)));
    let err = sim.end().unwrap_err();

    assert!(!err.is_refusal());
    match err {
        PhaseError::Unwind {
            phase: PhaseKind::PluginTask,
            source:
                UnwindError::MissingAttribution {
                    field: RequiredField::Source,
                    ..
                },
            ..
        } => {}
        other => panic!("expected missing attribution, got {other:?}"),
    }
    assert!(sim.tracker().is_idle());
    assert_eq!(sim.world().entity_count(), 0);
    assert_eq!(sim.bus().counts().spawn, 0);
}

#[test]
fn plugin_acting_for_player_spawns() {
    let mut sim = sim();
    let ctx = PhaseContext::plugin_task("mobarena").with_source(CauseValue::Player(alice()));

    let (_, report) = sim
        .run_phase(PhaseKind::PluginTask, ctx, |sim| {
            sim.spawn_entity(entity("minecraft:zombie", pos(0, 64, 0)));
        })
        .unwrap();

    assert_eq!(report.spawn_events, 1);
    let cause = last_spawn(sim.bus().history()).cause();
    assert_eq!(cause.named("plugin"), Some(&CauseValue::Plugin("mobarena".into())));
    assert_eq!(cause.spawn().map(SpawnCause::spawn_type), Some(&SpawnType::Plugin));
    let zombie = sim.world().find_entity("minecraft:zombie").unwrap();
    assert_eq!(zombie.creator, Some(alice().id));
}

#[test]
fn plugin_block_changes_fire_as_they_happen() {
    let mut sim = sim();

    let (seen, report) = sim
        .run_phase(
            PhaseKind::PluginTask,
            PhaseContext::plugin_task("worldedit"),
            |sim| {
                sim.set_block(pos(0, 64, 0), state("minecraft:glass"));
                (sim.bus().counts().block, sim.world().changes().len())
            },
        )
        .unwrap();

    // One Place event and the aggregate, committed before the task ends.
    assert_eq!(seen, (2, 1));
    assert_eq!(report.block_events, 0);
}

// ============================================================================
// Tile entity unload
// ============================================================================

#[test]
fn tile_entity_unload_applies_immediately_and_refuses_nesting() {
    let mut sim = sim();
    let tile = pos(0, 64, 0);

    sim.begin(
        PhaseKind::TileEntityUnload,
        PhaseContext::tile_entity_unload(WorldId::default(), tile),
    )
    .unwrap();

    let spawned = sim.spawn_entity(entity("minecraft:item_frame", tile));
    sim.set_block(tile.offset(0, 1, 0), state("minecraft:torch"));
    assert!(spawned.is_some());
    assert_eq!(sim.world().changes().len(), 1);

    let err = sim
        .begin(
            PhaseKind::BlockTick,
            PhaseContext::block_tick(snapshot(tile, "minecraft:hopper")),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PhaseError::IllegalTransition {
            from: PhaseKind::TileEntityUnload,
            ..
        }
    ));
    assert_eq!(sim.tracker().depth(), 1);

    let report = sim.end().unwrap();
    assert_eq!(report.spawn_events, 0);
    assert!(report.unconsumed.is_none());
}

#[test]
fn pop_on_empty_stack_is_not_a_refusal() {
    let mut sim = sim();
    let err = sim.end().unwrap_err();
    assert!(matches!(err, PhaseError::EmptyStack { .. }));
    assert!(!err.is_refusal());
}

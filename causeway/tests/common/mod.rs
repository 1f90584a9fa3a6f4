//! Shared integration-test helpers: simulation builders, fixture scenarios,
//! and a wrapper for spawning the `causeway` binary.

#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Output};

use causeway::event::EventListener;
use causeway::sim::Simulation;
use causeway::world::World;
use causeway_core::config::{TrackerConfig, UnconsumedCapturePolicy};
use causeway_core::types::{
    BlockPos, BlockSnapshot, BlockState, Entity, EntityKind, Location, PlayerRef, WorldId,
};
use tempfile::NamedTempFile;

/// Tracker settings used by most tests: leftovers are fatal.
pub fn strict_config() -> TrackerConfig {
    TrackerConfig {
        unconsumed_captures: UnconsumedCapturePolicy::Panic,
        ..TrackerConfig::default()
    }
}

/// An empty simulation over the default world.
pub fn sim() -> Simulation {
    Simulation::new(strict_config(), World::new(WorldId::default()))
}

/// A simulation whose listeners are registered in order.
pub fn sim_with(listeners: Vec<Box<dyn EventListener>>) -> Simulation {
    let mut sim = sim();
    for listener in listeners {
        sim.register_listener(listener);
    }
    sim
}

pub fn alice() -> PlayerRef {
    PlayerRef::named("alice")
}

pub const fn pos(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

pub fn at(pos: BlockPos) -> Location {
    Location::at_block(WorldId::default(), pos)
}

pub fn state(id: &str) -> BlockState {
    BlockState::new(id)
}

pub fn snapshot(pos: BlockPos, id: &str) -> BlockSnapshot {
    BlockSnapshot::new(WorldId::default(), pos, state(id))
}

pub fn entity(kind: &str, pos: BlockPos) -> Entity {
    Entity::new(EntityKind::new(kind), at(pos))
}

/// Writes `yaml` to a temporary `.yaml` file that lives as long as the handle.
pub fn scenario_file(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("failed to create temp scenario");
    file.write_all(yaml.as_bytes())
        .expect("failed to write temp scenario");
    file
}

/// Runs the `causeway` binary with `args` and waits for it.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_causeway"))
        .args(args)
        .env_remove("CAUSEWAY_SCENARIO")
        .env_remove("CAUSEWAY_EVENTS_FILE")
        .env_remove("CAUSEWAY_RUNAWAY_POLICY")
        .env_remove("CAUSEWAY_UNCONSUMED_CAPTURES")
        .env_remove("CAUSEWAY_LOG_LEVEL")
        .env_remove("CAUSEWAY_LOG_FORMAT")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to spawn causeway")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

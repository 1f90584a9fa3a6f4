//! Scenario files driven through the loader, the runner, and the journal.

use std::io::BufRead;

use causeway::config::ConfigLoader;
use causeway::observability::EventEmitter;
use causeway::runner::{RunSummary, ScenarioRunner};
use causeway::scenarios::find_scenario;
use serde_json::Value;

fn run_yaml(yaml: &str) -> RunSummary {
    let loaded = ConfigLoader::with_defaults().load_from_str(yaml).unwrap();
    ScenarioRunner::new(loaded.config).run()
}

fn read_journal(path: &std::path::Path) -> Vec<Value> {
    let file = std::fs::File::open(path).unwrap();
    std::io::BufReader::new(file)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect()
}

#[test]
fn journal_brackets_run_and_records_refusal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let builtin = find_scenario("runaway-explosion").unwrap();
    let config = ConfigLoader::with_defaults()
        .load_from_str(builtin.yaml)
        .unwrap()
        .config;

    let summary = {
        let mut runner =
            ScenarioRunner::new(config).with_journal(EventEmitter::from_file(&path).unwrap());
        runner.run()
    };
    assert!(summary.passed, "unmet: {:?}", summary.unmet);

    let events = read_journal(&path);
    assert!(events.len() >= 3, "expected several events, got {events:?}");
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], u64::try_from(i).unwrap());
        assert!(event["type"].is_string());
    }
    assert_eq!(events[0]["type"], "ScenarioStarted");
    assert_eq!(events[0]["scenario"], "runaway-explosion");

    let last = events.last().unwrap();
    assert_eq!(last["type"], "ScenarioFinished");
    assert_eq!(last["passed"], true);

    let refusals: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "PhaseRefused")
        .collect();
    assert_eq!(refusals.len(), 1);
    assert_eq!(refusals[0]["reason"], "runaway");
}

#[test]
fn plugin_task_without_acting_for_discards_spawns() {
    let summary = run_yaml(
        r"
name: orphan-plugin
steps:
  - type: plugin_task
    plugin: mobarena
    steps:
      - type: spawn_entity
        kind: minecraft:zombie
        pos: { x: 0, y: 64, z: 0 }
expect:
  entities: 0
  spawn_events: 0
",
    );

    assert!(summary.passed, "unmet: {:?}", summary.unmet);
    assert_eq!(summary.unwind_failures, 1);
    assert_eq!(summary.refused, 0);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].reason, "unwind");
}

#[test]
fn plugin_task_acting_for_player_spawns() {
    let summary = run_yaml(
        r"
name: attributed-plugin
steps:
  - type: plugin_task
    plugin: mobarena
    acting_for: alice
    steps:
      - type: spawn_entity
        kind: minecraft:zombie
        pos: { x: 0, y: 64, z: 0 }
        count: 3
expect:
  entities: 3
  spawn_events: 1
",
    );

    assert!(summary.passed, "unmet: {:?}", summary.unmet);
    assert_eq!(summary.unwind_failures, 0);
    assert_eq!(summary.spawned, 3);
}

#[test]
fn unmet_expectations_are_listed() {
    let summary = run_yaml(
        r#"
name: wrong-guess
steps:
  - type: command
    source: alice
    command: /setblock 0 64 0 minecraft:stone
    steps:
      - type: set_block
        pos: { x: 0, y: 64, z: 0 }
        state: minecraft:stone
expect:
  blocks:
    - { pos: { x: 0, y: 64, z: 0 }, state: "minecraft:dirt" }
  spawn_events: 2
"#,
    );

    assert!(!summary.passed);
    assert_eq!(summary.unmet.len(), 2);
    assert_eq!(summary.applied, 1);
}

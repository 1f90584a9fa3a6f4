//! Scenario runner
//!
//! Drives a [`ScenarioConfig`] through a [`Simulation`]: seeds the world,
//! registers scripted listeners, executes the step tree (each activity step
//! becomes a push, its children, and a pop), and finally checks the
//! scenario's expectations against the resulting world and event counts.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use causeway_core::config::{Expectations, ListenerRule, ScenarioConfig, Step};
use causeway_core::CauseValue;
use causeway_core::types::{
    BlockState, Entity, EntityId, EntityKind, EntityRef, Explosion, ItemDrop, ItemStack, Location,
    PlayerRef,
};

use crate::error::PhaseError;
use crate::event::{
    ChangeBlockEvent, ChangeBlockKind, DropItemEvent, EventCounts, EventListener, SpawnEntityEvent,
};
use crate::observability::events::{EventEmitter, JournalEvent};
use crate::observability::metrics;
use crate::phase::{PhaseContext, PhaseDiagnostic, PhaseKind, PopReport};
use crate::sim::Simulation;
use crate::world::World;

// ============================================================================
// Scripted listeners
// ============================================================================

/// Event listener built from a [`ListenerRule`].
#[derive(Debug, Clone)]
pub struct ScriptedListener {
    rule: ListenerRule,
    name: String,
}

impl ScriptedListener {
    /// Creates a listener enforcing `rule`.
    #[must_use]
    pub fn new(rule: ListenerRule) -> Self {
        let name = match &rule {
            ListenerRule::CancelBlockChanges { category } => format!("cancel-{category}"),
            ListenerRule::CancelPost => "cancel-post".to_owned(),
            ListenerRule::InvalidatePosition { pos } => format!("invalidate-{pos}"),
            ListenerRule::CancelSpawns { kind: Some(kind) } => format!("cancel-spawns-{kind}"),
            ListenerRule::CancelSpawns { kind: None } => "cancel-spawns".to_owned(),
            ListenerRule::CancelDrops => "cancel-drops".to_owned(),
        };
        Self { rule, name }
    }
}

impl EventListener for ScriptedListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_change_block(&mut self, event: &mut ChangeBlockEvent) {
        match &self.rule {
            ListenerRule::CancelBlockChanges { category } => {
                if event.kind() == ChangeBlockKind::from(*category) {
                    event.set_cancelled(true);
                }
            }
            ListenerRule::CancelPost => {
                if event.kind() == ChangeBlockKind::Post {
                    event.set_cancelled(true);
                }
            }
            ListenerRule::InvalidatePosition { pos } => {
                event.invalidate_at(*pos);
            }
            ListenerRule::CancelSpawns { .. } | ListenerRule::CancelDrops => {}
        }
    }

    fn on_spawn_entity(&mut self, event: &mut SpawnEntityEvent) {
        match &self.rule {
            ListenerRule::CancelSpawns { kind: None } => event.set_cancelled(true),
            ListenerRule::CancelSpawns { kind: Some(kind) } => {
                event.retain(|e| e.kind.0 != *kind);
            }
            _ => {}
        }
    }

    fn on_drop_item(&mut self, event: &mut DropItemEvent) {
        if self.rule == ListenerRule::CancelDrops {
            event.set_cancelled(true);
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// A refused push or failed unwind seen during a run.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseFailure {
    /// Step path, e.g. `steps[0].steps[1]`.
    pub step: String,
    /// Machine-friendly reason.
    pub reason: &'static str,
    /// Error message.
    pub message: String,
    /// Stack at the time of the failure.
    pub diagnostic: PhaseDiagnostic,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Whether every expectation held.
    pub passed: bool,
    /// Phases pushed and popped successfully.
    pub phases: usize,
    /// Pushes the tracker refused.
    pub refused: usize,
    /// Pops whose unwind failed.
    pub unwind_failures: usize,
    /// Events posted, by family.
    pub events: EventCounts,
    /// Transactions committed during unwinds.
    pub applied: usize,
    /// Transactions restored after vetoes.
    pub restored: usize,
    /// Entities and items spawned by unwinds.
    pub spawned: usize,
    /// Drops discarded with restored blocks.
    pub discarded_drops: usize,
    /// Pops that found captures left behind.
    pub unconsumed: usize,
    /// Entities in the world at the end.
    pub entities: usize,
    /// Refusals and unwind failures, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PhaseFailure>,
    /// Unmet expectations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<String>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    fn record_pop(&mut self, report: &PopReport) {
        self.phases += 1;
        self.applied += report.applied;
        self.restored += report.restored;
        self.spawned += report.spawned;
        self.discarded_drops += report.discarded_drops;
        if report.unconsumed.is_some() {
            self.unconsumed += 1;
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Executes one scenario.
#[derive(Debug)]
pub struct ScenarioRunner {
    config: ScenarioConfig,
    sim: Simulation,
    journal: Option<EventEmitter>,
    summary: RunSummary,
}

impl ScenarioRunner {
    /// Seeds a simulation from `config` and registers its listeners.
    #[must_use]
    pub fn new(config: ScenarioConfig) -> Self {
        let mut sim = Simulation::new(config.tracker, World::from_seed(&config.world));
        for rule in &config.listeners {
            sim.register_listener(Box::new(ScriptedListener::new(rule.clone())));
        }
        let summary = RunSummary {
            scenario: config.name.clone(),
            ..RunSummary::default()
        };
        Self {
            config,
            sim,
            journal: None,
            summary,
        }
    }

    /// Writes journal events to `emitter` while running.
    #[must_use]
    pub fn with_journal(mut self, emitter: EventEmitter) -> Self {
        self.journal = Some(emitter);
        self
    }

    /// The simulation, for inspection after a run.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Runs every step and evaluates the expectations.
    ///
    /// Refused pushes and failed unwinds do not stop the run; they are
    /// recorded in the summary and the offending step's children are
    /// skipped.
    pub fn run(&mut self) -> RunSummary {
        let started = Instant::now();
        tracing::info!(
            scenario = %self.config.name,
            steps = self.config.steps.len(),
            "scenario started"
        );
        self.journal(JournalEvent::ScenarioStarted {
            timestamp: Utc::now(),
            scenario: self.config.name.clone(),
            steps: self.config.steps.len(),
        });

        let steps = std::mem::take(&mut self.config.steps);
        for (i, step) in steps.iter().enumerate() {
            self.execute(step, &format!("steps[{i}]"));
        }
        self.config.steps = steps;

        self.summary.refused = self.sim.tracker().refusals();
        self.summary.events = self.sim.bus().counts();
        self.summary.entities = self.sim.world().entity_count();
        self.summary.unmet = self
            .config
            .expect
            .as_ref()
            .map(|expect| check_expectations(expect, &self.sim))
            .unwrap_or_default();
        self.summary.passed = self.summary.unmet.is_empty();
        self.summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        metrics::record_scenario(self.summary.passed);
        self.journal(JournalEvent::ScenarioFinished {
            timestamp: Utc::now(),
            scenario: self.config.name.clone(),
            passed: self.summary.passed,
            duration_ms: self.summary.duration_ms,
        });
        tracing::info!(
            scenario = %self.config.name,
            passed = self.summary.passed,
            phases = self.summary.phases,
            refused = self.summary.refused,
            "scenario finished"
        );
        self.summary.clone()
    }

    fn execute(&mut self, step: &Step, path: &str) {
        let world = self.sim.world().id().clone();
        match step {
            Step::Command {
                source, command, ..
            } => {
                let ctx = PhaseContext::command(PlayerRef::named(source), command);
                self.activity(PhaseKind::Command, ctx, step, path, |_| {});
            }
            Step::Explosion {
                at,
                world: blast_world,
                dimension,
                radius,
                detonator,
                ..
            } => {
                let mut location = Location::at_block(blast_world.clone().unwrap_or(world), *at);
                location.dimension = *dimension;
                let mut explosion = Explosion::new(location, *radius);
                if let Some(kind) = detonator {
                    explosion = explosion.with_source(self.detonator(kind));
                }
                let ctx = PhaseContext::explosion(explosion.clone());
                self.activity(PhaseKind::Explosion, ctx, step, path, |sim| {
                    sim.blast(&explosion);
                });
            }
            Step::BlockTick { pos, .. } => {
                let ctx = PhaseContext::block_tick(self.sim.world().snapshot(&world, *pos));
                self.activity(PhaseKind::BlockTick, ctx, step, path, |_| {});
            }
            Step::PluginTask {
                plugin, acting_for, ..
            } => {
                let mut ctx = PhaseContext::plugin_task(plugin);
                if let Some(player) = acting_for {
                    ctx = ctx.with_source(CauseValue::Player(PlayerRef::named(player)));
                }
                self.activity(PhaseKind::PluginTask, ctx, step, path, |_| {});
            }
            Step::TileEntityUnload { pos, .. } => {
                let ctx = PhaseContext::tile_entity_unload(world, *pos);
                self.activity(PhaseKind::TileEntityUnload, ctx, step, path, |_| {});
            }
            Step::SetBlock { pos, state } => {
                self.sim.set_block(*pos, BlockState::new(state.clone()));
            }
            Step::SpawnEntity { kind, pos, count } => {
                for _ in 0..*count {
                    let entity = Entity::new(
                        EntityKind::new(kind.clone()),
                        Location::at_block(world.clone(), *pos),
                    );
                    self.sim.spawn_entity(entity);
                }
            }
            Step::DropItem {
                pos,
                item,
                quantity,
            } => {
                let drop = ItemDrop::new(
                    Location::at_block(world, *pos),
                    ItemStack::new(item.clone(), *quantity),
                );
                self.sim.drop_item_at_block(*pos, drop);
            }
            Step::KillEntity { kind, drops } => {
                let loot = drops
                    .iter()
                    .map(|d| ItemStack::new(d.item.clone(), d.quantity))
                    .collect();
                if !self.sim.kill_entity(kind, loot) {
                    tracing::warn!(step = path, kind = %kind, "no entity to kill");
                }
            }
        }
    }

    /// Pushes `ctx`, runs `setup` and the step's children, then pops.
    fn activity(
        &mut self,
        kind: PhaseKind,
        ctx: PhaseContext,
        step: &Step,
        path: &str,
        setup: impl FnOnce(&mut Simulation),
    ) {
        if let Err(error) = self.sim.begin(kind, ctx) {
            self.record_failure(kind, path, &error);
            return;
        }
        setup(&mut self.sim);
        for (i, child) in step.children().iter().enumerate() {
            self.execute(child, &format!("{path}.steps[{i}]"));
        }
        match self.sim.end() {
            Ok(report) => self.record_pop(&report),
            Err(error) => self.record_failure(kind, path, &error),
        }
    }

    /// Entity handle for a detonator: a live entity of `kind`, or a fresh
    /// handle when the world has none.
    fn detonator(&self, kind: &str) -> EntityRef {
        self.sim.world().find_entity(kind).map_or_else(
            || EntityRef {
                id: EntityId::random(),
                kind: EntityKind::new(kind),
            },
            Entity::handle,
        )
    }

    fn record_pop(&mut self, report: &PopReport) {
        self.summary.record_pop(report);
        let timestamp = Utc::now();
        if report.applied + report.restored > 0 {
            self.journal(JournalEvent::BlocksChanged {
                timestamp,
                phase: report.phase,
                applied: report.applied,
                restored: report.restored,
            });
        }
        if report.spawn_events + report.handed_up > 0 {
            self.journal(JournalEvent::EntitiesSpawned {
                timestamp,
                phase: report.phase,
                events: report.spawn_events,
                spawned: report.spawned,
                handed_up: report.handed_up,
            });
        }
        if report.drop_events + report.discarded_drops > 0 {
            self.journal(JournalEvent::ItemsDropped {
                timestamp,
                phase: report.phase,
                events: report.drop_events,
                discarded: report.discarded_drops,
            });
        }
    }

    fn record_failure(&mut self, kind: PhaseKind, path: &str, error: &PhaseError) {
        if !error.is_refusal() {
            self.summary.unwind_failures += 1;
        }
        self.journal(JournalEvent::PhaseRefused {
            timestamp: Utc::now(),
            phase: kind,
            reason: error.reason().to_owned(),
            message: error.to_string(),
        });
        self.summary.failures.push(PhaseFailure {
            step: path.to_owned(),
            reason: error.reason(),
            message: error.to_string(),
            diagnostic: error.diagnostic().clone(),
        });
    }

    fn journal(&self, event: JournalEvent) {
        if let Some(journal) = &self.journal {
            journal.emit(event);
        }
    }
}

// ============================================================================
// Expectations
// ============================================================================

/// Returns one line per expectation `sim` does not meet.
#[must_use]
pub fn check_expectations(expect: &Expectations, sim: &Simulation) -> Vec<String> {
    let mut unmet = Vec::new();
    for block in &expect.blocks {
        let found = sim.block_at(block.pos);
        if found.0 != block.state {
            unmet.push(format!(
                "block at {}: expected {}, found {found}",
                block.pos, block.state
            ));
        }
    }

    let counts = sim.bus().counts();
    let checks = [
        ("spawn events", expect.spawn_events, counts.spawn),
        ("drop events", expect.drop_events, counts.drop),
        ("entities", expect.entities, sim.world().entity_count()),
        ("refused phases", expect.refused_phases, sim.tracker().refusals()),
    ];
    for (label, expected, found) in checks {
        match expected {
            Some(expected) if expected != found => {
                unmet.push(format!("{label}: expected {expected}, found {found}"));
            }
            _ => {}
        }
    }
    unmet
}

//! Phase tracker
//!
//! The [`PhaseTracker`] owns the activation stack. It is the only thing that
//! pushes, pops, or peeks frames.
//!
//! # Threading
//!
//! A tracker serves exactly one tick thread. It is neither `Send` nor `Sync`,
//! so the compiler rejects any attempt to touch it from elsewhere; callers
//! construct it explicitly and thread it through their tick entry point.

use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Instant;

use serde::Serialize;

use causeway_core::cause::Cause;
use causeway_core::config::{TrackerConfig, UnconsumedCapturePolicy};

use crate::error::{PhaseError, UnwindError};
use crate::event::EventBus;
use crate::observability::metrics;
use crate::world::World;

use super::capture::CaptureCounts;
use super::context::{ContextPayload, PhaseContext};
use super::diagnostics::{FrameSnapshot, PhaseDiagnostic};
use super::pipeline::UnwindScope;
use super::state::{self, IDLE, POST, PhaseKind, PhaseState};
use super::transaction::TransactionBatch;

/// Upper bound on pooled contexts kept for reuse.
const POOL_LIMIT: usize = 16;

/// One stack entry.
#[derive(Debug)]
pub struct Frame {
    state: &'static dyn PhaseState,
    context: PhaseContext,
}

impl Frame {
    /// The frame's state.
    #[must_use]
    pub fn state(&self) -> &'static dyn PhaseState {
        self.state
    }

    /// The frame's context.
    #[must_use]
    pub const fn context(&self) -> &PhaseContext {
        &self.context
    }
}

/// What one pop did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopReport {
    /// Kind of the popped phase.
    pub phase: PhaseKind,
    /// Stack depth before the pop.
    pub depth: usize,
    /// Block change events posted.
    pub block_events: usize,
    /// Spawn events posted.
    pub spawn_events: usize,
    /// Drop events posted.
    pub drop_events: usize,
    /// Entities and items that entered the world.
    pub spawned: usize,
    /// Transactions committed.
    pub applied: usize,
    /// Transactions restored.
    pub restored: usize,
    /// Drops thrown away with restored blocks.
    pub discarded_drops: usize,
    /// Entities and items handed to the enclosing frame.
    pub handed_up: usize,
    /// Captures left behind by the unwind and force-drained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unconsumed: Option<CaptureCounts>,
}

impl PopReport {
    fn new(phase: PhaseKind, depth: usize) -> Self {
        Self {
            phase,
            depth,
            ..Self::default()
        }
    }
}

/// Sole owner of the phase stack.
#[derive(Debug)]
pub struct PhaseTracker {
    stack: Vec<Frame>,
    pool: Vec<PhaseContext>,
    config: TrackerConfig,
    refusals: usize,
    _single_thread: PhantomData<Rc<()>>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl PhaseTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub const fn new(config: TrackerConfig) -> Self {
        Self {
            stack: Vec::new(),
            pool: Vec::new(),
            config,
            refusals: 0,
            _single_thread: PhantomData,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether nothing is being tracked.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    /// State of the top frame, or idle.
    #[must_use]
    pub fn current_state(&self) -> &'static dyn PhaseState {
        self.stack.last().map_or(&IDLE as &dyn PhaseState, |f| f.state)
    }

    /// Kind of the top frame, or idle.
    #[must_use]
    pub fn current_kind(&self) -> PhaseKind {
        self.current_state().kind()
    }

    /// Context of the top frame.
    #[must_use]
    pub fn current_context(&self) -> Option<&PhaseContext> {
        self.stack.last().map(|f| &f.context)
    }

    /// Mutable context of the top frame, for registering captures.
    pub fn current_context_mut(&mut self) -> Option<&mut PhaseContext> {
        self.stack.last_mut().map(|f| &mut f.context)
    }

    /// Top frame's state and mutable context together.
    pub fn current_mut(&mut self) -> Option<(&'static dyn PhaseState, &mut PhaseContext)> {
        self.stack.last_mut().map(|f| (f.state, &mut f.context))
    }

    /// Frames, bottom first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.stack
    }

    /// Pushes refused since construction.
    #[must_use]
    pub const fn refusals(&self) -> usize {
        self.refusals
    }

    /// Snapshots the stack.
    #[must_use]
    pub fn diagnostic(&self, message: impl Into<String>) -> PhaseDiagnostic {
        let frames = self
            .stack
            .iter()
            .enumerate()
            .map(|(i, f)| FrameSnapshot::capture(i + 1, f.state.kind(), &f.context))
            .collect();
        PhaseDiagnostic::new(message, frames)
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Pushes a new frame.
    ///
    /// The context must already carry every field the state requires.
    ///
    /// # Errors
    ///
    /// Refuses the push, leaving the stack untouched, when the kind is not
    /// pushable, the context belongs to another kind, a required field is
    /// missing, the current state does not allow the transition, or the
    /// context repeats one already on the stack.
    pub fn push_phase(
        &mut self,
        state: &'static dyn PhaseState,
        context: PhaseContext,
    ) -> Result<(), PhaseError> {
        let kind = state.kind();
        if let Err(error) = self.check_push(state, &context) {
            self.refuse(&error);
            return Err(error);
        }

        self.stack.push(Frame { state, context });
        metrics::record_phase_push(kind);
        metrics::set_stack_depth(self.stack.len());
        tracing::debug!(phase = %kind, depth = self.stack.len(), "phase pushed");
        Ok(())
    }

    fn check_push(&self, state: &'static dyn PhaseState, context: &PhaseContext) -> Result<(), PhaseError> {
        let kind = state.kind();
        let requested = |message: String| {
            Box::new(
                self.diagnostic(message)
                    .with_requested(kind)
                    .with_subject(FrameSnapshot::capture(self.stack.len() + 1, kind, context)),
            )
        };

        if !kind.is_pushable() {
            return Err(PhaseError::NotPushable {
                phase: kind,
                diagnostic: requested(format!("{kind} cannot be pushed")),
            });
        }

        let found = context.payload().kind();
        if found != kind {
            return Err(PhaseError::ContextMismatch {
                phase: kind,
                found,
                diagnostic: requested(format!("{found} context pushed as {kind}")),
            });
        }

        if let Some(field) = state
            .required_fields()
            .iter()
            .copied()
            .find(|field| !context.has(*field))
        {
            return Err(PhaseError::MissingField {
                phase: kind,
                field,
                diagnostic: requested(format!("{kind} pushed without a {field}")),
            });
        }

        let current = self.current_state();
        if !current.can_switch_to(kind) {
            return Err(PhaseError::IllegalTransition {
                from: current.kind(),
                to: kind,
                diagnostic: requested(format!("{} cannot switch to {kind}", current.kind())),
            });
        }

        let policy = self.config.runaway;
        if let Some(existing) = self
            .stack
            .iter()
            .position(|f| f.state.kind() == kind && context.is_runaway(&f.context, policy))
        {
            return Err(PhaseError::Runaway {
                phase: kind,
                depth: existing + 1,
                diagnostic: requested(format!(
                    "{kind} repeats the frame at depth {}",
                    existing + 1
                )),
            });
        }

        Ok(())
    }

    fn refuse(&mut self, error: &PhaseError) {
        self.refusals += 1;
        metrics::record_refusal(error.reason());
        let diagnostic = error.diagnostic();
        if matches!(error, PhaseError::Runaway { .. }) {
            tracing::warn!(
                reason = error.reason(),
                depth = diagnostic.depth(),
                diagnostic = ?diagnostic,
                "runaway phase refused: {error}"
            );
        } else {
            tracing::error!(
                reason = error.reason(),
                depth = diagnostic.depth(),
                diagnostic = ?diagnostic,
                "phase push refused: {error}"
            );
        }
    }

    // ========================================================================
    // Pop
    // ========================================================================

    /// Pops the top frame and unwinds it.
    ///
    /// Deferred entities and drops are collected in a Post frame while the
    /// phase unwinds, then handed to the frame below or flushed.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::EmptyStack`] when nothing is tracked, and
    /// [`PhaseError::Unwind`] when the phase's captures could not be
    /// attributed. In the latter case the frame is still popped and its
    /// captures are discarded, with tentative block writes restored.
    ///
    /// # Panics
    ///
    /// Panics when the unwind leaves captures behind and the tracker is
    /// configured with [`UnconsumedCapturePolicy::Panic`].
    pub fn pop_phase(&mut self, world: &mut World, bus: &mut EventBus) -> Result<PopReport, PhaseError> {
        let depth = self.stack.len();
        let Some(Frame { state, mut context }) = self.stack.pop() else {
            let diagnostic = Box::new(self.diagnostic("pop on an empty phase stack"));
            tracing::error!(diagnostic = ?diagnostic, "phase pop refused");
            return Err(PhaseError::EmptyStack { diagnostic });
        };
        let kind = state.kind();
        let started = Instant::now();
        metrics::set_stack_depth(self.stack.len());

        let mut report = PopReport::new(kind, depth);
        let (outcome, mut post) = match state.build_cause(&context) {
            Ok(cause) => self.unwind(state, &mut context, cause, world, bus, &mut report),
            Err(error) => (Err(error), None),
        };

        if let Err(source) = outcome {
            return Err(self.discard(state, context, post, source, world, depth));
        }

        if let Some(post) = post.as_mut() {
            let enclosing = self.stack.last_mut().map(|f| (f.state, &mut f.context));
            state::post_dispatch(post, enclosing, world, bus, &mut report);
        }

        let mut leftover = context.captures.counts();
        if let Some(post) = &post {
            leftover = add_counts(leftover, post.captures.counts());
        }
        if !leftover.is_zero() {
            self.unconsumed(kind, depth, &mut context, post.as_mut(), leftover, world);
            report.unconsumed = Some(leftover);
        }

        tracing::debug!(
            phase = %kind,
            depth = self.stack.len(),
            block_events = report.block_events,
            spawn_events = report.spawn_events,
            drop_events = report.drop_events,
            "phase popped"
        );
        metrics::record_unwind_duration(kind, started.elapsed());

        self.recycle(context);
        if let Some(post) = post {
            self.recycle(post);
        }
        Ok(report)
    }

    /// Runs the state's unwind, wrapping it in a Post frame if required.
    /// Returns the Post context alongside the result.
    fn unwind(
        &mut self,
        state: &'static dyn PhaseState,
        context: &mut PhaseContext,
        cause: Cause,
        world: &mut World,
        bus: &mut EventBus,
        report: &mut PopReport,
    ) -> (Result<(), UnwindError>, Option<PhaseContext>) {
        let spawn_type = state.spawn_type();
        if !state.requires_post() {
            let mut scope = UnwindScope::new(world, bus, cause, spawn_type, None, report);
            return (state.unwind(context, &mut scope), None);
        }

        let mut post = self.take_context();
        post.set_payload(ContextPayload::Unwinding {
            unwinding: state.kind(),
            cause: cause.clone(),
        });
        self.stack.push(Frame {
            state: &POST,
            context: post,
        });

        let result = {
            let post = self.stack.last_mut().map(|f| &mut f.context);
            let mut scope = UnwindScope::new(world, bus, cause, spawn_type, post, report);
            state.unwind(context, &mut scope)
        };
        (result, self.stack.pop().map(|f| f.context))
    }

    /// Throws away the captures of a frame whose unwind failed.
    fn discard(
        &mut self,
        state: &'static dyn PhaseState,
        mut context: PhaseContext,
        post: Option<PhaseContext>,
        source: UnwindError,
        world: &mut World,
        depth: usize,
    ) -> PhaseError {
        let kind = state.kind();
        let subject = FrameSnapshot::capture(depth, kind, &context);
        let restored = TransactionBatch::new(context.captures.blocks.drain()).restore_all(world);
        let discarded = context.captures.force_drain();

        let diagnostic = Box::new(
            self.diagnostic(format!("unwind of {kind} failed: {source}"))
                .with_subject(subject),
        );
        tracing::error!(
            phase = %kind,
            restored = restored.len(),
            discarded = discarded.total(),
            diagnostic = ?diagnostic,
            "unwind failed, captures discarded"
        );
        metrics::record_transactions("discarded", restored.len());

        self.recycle(context);
        if let Some(post) = post {
            self.recycle(post);
        }
        PhaseError::Unwind {
            phase: kind,
            source,
            diagnostic,
        }
    }

    fn unconsumed(
        &self,
        kind: PhaseKind,
        depth: usize,
        context: &mut PhaseContext,
        post: Option<&mut PhaseContext>,
        leftover: CaptureCounts,
        world: &mut World,
    ) {
        let subject = FrameSnapshot::capture(depth, kind, context);
        match self.config.unconsumed_captures {
            UnconsumedCapturePolicy::Panic => {
                panic!("{kind} left captures behind after unwind: {leftover:?} (frame {subject:?})");
            }
            UnconsumedCapturePolicy::DrainAndLog => {
                TransactionBatch::new(context.captures.blocks.drain()).restore_all(world);
                context.captures.force_drain();
                if let Some(post) = post {
                    post.captures.force_drain();
                }
                let diagnostic = self
                    .diagnostic(format!("{kind} left captures behind"))
                    .with_subject(subject);
                tracing::error!(
                    phase = %kind,
                    leftover = leftover.total(),
                    diagnostic = ?diagnostic,
                    "unconsumed captures drained"
                );
            }
        }
    }

    fn take_context(&mut self) -> PhaseContext {
        self.pool.pop().unwrap_or_default()
    }

    fn recycle(&mut self, mut context: PhaseContext) {
        if self.pool.len() < POOL_LIMIT {
            context.reset();
            self.pool.push(context);
        }
    }
}

const fn add_counts(a: CaptureCounts, b: CaptureCounts) -> CaptureCounts {
    CaptureCounts {
        blocks: a.blocks + b.blocks,
        entities: a.entities + b.entities,
        items: a.items + b.items,
        per_entity_drops: a.per_entity_drops + b.per_entity_drops,
        per_block_drops: a.per_block_drops + b.per_block_drops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::config::RunawayPolicy;
    use causeway_core::types::{
        BlockPos, Entity, EntityKind, Explosion, Location, PlayerRef, WorldId,
    };

    use crate::phase::state::{COMMAND, EXPLOSION, TILE_ENTITY_UNLOAD};

    fn config(unconsumed: UnconsumedCapturePolicy) -> TrackerConfig {
        TrackerConfig {
            runaway: RunawayPolicy::Coordinates,
            unconsumed_captures: unconsumed,
            record_history: true,
        }
    }

    fn blast() -> PhaseContext {
        PhaseContext::explosion(Explosion::new(
            Location::new(WorldId::default(), 1.0, 64.0, 1.0),
            3.0,
        ))
    }

    fn pig() -> Entity {
        Entity::new(
            EntityKind::new("minecraft:pig"),
            Location::new(WorldId::default(), 0.0, 64.0, 0.0),
        )
    }

    #[test]
    fn new_tracker_is_idle() {
        let tracker = PhaseTracker::default();
        assert!(tracker.is_idle());
        assert_eq!(tracker.current_kind(), PhaseKind::Idle);
        assert!(tracker.current_context().is_none());
    }

    #[test]
    fn pop_on_empty_stack_is_refused() {
        let mut tracker = PhaseTracker::default();
        let result = tracker.pop_phase(&mut World::default(), &mut EventBus::new());
        assert!(matches!(result, Err(PhaseError::EmptyStack { .. })));
    }

    #[test]
    fn push_then_pop_restores_depth() {
        let mut tracker = PhaseTracker::default();
        tracker.push_phase(&EXPLOSION, blast()).unwrap();
        assert_eq!(tracker.depth(), 1);
        let report = tracker
            .pop_phase(&mut World::default(), &mut EventBus::new())
            .unwrap();
        assert_eq!(report.phase, PhaseKind::Explosion);
        assert_eq!(report.depth, 1);
        assert!(tracker.is_idle());
    }

    #[test]
    fn command_without_source_is_refused() {
        let mut tracker = PhaseTracker::default();
        let ctx = PhaseContext::new(ContextPayload::Command {
            command: "/say hi".into(),
        });
        let err = tracker.push_phase(&COMMAND, ctx).unwrap_err();
        assert!(matches!(err, PhaseError::MissingField { .. }));
        assert_eq!(tracker.depth(), 0);
        assert_eq!(tracker.refusals(), 1);
    }

    #[test]
    fn mismatched_context_is_refused() {
        let mut tracker = PhaseTracker::default();
        let err = tracker.push_phase(&COMMAND, blast()).unwrap_err();
        assert!(matches!(
            err,
            PhaseError::ContextMismatch {
                found: PhaseKind::Explosion,
                ..
            }
        ));
    }

    #[test]
    fn post_cannot_be_pushed_by_callers() {
        let mut tracker = PhaseTracker::default();
        let err = tracker.push_phase(&POST, PhaseContext::default()).unwrap_err();
        assert_eq!(err.reason(), "not_pushable");
    }

    #[test]
    fn illegal_transition_keeps_outer_frame() {
        let mut tracker = PhaseTracker::default();
        tracker
            .push_phase(
                &TILE_ENTITY_UNLOAD,
                PhaseContext::tile_entity_unload(WorldId::default(), BlockPos::default()),
            )
            .unwrap();
        let err = tracker
            .push_phase(&COMMAND, PhaseContext::command(PlayerRef::named("a"), "/x"))
            .unwrap_err();
        match err {
            PhaseError::IllegalTransition { from, to, diagnostic } => {
                assert_eq!(from, PhaseKind::TileEntityUnload);
                assert_eq!(to, PhaseKind::Command);
                assert_eq!(diagnostic.depth(), 1);
                assert_eq!(diagnostic.requested, Some(PhaseKind::Command));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(tracker.current_kind(), PhaseKind::TileEntityUnload);
    }

    #[test]
    fn nested_spawns_are_handed_up() {
        let mut tracker = PhaseTracker::new(config(UnconsumedCapturePolicy::Panic));
        let mut world = World::default();
        let mut bus = EventBus::new();

        tracker
            .push_phase(&COMMAND, PhaseContext::command(PlayerRef::named("a"), "/boom"))
            .unwrap();
        tracker.push_phase(&EXPLOSION, blast()).unwrap();
        let ctx = tracker.current_context_mut().unwrap();
        ctx.captures.entities.push(pig());
        ctx.captures.entities.push(pig());

        let inner = tracker.pop_phase(&mut world, &mut bus).unwrap();
        assert_eq!(inner.handed_up, 2);
        assert_eq!(inner.spawn_events, 0);
        assert_eq!(tracker.current_context().unwrap().captures.entities.len(), 2);

        let outer = tracker.pop_phase(&mut world, &mut bus).unwrap();
        assert_eq!(outer.spawn_events, 1);
        assert_eq!(world.entity_count(), 2);
        assert_eq!(bus.counts().spawn, 1);
    }

    #[test]
    fn leftover_captures_are_drained_and_reported() {
        let mut tracker = PhaseTracker::new(config(UnconsumedCapturePolicy::DrainAndLog));
        tracker
            .push_phase(
                &TILE_ENTITY_UNLOAD,
                PhaseContext::tile_entity_unload(WorldId::default(), BlockPos::default()),
            )
            .unwrap();
        tracker.current_context_mut().unwrap().captures.entities.push(pig());

        let mut world = World::default();
        let report = tracker.pop_phase(&mut world, &mut EventBus::new()).unwrap();
        assert_eq!(report.unconsumed.map(|c| c.entities), Some(1));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    #[should_panic(expected = "left captures behind")]
    fn leftover_captures_panic_when_configured() {
        let mut tracker = PhaseTracker::new(config(UnconsumedCapturePolicy::Panic));
        tracker
            .push_phase(
                &TILE_ENTITY_UNLOAD,
                PhaseContext::tile_entity_unload(WorldId::default(), BlockPos::default()),
            )
            .unwrap();
        tracker.current_context_mut().unwrap().captures.entities.push(pig());
        let _ = tracker.pop_phase(&mut World::default(), &mut EventBus::new());
    }

    #[test]
    fn contexts_are_pooled_and_reset() {
        let mut tracker = PhaseTracker::default();
        tracker.push_phase(&EXPLOSION, blast()).unwrap();
        tracker
            .pop_phase(&mut World::default(), &mut EventBus::new())
            .unwrap();
        assert_eq!(tracker.pool.len(), 2);
        assert!(tracker.pool.iter().all(|c| c.source().is_none()));
    }
}

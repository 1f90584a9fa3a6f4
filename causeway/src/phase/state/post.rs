//! Post state
//!
//! While a phase unwinds, the tracker pushes a Post frame on top of it.
//! Entities and drops the unwinding phase releases collect in that frame.
//! Once the Post frame is popped, [`post_dispatch`] either appends them to
//! the enclosing frame's captures, so that one logical activity yields one
//! spawn event, or flushes them when nothing below is capturing.

use causeway_core::cause::{Cause, SpawnType};
use causeway_core::types::BlockPos;

use crate::error::UnwindError;
use crate::event::EventBus;
use crate::phase::context::{ContextPayload, PhaseContext};
use crate::phase::pipeline::{UnwindScope, flush_drops, flush_spawns};
use crate::phase::tracker::PopReport;
use crate::world::World;

use super::{PhaseKind, PhaseState, for_kind};

/// Deferred-dispatch wrapper around an unwinding phase.
#[derive(Debug)]
pub struct PostPhase;

impl PhaseState for PostPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Post
    }

    fn can_switch_to(&self, _next: PhaseKind) -> bool {
        false
    }

    fn requires_post(&self) -> bool {
        false
    }

    fn should_capture_block_change_or_skip(&self, _ctx: &PhaseContext, _pos: BlockPos) -> bool {
        false
    }

    fn spawn_type(&self) -> SpawnType {
        SpawnType::Custom("post".to_owned())
    }

    /// The cause of the phase being unwound.
    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        match ctx.payload() {
            ContextPayload::Unwinding { cause, .. } => Ok(cause.clone()),
            _ => Err(UnwindError::PayloadMismatch { phase: self.kind() }),
        }
    }

    /// Post frames are resolved by [`post_dispatch`], never unwound.
    fn unwind(&self, _ctx: &mut PhaseContext, _scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        Ok(())
    }
}

/// Resolves a popped Post frame against the frame now on top, if any.
pub(crate) fn post_dispatch(
    post: &mut PhaseContext,
    enclosing: Option<(&'static dyn PhaseState, &mut PhaseContext)>,
    world: &mut World,
    bus: &mut EventBus,
    report: &mut PopReport,
) {
    let (unwinding, cause) = match post.payload() {
        ContextPayload::Unwinding { unwinding, cause } => (*unwinding, cause.clone()),
        other => {
            tracing::error!(payload = %other.summary(), "post frame without an unwinding payload");
            return;
        }
    };

    match enclosing {
        Some((state, ctx)) if state.captures_entities() => {
            let entities = post.captures.entities.drain();
            let items = post.captures.items.drain();
            if entities.is_empty() && items.is_empty() {
                return;
            }
            tracing::debug!(
                from = %unwinding,
                to = state.name(),
                entities = entities.len(),
                items = items.len(),
                "deferred effects handed up"
            );
            report.handed_up += entities.len() + items.len();
            ctx.captures.entities.extend(entities);
            ctx.captures.items.extend(items);
        }
        _ => {
            let spawn_type = for_kind(unwinding).spawn_type();
            flush_spawns(
                world,
                bus,
                cause.with_spawn_cause(spawn_type),
                post.captures.entities.drain(),
                report,
            );
            flush_drops(
                world,
                bus,
                cause.with_spawn_cause(SpawnType::Dropped),
                post.captures.items.drain(),
                report,
            );
        }
    }
}

//! Block tick state

use causeway_core::cause::{Cause, CauseValue, SpawnType};

use crate::error::UnwindError;
use crate::phase::context::{ContextPayload, PhaseContext};
use crate::phase::pipeline::{self, UnwindScope};

use super::{PhaseKind, PhaseState};

/// A block is ticking; its effects are rooted at the block snapshot.
#[derive(Debug)]
pub struct BlockTickPhase;

impl PhaseState for BlockTickPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::BlockTick
    }

    fn can_switch_to(&self, next: PhaseKind) -> bool {
        matches!(
            next,
            PhaseKind::Explosion | PhaseKind::BlockTick | PhaseKind::TileEntityUnload
        )
    }

    fn tracks_block_specific_drops(&self) -> bool {
        true
    }

    fn spawn_type(&self) -> SpawnType {
        SpawnType::Placement
    }

    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        let ContextPayload::BlockTick { block } = ctx.payload() else {
            return Err(UnwindError::PayloadMismatch { phase: self.kind() });
        };
        let source = ctx
            .source()
            .cloned()
            .unwrap_or_else(|| CauseValue::Block(block.clone()));
        Ok(ctx.attribution(Cause::builder().source(source)).build()?)
    }

    fn unwind(&self, ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        pipeline::unwind_all(self, ctx, scope)
    }
}

//! Tile entity unload state

use causeway_core::cause::{Cause, CauseValue, SpawnType};
use causeway_core::types::BlockPos;

use crate::error::UnwindError;
use crate::phase::context::{ContextPayload, PhaseContext};
use crate::phase::pipeline::UnwindScope;

use super::{PhaseKind, PhaseState};

/// A tile entity is unloading. Unloading is not a causal block change, so
/// nothing is captured and nothing may nest inside it.
#[derive(Debug)]
pub struct TileEntityUnloadPhase;

impl PhaseState for TileEntityUnloadPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::TileEntityUnload
    }

    fn can_switch_to(&self, _next: PhaseKind) -> bool {
        false
    }

    fn requires_post(&self) -> bool {
        false
    }

    fn captures_entities(&self) -> bool {
        false
    }

    fn should_capture_block_change_or_skip(&self, _ctx: &PhaseContext, _pos: BlockPos) -> bool {
        false
    }

    fn spawn_type(&self) -> SpawnType {
        SpawnType::Custom("tile_entity_unload".to_owned())
    }

    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        let ContextPayload::TileEntityUnload { world, pos } = ctx.payload() else {
            return Err(UnwindError::PayloadMismatch { phase: self.kind() });
        };
        Ok(Cause::of(CauseValue::Text(format!("unload {pos} in {world}"))))
    }

    fn unwind(&self, _ctx: &mut PhaseContext, _scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        Ok(())
    }
}

//! Idle state

use causeway_core::cause::{Cause, CauseValue, SpawnType};
use causeway_core::types::BlockPos;

use crate::error::UnwindError;
use crate::phase::context::PhaseContext;
use crate::phase::pipeline::UnwindScope;

use super::{PhaseKind, PhaseState, is_activity};

/// Nothing is being tracked. Every mutation applies immediately.
#[derive(Debug)]
pub struct IdlePhase;

impl PhaseState for IdlePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Idle
    }

    fn can_switch_to(&self, next: PhaseKind) -> bool {
        is_activity(next)
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
        SpawnType::Custom("idle".to_owned())
    }

    fn build_cause(&self, _ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        Ok(Cause::of(CauseValue::Text("idle".to_owned())))
    }

    fn unwind(&self, _ctx: &mut PhaseContext, _scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        Ok(())
    }
}

//! Explosion state
//!
//! Explosions nest inside anything and track drops per block, so drops of
//! blocks that a listener saves are thrown away with the restoration.

use causeway_core::cause::{Cause, CauseValue, EXPLOSION_KEY, SpawnType};

use crate::error::UnwindError;
use crate::phase::context::{ContextPayload, PhaseContext};
use crate::phase::pipeline::{self, UnwindScope};

use super::{PhaseKind, PhaseState, is_activity};

/// An explosion is resolving.
#[derive(Debug)]
pub struct ExplosionPhase;

impl PhaseState for ExplosionPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Explosion
    }

    fn can_switch_to(&self, next: PhaseKind) -> bool {
        is_activity(next)
    }

    fn tracks_block_specific_drops(&self) -> bool {
        true
    }

    fn tracks_entity_specific_drops(&self) -> bool {
        true
    }

    fn ignores_item_pre_merging(&self) -> bool {
        true
    }

    fn spawn_type(&self) -> SpawnType {
        SpawnType::Explosion
    }

    /// Rooted at the explicit source if one was set, else at the detonating
    /// entity, else at the explosion itself.
    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        let ContextPayload::Explosion { explosion } = ctx.payload() else {
            return Err(UnwindError::PayloadMismatch { phase: self.kind() });
        };
        let source = ctx
            .source()
            .cloned()
            .or_else(|| explosion.source.clone().map(CauseValue::Entity))
            .unwrap_or_else(|| CauseValue::Explosion(explosion.clone()));
        let builder = Cause::builder()
            .source(source)
            .named(EXPLOSION_KEY, CauseValue::Explosion(explosion.clone()));
        Ok(ctx.attribution(builder).build()?)
    }

    fn unwind(&self, ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        pipeline::unwind_all(self, ctx, scope)
    }
}

//! Command state
//!
//! Everything a command does is attributed to whoever issued it. The cause
//! is rooted at the issuing source with the command line as a named entry,
//! and spawned entities get the issuing player as their creator.

use causeway_core::cause::{Cause, CauseValue, SpawnType};

use crate::error::UnwindError;
use crate::phase::context::{ContextPayload, PhaseContext};
use crate::phase::pipeline::{self, UnwindScope};

use super::{PhaseKind, PhaseState, RequiredField};

/// Named-entry key for the command line.
pub const COMMAND_KEY: &str = "command";

/// A command is executing.
#[derive(Debug)]
pub struct CommandPhase;

impl PhaseState for CommandPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Command
    }

    fn can_switch_to(&self, next: PhaseKind) -> bool {
        matches!(
            next,
            PhaseKind::BlockTick
                | PhaseKind::Explosion
                | PhaseKind::PluginTask
                | PhaseKind::TileEntityUnload
        )
    }

    fn required_fields(&self) -> &'static [RequiredField] {
        &[RequiredField::Source]
    }

    fn tracks_entity_specific_drops(&self) -> bool {
        true
    }

    fn spawn_type(&self) -> SpawnType {
        SpawnType::Command
    }

    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        let ContextPayload::Command { command } = ctx.payload() else {
            return Err(UnwindError::PayloadMismatch { phase: self.kind() });
        };
        let source = ctx
            .source()
            .cloned()
            .ok_or(UnwindError::MissingAttribution {
                phase: self.kind(),
                field: RequiredField::Source,
            })?;
        let builder = Cause::builder()
            .source(source)
            .named(COMMAND_KEY, CauseValue::Command(command.clone()));
        Ok(ctx.attribution(builder).build()?)
    }

    fn unwind(&self, ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        pipeline::unwind_all(self, ctx, scope)
    }
}

//! Plugin task state
//!
//! Block changes are not batched: each one runs through the block pipeline
//! as it happens. Entities and drops are still captured, and they may only
//! be released when the task says who it is acting for.

use causeway_core::cause::{Cause, CauseValue, SpawnType};

use crate::error::UnwindError;
use crate::phase::context::{ContextPayload, PhaseContext};
use crate::phase::pipeline::{self, UnwindScope};

use super::{PhaseKind, PhaseState, RequiredField, is_activity};

/// Named-entry key for the plugin running the task.
pub const PLUGIN_KEY: &str = "plugin";

/// A scheduled plugin task is running.
#[derive(Debug)]
pub struct PluginTaskPhase;

impl PhaseState for PluginTaskPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::PluginTask
    }

    fn can_switch_to(&self, next: PhaseKind) -> bool {
        is_activity(next)
    }

    fn does_bulk_block_capture(&self) -> bool {
        false
    }

    fn spawn_type(&self) -> SpawnType {
        SpawnType::Plugin
    }

    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError> {
        let ContextPayload::PluginTask { plugin } = ctx.payload() else {
            return Err(UnwindError::PayloadMismatch { phase: self.kind() });
        };
        let source = ctx
            .source()
            .cloned()
            .unwrap_or_else(|| CauseValue::Plugin(plugin.clone()));
        let builder = Cause::builder()
            .source(source)
            .named(PLUGIN_KEY, CauseValue::Plugin(plugin.clone()));
        Ok(ctx.attribution(builder).build()?)
    }

    fn unwind(&self, ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>) -> Result<(), UnwindError> {
        let captured = !ctx.captures.entities.is_empty() || !ctx.captures.items.is_empty();
        if captured && ctx.source().is_none() {
            return Err(UnwindError::MissingAttribution {
                phase: self.kind(),
                field: RequiredField::Source,
            });
        }
        pipeline::unwind_all(self, ctx, scope)
    }
}

//! Structured phase diagnostics
//!
//! Values describing the phase stack at the moment something went wrong.
//! The engine only builds them; turning them into text is left to
//! [`crate::observability::report`].

use serde::Serialize;

use causeway_core::cause::CauseValue;

use super::capture::CaptureCounts;
use super::context::PhaseContext;
use super::state::PhaseKind;

/// One stack frame, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSnapshot {
    /// 1-based depth, bottom frame first.
    pub depth: usize,
    /// Phase kind of the frame.
    pub phase: PhaseKind,
    /// Summary of the context payload.
    pub payload: String,
    /// Source label, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Notifier label, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifier: Option<String>,
    /// Owner label, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Pending captures.
    pub captures: CaptureCounts,
}

impl FrameSnapshot {
    /// Snapshots `ctx` as frame number `depth`.
    #[must_use]
    pub fn capture(depth: usize, phase: PhaseKind, ctx: &PhaseContext) -> Self {
        Self {
            depth,
            phase,
            payload: ctx.payload().summary(),
            source: ctx.source().map(CauseValue::label),
            notifier: ctx.notifier().map(CauseValue::label),
            owner: ctx.owner().map(CauseValue::label),
            captures: ctx.captures.counts(),
        }
    }
}

/// Everything known about a refused or failed phase operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDiagnostic {
    /// What went wrong.
    pub message: String,
    /// Kind that was being pushed, for refusals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<PhaseKind>,
    /// The frame the operation was about, when it is not on the stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<FrameSnapshot>,
    /// The stack, bottom first.
    pub frames: Vec<FrameSnapshot>,
}

impl PhaseDiagnostic {
    /// Creates a diagnostic over `frames`.
    #[must_use]
    pub fn new(message: impl Into<String>, frames: Vec<FrameSnapshot>) -> Self {
        Self {
            message: message.into(),
            requested: None,
            subject: None,
            frames,
        }
    }

    /// Records the kind that was requested.
    #[must_use]
    pub const fn with_requested(mut self, kind: PhaseKind) -> Self {
        self.requested = Some(kind);
        self
    }

    /// Records the frame the operation was about.
    #[must_use]
    pub fn with_subject(mut self, subject: FrameSnapshot) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Top frame of the stack, if any.
    #[must_use]
    pub fn top(&self) -> Option<&FrameSnapshot> {
        self.frames.last()
    }

    /// Stack depth when the diagnostic was taken.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

//! Error types for `Causeway`
//!
//! Top-level error aggregation with exit codes, plus the phase engine's own
//! error hierarchy. Phase errors carry a structured
//! [`PhaseDiagnostic`] of the stack at the moment they were raised.

use causeway_core::error::{CauseError, ConfigError};
use thiserror::Error;

use crate::phase::diagnostics::PhaseDiagnostic;
use crate::phase::state::{PhaseKind, RequiredField};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `Causeway` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error (including unmet scenario expectations)
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Phase engine error (refused push, failed unwind)
    pub const PHASE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Causeway` operations.
#[derive(Debug, Error)]
pub enum CausewayError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Phase engine error
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// A scenario ran but did not end in the expected state
    #[error("scenario '{scenario}' failed {} expectation(s)", failures.len())]
    ExpectationsFailed {
        /// Scenario name
        scenario: String,
        /// One line per unmet expectation
        failures: Vec<String>,
    },
}

impl CausewayError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Phase(_) => ExitCode::PHASE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::ExpectationsFailed { .. } => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Phase Engine Errors
// ============================================================================

/// Phase stack errors.
///
/// Every variant except [`PhaseError::Unwind`] is a refused operation that
/// left the stack exactly as it was.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// The kind can never be pushed by callers
    #[error("{phase} cannot be pushed")]
    NotPushable {
        /// Requested kind
        phase: PhaseKind,
        /// Stack at refusal
        diagnostic: Box<PhaseDiagnostic>,
    },

    /// The context was built for another kind
    #[error("a {found} context cannot drive {phase}")]
    ContextMismatch {
        /// Requested kind
        phase: PhaseKind,
        /// Kind the context belongs to
        found: PhaseKind,
        /// Stack at refusal
        diagnostic: Box<PhaseDiagnostic>,
    },

    /// A required attribution field was not set before the push
    #[error("{phase} requires a {field} before it is pushed")]
    MissingField {
        /// Requested kind
        phase: PhaseKind,
        /// Missing field
        field: RequiredField,
        /// Stack at refusal
        diagnostic: Box<PhaseDiagnostic>,
    },

    /// The current phase does not allow the requested one on top
    #[error("illegal phase transition from {from} to {to}")]
    IllegalTransition {
        /// Current kind
        from: PhaseKind,
        /// Requested kind
        to: PhaseKind,
        /// Stack at refusal
        diagnostic: Box<PhaseDiagnostic>,
    },

    /// The push repeats an activity already on the stack
    #[error("runaway {phase} refused (repeats frame {depth})")]
    Runaway {
        /// Requested kind
        phase: PhaseKind,
        /// Depth of the frame it repeats
        depth: usize,
        /// Stack at refusal
        diagnostic: Box<PhaseDiagnostic>,
    },

    /// Pop with nothing on the stack
    #[error("pop on an empty phase stack")]
    EmptyStack {
        /// Stack at refusal
        diagnostic: Box<PhaseDiagnostic>,
    },

    /// The popped phase could not unwind; its captures were discarded
    #[error("unwind of {phase} failed: {source}")]
    Unwind {
        /// Popped kind
        phase: PhaseKind,
        /// Why the unwind failed
        source: UnwindError,
        /// Stack after the pop, with the failed frame as subject
        diagnostic: Box<PhaseDiagnostic>,
    },
}

impl PhaseError {
    /// Structured diagnostic taken when the error was raised.
    #[must_use]
    pub fn diagnostic(&self) -> &PhaseDiagnostic {
        match self {
            Self::NotPushable { diagnostic, .. }
            | Self::ContextMismatch { diagnostic, .. }
            | Self::MissingField { diagnostic, .. }
            | Self::IllegalTransition { diagnostic, .. }
            | Self::Runaway { diagnostic, .. }
            | Self::EmptyStack { diagnostic }
            | Self::Unwind { diagnostic, .. } => diagnostic,
        }
    }

    /// Short machine-friendly reason, used as a metric label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotPushable { .. } => "not_pushable",
            Self::ContextMismatch { .. } => "context_mismatch",
            Self::MissingField { .. } => "missing_field",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::Runaway { .. } => "runaway",
            Self::EmptyStack { .. } => "empty_stack",
            Self::Unwind { .. } => "unwind",
        }
    }

    /// Whether this is a refused push.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        !matches!(self, Self::EmptyStack { .. } | Self::Unwind { .. })
    }
}

/// Failures inside a single unwind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnwindError {
    /// Captures exist but cannot be attributed
    #[error("{phase} has captures but no {field} to attribute them to")]
    MissingAttribution {
        /// Unwinding kind
        phase: PhaseKind,
        /// Missing field
        field: RequiredField,
    },

    /// The context payload does not belong to the unwinding state
    #[error("{phase} was unwound with a foreign context")]
    PayloadMismatch {
        /// Unwinding kind
        phase: PhaseKind,
    },

    /// The cause could not be built
    #[error(transparent)]
    Cause(#[from] CauseError),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `Causeway` operations.
pub type Result<T> = std::result::Result<T, CausewayError>;

// ============================================================================
// Tests
// ============================================================================

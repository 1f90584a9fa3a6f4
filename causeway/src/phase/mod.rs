//! Phase engine
//!
//! Tracks which activity is running, captures the side effects it proposes,
//! and turns those captures into committed or reverted world mutations and
//! events when the activity ends.
//!
//! - [`tracker`]: the activation stack
//! - [`state`]: one [`PhaseState`] per activity kind
//! - [`context`]: per-frame data and captures
//! - [`pipeline`]: block, spawn, and drop unwind pipelines
//! - [`capture`] and [`transaction`]: capture collections and block
//!   transactions
//! - [`diagnostics`]: structured stack snapshots

pub mod capture;
pub mod context;
pub mod diagnostics;
pub mod pipeline;
pub mod state;
pub mod tracker;
pub mod transaction;

pub use capture::{CaptureCounts, CaptureMap, CaptureSupplier, Captures, SupplierState};
pub use context::{ContextPayload, PhaseContext};
pub use diagnostics::{FrameSnapshot, PhaseDiagnostic};
pub use pipeline::{BlockOutcome, UnwindScope};
pub use state::{PhaseKind, PhaseState, RequiredField, SpawnDisposition};
pub use tracker::{Frame, PhaseTracker, PopReport};
pub use transaction::{BlockTransaction, TransactionBatch};

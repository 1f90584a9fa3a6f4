//! Observability module
//!
//! Logging, metrics, the JSONL scenario journal, and human-readable
//! reports for phase diagnostics and run summaries.

pub mod events;
pub mod logging;
pub mod metrics;
pub mod report;

pub use events::{EventEmitter, JournalEvent};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
pub use report::{format_diagnostic, format_summary};

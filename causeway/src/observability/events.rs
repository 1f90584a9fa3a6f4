//! Scenario journal
//!
//! Discrete, typed events emitted while a scenario runs. Events are written
//! as newline-delimited JSON (JSONL), each carrying a monotonically
//! increasing sequence number so consumers can order them.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::phase::PhaseKind;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete journal event.
///
/// Each variant is tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum JournalEvent {
    /// A scenario began.
    ScenarioStarted {
        /// When the scenario started.
        timestamp: DateTime<Utc>,
        /// Scenario name.
        scenario: String,
        /// Number of top-level steps.
        steps: usize,
    },

    /// A scenario finished.
    ScenarioFinished {
        /// When the scenario finished.
        timestamp: DateTime<Utc>,
        /// Scenario name.
        scenario: String,
        /// Whether every expectation held.
        passed: bool,
        /// Wall time in milliseconds.
        duration_ms: u64,
    },

    /// A phase unwind committed or restored block changes.
    BlocksChanged {
        /// When the phase finished unwinding.
        timestamp: DateTime<Utc>,
        /// Phase that unwound.
        phase: PhaseKind,
        /// Transactions committed.
        applied: usize,
        /// Transactions restored after a veto.
        restored: usize,
    },

    /// A phase unwind spawned entities or items.
    EntitiesSpawned {
        /// When the phase finished unwinding.
        timestamp: DateTime<Utc>,
        /// Phase that unwound.
        phase: PhaseKind,
        /// Spawn events posted.
        events: usize,
        /// Entities and items that entered the world.
        spawned: usize,
        /// Entities handed to the enclosing phase instead.
        handed_up: usize,
    },

    /// A phase unwind posted drop events.
    ItemsDropped {
        /// When the phase finished unwinding.
        timestamp: DateTime<Utc>,
        /// Phase that unwound.
        phase: PhaseKind,
        /// Drop events posted.
        events: usize,
        /// Drops discarded with restored blocks.
        discarded: usize,
    },

    /// A phase push was refused or an unwind failed.
    PhaseRefused {
        /// When the refusal happened.
        timestamp: DateTime<Utc>,
        /// Requested or unwinding phase.
        phase: PhaseKind,
        /// Machine-friendly reason.
        reason: String,
        /// Human-readable message.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: JournalEvent,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Buffered JSONL journal writer.
///
/// Each call to [`emit`](Self::emit) takes the next sequence number,
/// serializes the event as one line, and flushes. Serialization and I/O
/// failures are dropped; a broken journal must not abort a run.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: JournalEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

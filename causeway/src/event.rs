//! Outbound events
//!
//! Unwinding phases turn their captures into events and post them to the
//! [`EventBus`]. Listeners run in registration order and may veto part or all
//! of what an event proposes; they can never re-validate something another
//! listener vetoed.

use std::fmt;

use serde::Serialize;

use causeway_core::cause::Cause;
use causeway_core::types::{BlockPos, ChangeCategory, Entity};

use crate::phase::transaction::BlockTransaction;

// ============================================================================
// Block change events
// ============================================================================

/// Which slice of an unwind a block event covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeBlockKind {
    /// Solid blocks turning to air.
    Break,
    /// Air turning into solid blocks.
    Place,
    /// Solid blocks changing state.
    Modify,
    /// Aggregate of every still-valid change.
    Post,
}

impl From<ChangeCategory> for ChangeBlockKind {
    fn from(category: ChangeCategory) -> Self {
        match category {
            ChangeCategory::Break => Self::Break,
            ChangeCategory::Place => Self::Place,
            ChangeCategory::Modify => Self::Modify,
        }
    }
}

impl fmt::Display for ChangeBlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Break => write!(f, "break"),
            Self::Place => write!(f, "place"),
            Self::Modify => write!(f, "modify"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Proposed block changes awaiting listener approval.
#[derive(Debug, Clone)]
pub struct ChangeBlockEvent {
    kind: ChangeBlockKind,
    cause: Cause,
    transactions: Vec<BlockTransaction>,
    cancelled: bool,
}

impl ChangeBlockEvent {
    /// Creates an uncancelled event.
    #[must_use]
    pub const fn new(kind: ChangeBlockKind, cause: Cause, transactions: Vec<BlockTransaction>) -> Self {
        Self {
            kind,
            cause,
            transactions,
            cancelled: false,
        }
    }

    /// Event kind.
    #[must_use]
    pub const fn kind(&self) -> ChangeBlockKind {
        self.kind
    }

    /// Why the changes happened.
    #[must_use]
    pub const fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Proposed changes.
    #[must_use]
    pub fn transactions(&self) -> &[BlockTransaction] {
        &self.transactions
    }

    /// Whether a listener cancelled the whole event.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Cancels (or un-cancels) the whole event.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    /// Vetoes the transaction with batch index `index`.
    pub fn invalidate(&mut self, index: usize) -> bool {
        self.transactions
            .iter_mut()
            .find(|t| t.index == index)
            .map(BlockTransaction::invalidate)
            .is_some()
    }

    /// Vetoes every transaction at `pos` and returns how many were hit.
    pub fn invalidate_at(&mut self, pos: BlockPos) -> usize {
        let mut hit = 0;
        for txn in self.transactions.iter_mut().filter(|t| t.pos == pos) {
            txn.invalidate();
            hit += 1;
        }
        hit
    }

    /// Batch indices of vetoed transactions.
    #[must_use]
    pub fn invalidated_indices(&self) -> Vec<usize> {
        self.transactions
            .iter()
            .filter(|t| !t.is_valid())
            .map(|t| t.index)
            .collect()
    }
}

// ============================================================================
// Spawn and drop events
// ============================================================================

macro_rules! candidate_event {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            cause: Cause,
            entities: Vec<Entity>,
            cancelled: bool,
        }

        impl $name {
            /// Creates an uncancelled event.
            #[must_use]
            pub const fn new(cause: Cause, entities: Vec<Entity>) -> Self {
                Self {
                    cause,
                    entities,
                    cancelled: false,
                }
            }

            /// Why the entities appear.
            #[must_use]
            pub const fn cause(&self) -> &Cause {
                &self.cause
            }

            /// Candidate entities.
            #[must_use]
            pub fn entities(&self) -> &[Entity] {
                &self.entities
            }

            /// Keeps only the candidates matching `keep`.
            pub fn retain(&mut self, keep: impl FnMut(&Entity) -> bool) {
                self.entities.retain(keep);
            }

            /// Whether a listener cancelled the event.
            #[must_use]
            pub const fn is_cancelled(&self) -> bool {
                self.cancelled
            }

            /// Cancels (or un-cancels) the event.
            pub fn set_cancelled(&mut self, cancelled: bool) {
                self.cancelled = cancelled;
            }

            /// Candidates that survived, none if cancelled.
            #[must_use]
            pub fn into_survivors(self) -> Vec<Entity> {
                if self.cancelled {
                    Vec::new()
                } else {
                    self.entities
                }
            }
        }
    };
}

candidate_event!(
    /// Entities about to be spawned.
    SpawnEntityEvent
);

candidate_event!(
    /// Item entities about to be dropped into the world.
    DropItemEvent
);

// ============================================================================
// Listeners and bus
// ============================================================================

/// Observer of engine events. Every method defaults to doing nothing.
pub trait EventListener {
    /// Name used in logs.
    fn name(&self) -> &str {
        "listener"
    }

    /// Called for every block change event.
    fn on_change_block(&mut self, _event: &mut ChangeBlockEvent) {}

    /// Called for every spawn event.
    fn on_spawn_entity(&mut self, _event: &mut SpawnEntityEvent) {}

    /// Called for every drop event.
    fn on_drop_item(&mut self, _event: &mut DropItemEvent) {}
}

/// What was posted, after listeners ran.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRecord {
    /// A block change event.
    ChangeBlock {
        /// Event kind.
        kind: ChangeBlockKind,
        /// Event cause.
        cause: Cause,
        /// Every proposed position.
        positions: Vec<BlockPos>,
        /// Positions vetoed by listeners.
        invalidated: Vec<BlockPos>,
        /// Whether the event was cancelled.
        cancelled: bool,
    },
    /// A spawn event.
    SpawnEntity {
        /// Event cause.
        cause: Cause,
        /// Entities that survived the listeners.
        entities: Vec<Entity>,
        /// Whether the event was cancelled.
        cancelled: bool,
    },
    /// A drop event.
    DropItem {
        /// Event cause.
        cause: Cause,
        /// Item entities that survived the listeners.
        entities: Vec<Entity>,
        /// Whether the event was cancelled.
        cancelled: bool,
    },
}

impl EventRecord {
    /// Cause of the recorded event.
    #[must_use]
    pub const fn cause(&self) -> &Cause {
        match self {
            Self::ChangeBlock { cause, .. }
            | Self::SpawnEntity { cause, .. }
            | Self::DropItem { cause, .. } => cause,
        }
    }

    /// Whether the recorded event was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        match self {
            Self::ChangeBlock { cancelled, .. }
            | Self::SpawnEntity { cancelled, .. }
            | Self::DropItem { cancelled, .. } => *cancelled,
        }
    }
}

/// Number of events posted, by family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    /// Block change events, aggregates included.
    pub block: usize,
    /// Spawn events.
    pub spawn: usize,
    /// Drop events.
    pub drop: usize,
}

/// Dispatches events to listeners in registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn EventListener>>,
    history: Vec<EventRecord>,
    record_history: bool,
    counts: EventCounts,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("history", &self.history.len())
            .field("counts", &self.counts)
            .finish()
    }
}

impl EventBus {
    /// Creates a bus that records history.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(true)
    }

    /// Creates a bus, recording history only if asked to.
    #[must_use]
    pub fn with_history(record_history: bool) -> Self {
        Self {
            record_history,
            ..Self::default()
        }
    }

    /// Registers a listener after all existing ones.
    pub fn register(&mut self, listener: Box<dyn EventListener>) {
        tracing::debug!(listener = listener.name(), "listener registered");
        self.listeners.push(listener);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Posts a block change event.
    pub fn post_block(&mut self, event: &mut ChangeBlockEvent) {
        for listener in &mut self.listeners {
            listener.on_change_block(event);
        }
        self.counts.block += 1;
        tracing::debug!(
            kind = %event.kind(),
            transactions = event.transactions().len(),
            cancelled = event.is_cancelled(),
            "block event posted"
        );
        if self.record_history {
            self.history.push(EventRecord::ChangeBlock {
                kind: event.kind(),
                cause: event.cause().clone(),
                positions: event.transactions().iter().map(|t| t.pos).collect(),
                invalidated: event
                    .transactions()
                    .iter()
                    .filter(|t| !t.is_valid())
                    .map(|t| t.pos)
                    .collect(),
                cancelled: event.is_cancelled(),
            });
        }
    }

    /// Posts a spawn event.
    pub fn post_spawn(&mut self, event: &mut SpawnEntityEvent) {
        for listener in &mut self.listeners {
            listener.on_spawn_entity(event);
        }
        self.counts.spawn += 1;
        tracing::debug!(
            entities = event.entities().len(),
            cancelled = event.is_cancelled(),
            "spawn event posted"
        );
        if self.record_history {
            self.history.push(EventRecord::SpawnEntity {
                cause: event.cause().clone(),
                entities: event.entities().to_vec(),
                cancelled: event.is_cancelled(),
            });
        }
    }

    /// Posts a drop event.
    pub fn post_drop(&mut self, event: &mut DropItemEvent) {
        for listener in &mut self.listeners {
            listener.on_drop_item(event);
        }
        self.counts.drop += 1;
        tracing::debug!(
            entities = event.entities().len(),
            cancelled = event.is_cancelled(),
            "drop event posted"
        );
        if self.record_history {
            self.history.push(EventRecord::DropItem {
                cause: event.cause().clone(),
                entities: event.entities().to_vec(),
                cancelled: event.is_cancelled(),
            });
        }
    }

    /// Recorded events in posting order.
    #[must_use]
    pub fn history(&self) -> &[EventRecord] {
        &self.history
    }

    /// Posted-event counters (kept even without history).
    #[must_use]
    pub const fn counts(&self) -> EventCounts {
        self.counts
    }
}

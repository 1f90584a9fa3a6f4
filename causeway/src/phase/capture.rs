//! Capture collections
//!
//! Every pending side effect of a phase lives in a capture collection owned
//! by that phase's context. Collections are allocated on first use because
//! most activations capture nothing, and their state is always one of
//! [`SupplierState`]'s three variants rather than a nullable handle.

use std::hash::Hash;

use indexmap::IndexMap;
use serde::Serialize;

use causeway_core::types::{BlockPos, Entity, EntityRef, ItemDrop};

use super::transaction::BlockTransaction;

/// Allocation state of a capture collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "len")]
pub enum SupplierState {
    /// Nothing was ever captured.
    Unallocated,
    /// Allocated, currently empty (drained or reset after use).
    Empty,
    /// Holding this many pending items.
    Populated(usize),
}

// ============================================================================
// CaptureSupplier
// ============================================================================

/// Lazily allocated, ordered list of one kind of pending side effect.
#[derive(Debug, Clone)]
pub struct CaptureSupplier<T> {
    items: Option<Vec<T>>,
}

impl<T> Default for CaptureSupplier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CaptureSupplier<T> {
    /// Creates an unallocated supplier.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: None }
    }

    /// Returns the allocation state.
    #[must_use]
    pub fn state(&self) -> SupplierState {
        match &self.items {
            None => SupplierState::Unallocated,
            Some(items) if items.is_empty() => SupplierState::Empty,
            Some(items) => SupplierState::Populated(items.len()),
        }
    }

    /// Returns the backing list, allocating it if needed.
    pub fn get_or_create(&mut self) -> &mut Vec<T> {
        self.items.get_or_insert_with(Vec::new)
    }

    /// Appends one item.
    pub fn push(&mut self, item: T) {
        self.get_or_create().push(item);
    }

    /// Appends every item. An empty iterator does not allocate.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        let mut items = items.into_iter().peekable();
        if items.peek().is_some() {
            self.get_or_create().extend(items);
        }
    }

    /// Drains the captured items into `f`, or skips `f` when nothing was
    /// captured. The allocation is kept for reuse.
    pub fn if_present_and_not_empty<R>(&mut self, f: impl FnOnce(Vec<T>) -> R) -> Option<R> {
        match self.items.as_mut() {
            Some(items) if !items.is_empty() => Some(f(std::mem::take(items))),
            _ => None,
        }
    }

    /// Removes and returns every item, keeping the allocation for reuse.
    pub fn drain(&mut self) -> Vec<T> {
        self.items
            .as_mut()
            .map_or_else(Vec::new, |items| items.drain(..).collect())
    }

    /// Number of captured items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, Vec::len)
    }

    /// Whether nothing is pending (allocated or not).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the captured items in capture order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().flatten()
    }

    /// Keeps only the items matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        if let Some(items) = self.items.as_mut() {
            items.retain(keep);
        }
    }

    /// Returns the supplier to the unallocated state.
    pub fn reset(&mut self) {
        self.items = None;
    }
}

// ============================================================================
// CaptureMap
// ============================================================================

/// Lazily allocated multimap of pending side effects keyed by their owner.
#[derive(Debug, Clone)]
pub struct CaptureMap<K, V> {
    entries: Option<IndexMap<K, Vec<V>>>,
}

impl<K, V> Default for CaptureMap<K, V> {
    fn default() -> Self {
        Self { entries: None }
    }
}

impl<K: Hash + Eq, V> CaptureMap<K, V> {
    /// Creates an unallocated map.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: None }
    }

    /// Returns the allocation state, counting values rather than keys.
    #[must_use]
    pub fn state(&self) -> SupplierState {
        match &self.entries {
            None => SupplierState::Unallocated,
            Some(_) if self.is_empty() => SupplierState::Empty,
            Some(_) => SupplierState::Populated(self.len()),
        }
    }

    /// Appends `value` under `key`.
    pub fn push(&mut self, key: K, value: V) {
        self.entries
            .get_or_insert_with(IndexMap::new)
            .entry(key)
            .or_default()
            .push(value);
    }

    /// Removes and returns the values under `key`.
    pub fn remove(&mut self, key: &K) -> Option<Vec<V>> {
        self.entries.as_mut()?.shift_remove(key)
    }

    /// Removes and returns every entry in insertion order.
    pub fn drain(&mut self) -> Vec<(K, Vec<V>)> {
        self.entries
            .as_mut()
            .map_or_else(Vec::new, |entries| entries.drain(..).collect())
    }

    /// Total number of values across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.values().map(Vec::len).sum())
    }

    /// Whether no values are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the map to the unallocated state.
    pub fn reset(&mut self) {
        self.entries = None;
    }
}

// ============================================================================
// Captures
// ============================================================================

/// Per-collection item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureCounts {
    /// Proposed block transactions.
    pub blocks: usize,
    /// Entities awaiting spawn.
    pub entities: usize,
    /// Item drops awaiting spawn.
    pub items: usize,
    /// Drops keyed by the entity that dropped them.
    pub per_entity_drops: usize,
    /// Drops keyed by the block they came from.
    pub per_block_drops: usize,
}

impl CaptureCounts {
    /// Sum of every count.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.blocks + self.entities + self.items + self.per_entity_drops + self.per_block_drops
    }

    /// Whether every count is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// Every capture collection a phase context can hold.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    /// Proposed block changes, in proposal order.
    pub blocks: CaptureSupplier<BlockTransaction>,
    /// Entities awaiting a spawn event.
    pub entities: CaptureSupplier<Entity>,
    /// Loose item drops.
    pub items: CaptureSupplier<ItemDrop>,
    /// Drops attributed to the entity that produced them.
    pub per_entity_drops: CaptureMap<EntityRef, ItemDrop>,
    /// Drops attributed to the block they came from.
    pub per_block_drops: CaptureMap<BlockPos, ItemDrop>,
}

impl Captures {
    /// Counts the pending items in every collection.
    #[must_use]
    pub fn counts(&self) -> CaptureCounts {
        CaptureCounts {
            blocks: self.blocks.len(),
            entities: self.entities.len(),
            items: self.items.len(),
            per_entity_drops: self.per_entity_drops.len(),
            per_block_drops: self.per_block_drops.len(),
        }
    }

    /// Whether every collection is empty.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.counts().is_zero()
    }

    /// Discards everything still pending and returns what was discarded.
    ///
    /// Block transactions are dropped without touching the world; callers
    /// that wrote them tentatively must restore them first.
    pub fn force_drain(&mut self) -> CaptureCounts {
        let counts = self.counts();
        self.blocks.drain();
        self.entities.drain();
        self.items.drain();
        self.per_entity_drops.drain();
        self.per_block_drops.drain();
        counts
    }

    /// Returns every collection to the unallocated state.
    pub fn reset(&mut self) {
        self.blocks.reset();
        self.entities.reset();
        self.items.reset();
        self.per_entity_drops.reset();
        self.per_block_drops.reset();
    }
}

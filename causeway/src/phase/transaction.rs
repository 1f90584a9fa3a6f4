//! Block transactions
//!
//! A [`BlockTransaction`] is one proposed block change. Once proposed it can
//! only move from valid to invalid. A [`TransactionBatch`] holds the
//! transactions of one unwind in proposal order and owns the two world
//! mutations that resolve them: restoring invalid transactions newest first,
//! then applying the valid ones oldest first.

use serde::Serialize;

use causeway_core::types::{BlockPos, BlockState, ChangeCategory, WorldId};

use crate::world::World;

/// A proposed block change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockTransaction {
    /// Position in proposal order within its batch.
    pub index: usize,
    /// World the block is in.
    pub world: WorldId,
    /// Block coordinates.
    pub pos: BlockPos,
    /// State before the proposal.
    pub original: BlockState,
    /// Proposed state.
    pub proposed: BlockState,
    /// Event grouping category.
    pub category: ChangeCategory,
    valid: bool,
}

impl BlockTransaction {
    /// Creates a valid transaction.
    #[must_use]
    pub fn new(
        index: usize,
        world: WorldId,
        pos: BlockPos,
        original: BlockState,
        proposed: BlockState,
    ) -> Self {
        let category = ChangeCategory::classify(&original, &proposed);
        Self {
            index,
            world,
            pos,
            original,
            proposed,
            category,
            valid: true,
        }
    }

    /// Whether the transaction will be applied.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Marks the transaction invalid. There is no way back.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Transactions of one unwind, in proposal order.
#[derive(Debug, Clone, Default)]
pub struct TransactionBatch {
    transactions: Vec<BlockTransaction>,
}

impl TransactionBatch {
    /// Wraps transactions, renumbering them in the given order.
    #[must_use]
    pub fn new(mut transactions: Vec<BlockTransaction>) -> Self {
        for (index, txn) in transactions.iter_mut().enumerate() {
            txn.index = index;
        }
        Self { transactions }
    }

    /// Number of transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Iterates in proposal order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockTransaction> {
        self.transactions.iter()
    }

    /// Clones of the valid transactions.
    #[must_use]
    pub fn valid(&self) -> Vec<BlockTransaction> {
        self.transactions.iter().filter(|t| t.valid).cloned().collect()
    }

    /// Valid transactions grouped by category.
    ///
    /// Groups come in the fixed order break, place, modify; empty groups
    /// are omitted. Proposal order is kept within each group.
    #[must_use]
    pub fn group_by_category(&self) -> Vec<(ChangeCategory, Vec<BlockTransaction>)> {
        ChangeCategory::all()
            .into_iter()
            .filter_map(|category| {
                let group: Vec<_> = self
                    .transactions
                    .iter()
                    .filter(|t| t.valid && t.category == category)
                    .cloned()
                    .collect();
                (!group.is_empty()).then_some((category, group))
            })
            .collect()
    }

    /// Invalidates the transactions with the given indices.
    pub fn invalidate_indices(&mut self, indices: impl IntoIterator<Item = usize>) {
        for index in indices {
            if let Some(txn) = self.transactions.get_mut(index) {
                txn.invalidate();
            }
        }
    }

    /// Invalidates every transaction.
    pub fn invalidate_all(&mut self) {
        for txn in &mut self.transactions {
            txn.invalidate();
        }
    }

    /// Positions of invalid transactions, in proposal order.
    #[must_use]
    pub fn invalid_positions(&self) -> Vec<(WorldId, BlockPos)> {
        self.transactions
            .iter()
            .filter(|t| !t.valid)
            .map(|t| (t.world.clone(), t.pos))
            .collect()
    }

    /// Restores every invalid transaction to its original state, newest
    /// first, and returns them in restoration order.
    pub fn restore_invalid(&self, world: &mut World) -> Vec<BlockTransaction> {
        let mut restored = Vec::new();
        for txn in self.transactions.iter().rev().filter(|t| !t.valid) {
            tracing::trace!(index = txn.index, pos = %txn.pos, state = %txn.original, "restoring block");
            world.write_block(&txn.world, txn.pos, txn.original.clone());
            restored.push(txn.clone());
        }
        restored
    }

    /// Commits every valid transaction, oldest first, and returns them.
    pub fn apply_valid(&self, world: &mut World) -> Vec<BlockTransaction> {
        let mut applied = Vec::new();
        for txn in self.transactions.iter().filter(|t| t.valid) {
            world.commit_block(&txn.world, txn.pos, txn.original.clone(), txn.proposed.clone());
            applied.push(txn.clone());
        }
        applied
    }

    /// Invalidates and restores the whole batch.
    pub fn restore_all(&mut self, world: &mut World) -> Vec<BlockTransaction> {
        self.invalidate_all();
        self.restore_invalid(world)
    }
}

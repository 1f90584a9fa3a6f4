//! Unwind pipelines
//!
//! The machinery every [`PhaseState::unwind`](super::state::PhaseState::unwind)
//! is assembled from. Block captures go through the category-grouped event
//! pipeline; entity and item captures are deferred into the Post frame (or
//! flushed straight away when the unwinding phase has none).

use causeway_core::cause::{Cause, CauseRole, CauseValue, DROPPER_KEY, SpawnType};
use causeway_core::types::{Entity, EntityRef, ItemDrop};

use crate::error::UnwindError;
use crate::event::{ChangeBlockEvent, ChangeBlockKind, DropItemEvent, EventBus, SpawnEntityEvent};
use crate::observability::metrics;
use crate::world::World;

use super::context::PhaseContext;
use super::state::{POST, PhaseState, SpawnDisposition};
use super::tracker::PopReport;
use super::transaction::{BlockTransaction, TransactionBatch};

// ============================================================================
// Block pipeline
// ============================================================================

/// Result of running a batch through the block pipeline.
#[derive(Debug, Clone, Default)]
pub struct BlockOutcome {
    /// Events posted, aggregate included.
    pub events: usize,
    /// Committed transactions, oldest first.
    pub applied: Vec<BlockTransaction>,
    /// Restored transactions, newest first.
    pub restored: Vec<BlockTransaction>,
}

/// Posts one event per change category plus an aggregate post event, then
/// restores vetoed transactions newest first and commits the rest oldest
/// first.
///
/// The world must already hold the proposed states as tentative writes.
pub fn run_block_pipeline(
    world: &mut World,
    bus: &mut EventBus,
    cause: &Cause,
    batch: &mut TransactionBatch,
) -> BlockOutcome {
    if batch.is_empty() {
        return BlockOutcome::default();
    }

    let mut events = 0;
    for (category, group) in batch.group_by_category() {
        let mut event = ChangeBlockEvent::new(category.into(), cause.clone(), group);
        bus.post_block(&mut event);
        events += 1;
        apply_vetoes(batch, &event);
    }

    let survivors = batch.valid();
    if !survivors.is_empty() {
        let mut event = ChangeBlockEvent::new(ChangeBlockKind::Post, cause.clone(), survivors);
        bus.post_block(&mut event);
        events += 1;
        apply_vetoes(batch, &event);
    }

    let restored = batch.restore_invalid(world);
    let applied = batch.apply_valid(world);
    if !restored.is_empty() {
        tracing::warn!(
            restored = restored.len(),
            applied = applied.len(),
            cause = %cause,
            "vetoed block changes restored"
        );
    }
    metrics::record_transactions("applied", applied.len());
    metrics::record_transactions("restored", restored.len());

    BlockOutcome {
        events,
        applied,
        restored,
    }
}

fn apply_vetoes(batch: &mut TransactionBatch, event: &ChangeBlockEvent) {
    if event.is_cancelled() {
        batch.invalidate_indices(event.transactions().iter().map(|t| t.index));
    } else {
        batch.invalidate_indices(event.invalidated_indices());
    }
}

// ============================================================================
// Spawn and drop flushing
// ============================================================================

/// Posts one spawn event for `entities` and spawns the survivors.
pub(crate) fn flush_spawns(
    world: &mut World,
    bus: &mut EventBus,
    cause: Cause,
    entities: Vec<Entity>,
    report: &mut PopReport,
) {
    if entities.is_empty() {
        return;
    }
    let mut event = SpawnEntityEvent::new(cause, entities);
    bus.post_spawn(&mut event);
    report.spawn_events += 1;
    let survivors = event.into_survivors();
    metrics::record_spawns("entity", survivors.len());
    report.spawned += survivors.len();
    for entity in survivors {
        world.spawn(entity);
    }
}

/// Converts `drops` to item entities, posts one drop event, and spawns the
/// survivors.
pub(crate) fn flush_drops(
    world: &mut World,
    bus: &mut EventBus,
    cause: Cause,
    drops: Vec<ItemDrop>,
    report: &mut PopReport,
) {
    if drops.is_empty() {
        return;
    }
    let items = drops.into_iter().map(Entity::item_entity).collect();
    let mut event = DropItemEvent::new(cause, items);
    bus.post_drop(&mut event);
    report.drop_events += 1;
    let survivors = event.into_survivors();
    metrics::record_spawns("item", survivors.len());
    report.spawned += survivors.len();
    for item in survivors {
        world.spawn(item);
    }
}

/// Merges drops of the same item landing in the same block.
#[must_use]
pub fn merge_drops(drops: Vec<ItemDrop>) -> Vec<ItemDrop> {
    let mut merged: Vec<ItemDrop> = Vec::with_capacity(drops.len());
    for drop in drops {
        match merged.iter_mut().find(|m| m.can_merge_with(&drop)) {
            Some(existing) => {
                existing.stack.quantity = existing.stack.quantity.saturating_add(drop.stack.quantity);
            }
            None => merged.push(drop),
        }
    }
    merged
}

// ============================================================================
// Unwind scope
// ============================================================================

/// Everything an unwinding state may touch.
pub struct UnwindScope<'a> {
    world: &'a mut World,
    bus: &'a mut EventBus,
    cause: Cause,
    spawn_type: SpawnType,
    post: Option<&'a mut PhaseContext>,
    report: &'a mut PopReport,
}

impl<'a> UnwindScope<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        bus: &'a mut EventBus,
        cause: Cause,
        spawn_type: SpawnType,
        post: Option<&'a mut PhaseContext>,
        report: &'a mut PopReport,
    ) -> Self {
        Self {
            world,
            bus,
            cause,
            spawn_type,
            post,
            report,
        }
    }

    /// Cause of the unwinding phase.
    #[must_use]
    pub const fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Read access to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        self.world
    }

    /// Runs `batch` through the block pipeline under this scope's cause.
    pub fn process_blocks(&mut self, batch: &mut TransactionBatch) -> BlockOutcome {
        let outcome = run_block_pipeline(self.world, self.bus, &self.cause, batch);
        self.report.block_events += outcome.events;
        self.report.applied += outcome.applied.len();
        self.report.restored += outcome.restored.len();
        outcome
    }

    /// Hands `entity` to the Post frame, or spawns it now if there is none.
    pub fn defer_entity(&mut self, entity: Entity) {
        let entity = match self.post.as_deref_mut() {
            Some(post) => match POST.spawn_entity_or_capture(post, entity) {
                SpawnDisposition::Captured => return,
                SpawnDisposition::Immediate(entity) => entity,
            },
            None => entity,
        };
        let cause = self.cause.with_spawn_cause(self.spawn_type.clone());
        flush_spawns(self.world, self.bus, cause, vec![entity], self.report);
    }

    /// Hands `drop` to the Post frame, or drops it now if there is none.
    pub fn defer_drop(&mut self, drop: ItemDrop) {
        if let Some(post) = self.post.as_deref_mut() {
            post.captures.items.push(drop);
            return;
        }
        let cause = self.cause.with_spawn_cause(SpawnType::Dropped);
        flush_drops(self.world, self.bus, cause, vec![drop], self.report);
    }

    /// Fires a drop event for `drops` attributed to `dropper`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dropper cannot be added to the cause.
    pub fn fire_entity_drops(
        &mut self,
        dropper: EntityRef,
        drops: Vec<ItemDrop>,
    ) -> Result<(), UnwindError> {
        let cause = self
            .cause
            .with(
                CauseRole::Named(DROPPER_KEY.to_owned()),
                CauseValue::Entity(dropper),
            )?
            .with_spawn_cause(SpawnType::Dropped);
        flush_drops(self.world, self.bus, cause, drops, self.report);
        Ok(())
    }

    /// Records drops thrown away because their block was restored.
    pub fn discard_drops(&mut self, count: usize) {
        self.report.discarded_drops += count;
    }
}

// ============================================================================
// Building blocks for unwind implementations
// ============================================================================

/// Unwinds captured block changes and the per-block drops that go with
/// them. Drops for restored positions are discarded.
pub fn unwind_blocks(ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>) {
    let restored = ctx
        .captures
        .blocks
        .if_present_and_not_empty(|txns| {
            let mut batch = TransactionBatch::new(txns);
            scope.process_blocks(&mut batch);
            batch.invalid_positions()
        })
        .unwrap_or_default();

    for (_, pos) in restored {
        if let Some(drops) = ctx.captures.per_block_drops.remove(&pos) {
            tracing::debug!(pos = %pos, drops = drops.len(), "discarding drops of restored block");
            scope.discard_drops(drops.len());
        }
    }
    for (_, drops) in ctx.captures.per_block_drops.drain() {
        for drop in drops {
            scope.defer_drop(drop);
        }
    }
}

/// Attributes captured entities to the cause and defers them.
pub fn unwind_entities(ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>) {
    ctx.captures.entities.if_present_and_not_empty(|entities| {
        for mut entity in entities {
            attribute(&mut entity, scope.cause());
            scope.defer_entity(entity);
        }
    });
}

/// Defers loose drops, merging them first unless `pre_merge` is false.
pub fn unwind_items(ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>, pre_merge: bool) {
    ctx.captures.items.if_present_and_not_empty(|drops| {
        let drops = if pre_merge { merge_drops(drops) } else { drops };
        for drop in drops {
            scope.defer_drop(drop);
        }
    });
}

/// Fires one drop event per dropping entity.
///
/// # Errors
///
/// Propagates failures to extend the cause.
pub fn unwind_entity_drops(
    ctx: &mut PhaseContext,
    scope: &mut UnwindScope<'_>,
) -> Result<(), UnwindError> {
    for (dropper, drops) in ctx.captures.per_entity_drops.drain() {
        scope.fire_entity_drops(dropper, drops)?;
    }
    Ok(())
}

/// Runs every pipeline in order: blocks, entity drops, entities, items.
///
/// # Errors
///
/// Propagates failures to extend the cause.
pub fn unwind_all(
    state: &dyn PhaseState,
    ctx: &mut PhaseContext,
    scope: &mut UnwindScope<'_>,
) -> Result<(), UnwindError> {
    unwind_blocks(ctx, scope);
    unwind_entity_drops(ctx, scope)?;
    unwind_entities(ctx, scope);
    unwind_items(ctx, scope, !state.ignores_item_pre_merging());
    Ok(())
}

/// Stamps creator and notifier from player entries of `cause`, keeping
/// attribution that is already present.
pub fn attribute(entity: &mut Entity, cause: &Cause) {
    if entity.creator.is_none() {
        entity.creator = cause.source().and_then(CauseValue::as_player).map(|p| p.id);
    }
    if entity.notifier.is_none() {
        entity.notifier = cause.notifier().and_then(CauseValue::as_player).map(|p| p.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::types::{BlockPos, BlockState, EntityKind, ItemStack, Location, PlayerRef, WorldId};

    use crate::event::EventListener;

    fn drop_at(x: f64, item: &str, quantity: u32) -> ItemDrop {
        ItemDrop::new(
            Location::new(WorldId::default(), x, 64.0, 0.0),
            ItemStack::new(item, quantity),
        )
    }

    fn proposed(world: &mut World, txns: &mut Vec<BlockTransaction>, x: i32, to: &str) {
        let id = world.id().clone();
        let pos = BlockPos::new(x, 64, 0);
        let original = world.block(pos);
        world.write_block(&id, pos, BlockState::new(to));
        txns.push(BlockTransaction::new(txns.len(), id, pos, original, BlockState::new(to)));
    }

    struct CancelAggregate;

    impl EventListener for CancelAggregate {
        fn on_change_block(&mut self, event: &mut ChangeBlockEvent) {
            if event.kind() == ChangeBlockKind::Post {
                event.set_cancelled(true);
            }
        }
    }

    #[test]
    fn merge_combines_same_item_in_same_block() {
        let merged = merge_drops(vec![
            drop_at(0.2, "minecraft:dirt", 1),
            drop_at(0.7, "minecraft:dirt", 2),
            drop_at(0.5, "minecraft:stone", 1),
            drop_at(3.5, "minecraft:dirt", 1),
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].stack.quantity, 3);
    }

    #[test]
    fn pipeline_posts_categories_then_aggregate() {
        let mut world = World::default();
        let mut bus = EventBus::new();
        let mut txns = Vec::new();
        proposed(&mut world, &mut txns, 0, "minecraft:stone");
        proposed(&mut world, &mut txns, 1, "minecraft:stone");
        let mut batch = TransactionBatch::new(txns);

        let cause = Cause::of(CauseValue::Text("test".into()));
        let outcome = run_block_pipeline(&mut world, &mut bus, &cause, &mut batch);

        assert_eq!(outcome.events, 2);
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(world.changes().len(), 2);
    }

    #[test]
    fn cancelled_aggregate_restores_everything() {
        let mut world = World::default();
        let mut bus = EventBus::new();
        bus.register(Box::new(CancelAggregate));
        let mut txns = Vec::new();
        proposed(&mut world, &mut txns, 0, "minecraft:stone");
        proposed(&mut world, &mut txns, 1, "minecraft:dirt");
        let mut batch = TransactionBatch::new(txns);

        let cause = Cause::of(CauseValue::Text("test".into()));
        let outcome = run_block_pipeline(&mut world, &mut bus, &cause, &mut batch);

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.restored.len(), 2);
        assert!(world.block(BlockPos::new(0, 64, 0)).is_air());
        assert!(world.changes().is_empty());
    }

    #[test]
    fn empty_batch_posts_nothing() {
        let mut world = World::default();
        let mut bus = EventBus::new();
        let cause = Cause::of(CauseValue::Text("test".into()));
        let outcome = run_block_pipeline(&mut world, &mut bus, &cause, &mut TransactionBatch::default());
        assert_eq!(outcome.events, 0);
        assert_eq!(bus.counts().block, 0);
    }

    #[test]
    fn attribute_uses_player_source_and_keeps_existing() {
        let alice = PlayerRef::named("alice");
        let cause = Cause::of(CauseValue::Player(alice.clone()));
        let mut pig = Entity::new(
            EntityKind::new("minecraft:pig"),
            Location::new(WorldId::default(), 0.0, 0.0, 0.0),
        );
        attribute(&mut pig, &cause);
        assert_eq!(pig.creator, Some(alice.id));
        assert_eq!(pig.notifier, None);

        let bob = PlayerRef::named("bob");
        attribute(&mut pig, &Cause::of(CauseValue::Player(bob)));
        assert_eq!(pig.creator, Some(alice.id));
    }

    struct CancelBreaks;

    impl EventListener for CancelBreaks {
        fn on_change_block(&mut self, event: &mut ChangeBlockEvent) {
            if event.kind() == ChangeBlockKind::Break {
                event.set_cancelled(true);
            }
        }
    }

    #[test]
    fn unwind_blocks_discards_drops_of_restored_positions_only() {
        let mut world = World::default();
        let id = world.id().clone();
        world.write_block(&id, BlockPos::new(1, 64, 0), BlockState::new("minecraft:stone"));
        let mut bus = EventBus::new();
        bus.register(Box::new(CancelBreaks));

        let mut ctx = PhaseContext::command(PlayerRef::named("alice"), "/fill");
        let mut txns = Vec::new();
        proposed(&mut world, &mut txns, 0, "minecraft:stone");
        proposed(&mut world, &mut txns, 1, "minecraft:air");
        ctx.captures.blocks.extend(txns);
        ctx.captures
            .per_block_drops
            .push(BlockPos::new(0, 64, 0), drop_at(0.5, "minecraft:dirt", 1));
        ctx.captures
            .per_block_drops
            .push(BlockPos::new(1, 64, 0), drop_at(1.5, "minecraft:stone", 1));

        let mut report = PopReport::default();
        let mut scope = UnwindScope::new(
            &mut world,
            &mut bus,
            Cause::of(CauseValue::Text("test".into())),
            SpawnType::Placement,
            None,
            &mut report,
        );
        unwind_blocks(&mut ctx, &mut scope);

        assert!(ctx.captures.is_drained());
        assert_eq!(report.applied, 1);
        assert_eq!(report.restored, 1);
        assert_eq!(report.discarded_drops, 1);
        assert_eq!(report.drop_events, 1);
        assert_eq!(world.block(BlockPos::new(1, 64, 0)), BlockState::new("minecraft:stone"));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn unwind_with_nothing_captured_posts_nothing() {
        let mut world = World::default();
        let mut bus = EventBus::new();
        let mut ctx = PhaseContext::command(PlayerRef::named("alice"), "/say hi");
        let mut report = PopReport::default();
        let mut scope = UnwindScope::new(
            &mut world,
            &mut bus,
            Cause::of(CauseValue::Text("test".into())),
            SpawnType::Placement,
            None,
            &mut report,
        );
        unwind_blocks(&mut ctx, &mut scope);
        unwind_entities(&mut ctx, &mut scope);
        unwind_items(&mut ctx, &mut scope, true);

        assert_eq!(bus.counts().block, 0);
        assert_eq!(report.drop_events + report.spawn_events, 0);
        assert_eq!(
            ctx.captures.blocks.state(),
            crate::phase::capture::SupplierState::Unallocated
        );
    }

    #[test]
    fn scope_without_post_flushes_immediately() {
        let mut world = World::default();
        let mut bus = EventBus::new();
        let mut report = PopReport::default();
        let mut scope = UnwindScope::new(
            &mut world,
            &mut bus,
            Cause::of(CauseValue::Text("test".into())),
            SpawnType::Placement,
            None,
            &mut report,
        );
        scope.defer_drop(drop_at(0.0, "minecraft:dirt", 1));
        assert_eq!(report.drop_events, 1);
        assert_eq!(world.entity_count(), 1);
    }
}

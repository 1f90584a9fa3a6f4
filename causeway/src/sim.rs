//! Simulation host
//!
//! [`Simulation`] owns a tracker, the world it mutates, and the event bus.
//! Its mutation entry points ask the current phase state whether a change
//! is captured for later or applied on the spot, so game logic written
//! against it never has to know which activity it runs under.

use causeway_core::config::TrackerConfig;
use causeway_core::types::{
    BlockPos, BlockState, Entity, EntityId, EntityRef, Explosion, ItemDrop, ItemStack, Location,
    WorldId,
};

use crate::error::PhaseError;
use crate::event::{EventBus, EventListener};
use crate::phase::pipeline::run_block_pipeline;
use crate::phase::state::{self, PhaseKind, SpawnDisposition};
use crate::phase::{BlockTransaction, PhaseContext, PhaseTracker, PopReport, TransactionBatch};
use crate::world::World;

/// A tracker, a world, and an event bus driven from one tick thread.
#[derive(Debug)]
pub struct Simulation {
    tracker: PhaseTracker,
    world: World,
    bus: EventBus,
}

impl Simulation {
    /// Creates a simulation over `world`.
    #[must_use]
    pub fn new(config: TrackerConfig, world: World) -> Self {
        Self {
            bus: EventBus::with_history(config.record_history),
            tracker: PhaseTracker::new(config),
            world,
        }
    }

    /// The phase tracker.
    #[must_use]
    pub const fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The event bus.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Registers a listener after all existing ones.
    pub fn register_listener(&mut self, listener: Box<dyn EventListener>) {
        self.bus.register(listener);
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// Starts tracking an activity of `kind`.
    ///
    /// # Errors
    ///
    /// Returns the tracker's refusal; the stack is left unchanged.
    pub fn begin(&mut self, kind: PhaseKind, context: PhaseContext) -> Result<(), PhaseError> {
        self.tracker.push_phase(state::for_kind(kind), context)
    }

    /// Stops tracking the current activity and unwinds its captures.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is tracked or the unwind failed.
    pub fn end(&mut self) -> Result<PopReport, PhaseError> {
        self.tracker.pop_phase(&mut self.world, &mut self.bus)
    }

    /// Runs `body` inside an activity of `kind`.
    ///
    /// `body` must leave the stack as it found it.
    ///
    /// # Errors
    ///
    /// Returns the push refusal (without running `body`) or the pop error.
    pub fn run_phase<T>(
        &mut self,
        kind: PhaseKind,
        context: PhaseContext,
        body: impl FnOnce(&mut Self) -> T,
    ) -> Result<(T, PopReport), PhaseError> {
        self.begin(kind, context)?;
        let value = body(self);
        let report = self.end()?;
        Ok((value, report))
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Current state at `pos` in the default world, tentative writes included.
    #[must_use]
    pub fn block_at(&self, pos: BlockPos) -> BlockState {
        self.world.block(pos)
    }

    /// Changes the block at `pos` in the default world.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) {
        let world = self.world.id().clone();
        self.set_block_in(&world, pos, state);
    }

    /// Changes the block at `pos` in `world`.
    ///
    /// Under a capturing phase the world is written tentatively and a
    /// transaction recorded. Phases without bulk capture run the change
    /// through the block pipeline straight away. Anything else commits now.
    pub fn set_block_in(&mut self, world: &WorldId, pos: BlockPos, state: BlockState) {
        let Some((phase, ctx)) = self.tracker.current_mut() else {
            self.world.set_block_now(world, pos, state);
            return;
        };
        if !phase.should_capture_block_change_or_skip(ctx, pos) {
            tracing::trace!(phase = phase.name(), pos = %pos, "block change applied uncaptured");
            self.world.set_block_now(world, pos, state);
            return;
        }

        let original = self.world.block_at(world, pos);
        if original == state {
            return;
        }
        self.world.write_block(world, pos, state.clone());
        let txn = BlockTransaction::new(
            ctx.captures.blocks.len(),
            world.clone(),
            pos,
            original.clone(),
            state,
        );

        if phase.does_bulk_block_capture() {
            ctx.captures.blocks.push(txn);
            return;
        }

        match phase.build_cause(ctx) {
            Ok(cause) => {
                let mut batch = TransactionBatch::new(vec![txn]);
                run_block_pipeline(&mut self.world, &mut self.bus, &cause, &mut batch);
            }
            Err(error) => {
                self.world.write_block(world, pos, original);
                tracing::error!(phase = phase.name(), pos = %pos, "block change dropped: {error}");
            }
        }
    }

    /// Breaks every block within the explosion's radius, registering each
    /// broken block's drop against its position. Returns how many blocks
    /// the blast proposed to break.
    pub fn blast(&mut self, explosion: &Explosion) -> usize {
        if !explosion.breaks_blocks {
            return 0;
        }
        let world = explosion.location.world.clone();
        let centre = explosion.location.block_pos();
        let reach = f64::from(explosion.radius).powi(2);

        let targets: Vec<(BlockPos, BlockState)> = self
            .world
            .blocks()
            .filter(|(w, pos, _)| **w == world && distance_squared(centre, *pos) <= reach)
            .map(|(_, pos, state)| (pos, state.clone()))
            .collect();

        for (pos, state) in &targets {
            self.set_block_in(&world, *pos, BlockState::air());
            let drop = ItemDrop::new(
                Location::at_block(world.clone(), *pos),
                ItemStack::new(state.0.clone(), 1),
            );
            self.drop_item_at_block(*pos, drop);
        }
        tracing::debug!(centre = %centre, broken = targets.len(), "blast resolved");
        targets.len()
    }

    // ========================================================================
    // Entities and items
    // ========================================================================

    /// Spawns `entity`, or captures it under the current phase.
    ///
    /// Returns the id when the entity entered the world immediately.
    pub fn spawn_entity(&mut self, entity: Entity) -> Option<EntityId> {
        let entity = match self.tracker.current_mut() {
            Some((phase, ctx)) => match phase.spawn_entity_or_capture(ctx, entity) {
                SpawnDisposition::Captured => return None,
                SpawnDisposition::Immediate(entity) => entity,
            },
            None => entity,
        };
        Some(self.world.spawn(entity))
    }

    /// Drops an item, or captures it under the current phase.
    pub fn drop_item(&mut self, drop: ItemDrop) {
        match self.tracker.current_mut() {
            Some((phase, ctx)) if phase.captures_entities() => ctx.captures.items.push(drop),
            _ => {
                self.world.spawn(Entity::item_entity(drop));
            }
        }
    }

    /// Drops an item produced by `dropper`. Phases that do not track drops
    /// per entity treat it as a loose drop.
    pub fn drop_item_for_entity(&mut self, dropper: EntityRef, drop: ItemDrop) {
        match self.tracker.current_mut() {
            Some((phase, ctx)) if phase.tracks_entity_specific_drops() => {
                ctx.captures.per_entity_drops.push(dropper, drop);
            }
            _ => self.drop_item(drop),
        }
    }

    /// Drops an item produced by the block at `pos`. Phases that do not
    /// track drops per block treat it as a loose drop.
    pub fn drop_item_at_block(&mut self, pos: BlockPos, drop: ItemDrop) {
        match self.tracker.current_mut() {
            Some((phase, ctx)) if phase.tracks_block_specific_drops() => {
                ctx.captures.per_block_drops.push(pos, drop);
            }
            _ => self.drop_item(drop),
        }
    }

    /// Removes the first entity of `kind` and drops `loot` where it stood.
    ///
    /// Returns `false` when no such entity exists.
    pub fn kill_entity(&mut self, kind: &str, loot: Vec<ItemStack>) -> bool {
        let Some(id) = self.world.find_entity(kind).map(|e| e.id) else {
            return false;
        };
        let Some(victim) = self.world.remove_entity(id) else {
            return false;
        };
        let dropper = victim.handle();
        for stack in loot {
            let drop = ItemDrop::new(victim.location.clone(), stack);
            self.drop_item_for_entity(dropper.clone(), drop);
        }
        true
    }
}

fn distance_squared(a: BlockPos, b: BlockPos) -> f64 {
    let dx = f64::from(a.x - b.x);
    let dy = f64::from(a.y - b.y);
    let dz = f64::from(a.z - b.z);
    dz.mul_add(dz, dx.mul_add(dx, dy * dy))
}

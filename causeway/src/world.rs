//! In-memory world
//!
//! The world is the collaborator the phase engine mutates: block states
//! keyed by world and position, live entities, and a log of committed block
//! changes. It knows nothing about phases; the engine decides when a write is
//! tentative and when it is committed.

use indexmap::IndexMap;
use serde::Serialize;

use causeway_core::config::WorldSeed;
use causeway_core::types::{
    BlockPos, BlockSnapshot, BlockState, Entity, EntityId, EntityKind, Location, WorldId,
};

/// A committed block change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockChange {
    /// World the block is in.
    pub world: WorldId,
    /// Block coordinates.
    pub pos: BlockPos,
    /// State before the change.
    pub from: BlockState,
    /// State after the change.
    pub to: BlockState,
}

/// Blocks, entities, and the committed change log.
#[derive(Debug, Default)]
pub struct World {
    id: WorldId,
    blocks: IndexMap<(WorldId, BlockPos), BlockState>,
    entities: IndexMap<EntityId, Entity>,
    changes: Vec<BlockChange>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Creates a world populated from a scenario seed.
    #[must_use]
    pub fn from_seed(seed: &WorldSeed) -> Self {
        let mut world = Self::new(seed.id.clone());
        for block in &seed.blocks {
            world.write_block(&seed.id, block.pos, BlockState::new(block.state.clone()));
        }
        for entity in &seed.entities {
            world.spawn(Entity::new(
                EntityKind::new(entity.kind.clone()),
                Location::at_block(seed.id.clone(), entity.pos),
            ));
        }
        world
    }

    /// The default world identity.
    #[must_use]
    pub const fn id(&self) -> &WorldId {
        &self.id
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Current state at `pos` in `world`, tentative writes included.
    #[must_use]
    pub fn block_at(&self, world: &WorldId, pos: BlockPos) -> BlockState {
        self.blocks
            .get(&(world.clone(), pos))
            .cloned()
            .unwrap_or_default()
    }

    /// Current state at `pos` in the default world.
    #[must_use]
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.block_at(&self.id, pos)
    }

    /// Snapshot of the block at `pos` in `world`.
    #[must_use]
    pub fn snapshot(&self, world: &WorldId, pos: BlockPos) -> BlockSnapshot {
        BlockSnapshot::new(world.clone(), pos, self.block_at(world, pos))
    }

    /// Writes a block without recording a change.
    ///
    /// Used for tentative writes and for reverting them.
    pub fn write_block(&mut self, world: &WorldId, pos: BlockPos, state: BlockState) {
        let key = (world.clone(), pos);
        if state.is_air() {
            self.blocks.shift_remove(&key);
        } else {
            self.blocks.insert(key, state);
        }
    }

    /// Writes a block and records the change in the log.
    pub fn commit_block(&mut self, world: &WorldId, pos: BlockPos, from: BlockState, to: BlockState) {
        self.write_block(world, pos, to.clone());
        self.changes.push(BlockChange {
            world: world.clone(),
            pos,
            from,
            to,
        });
    }

    /// Replaces the block at `pos` immediately and records the change.
    pub fn set_block_now(&mut self, world: &WorldId, pos: BlockPos, state: BlockState) -> BlockChange {
        let from = self.block_at(world, pos);
        self.commit_block(world, pos, from.clone(), state.clone());
        BlockChange {
            world: world.clone(),
            pos,
            from,
            to: state,
        }
    }

    /// Committed changes in commit order.
    #[must_use]
    pub fn changes(&self) -> &[BlockChange] {
        &self.changes
    }

    /// Every non-air block, in first-write order.
    pub fn blocks(&self) -> impl Iterator<Item = (&WorldId, BlockPos, &BlockState)> {
        self.blocks
            .iter()
            .map(|((world, pos), state)| (world, *pos, state))
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// Adds an entity to the world.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        tracing::trace!(entity = %id, kind = %entity.kind, "entity spawned");
        self.entities.insert(id, entity);
        id
    }

    /// Removes an entity.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.shift_remove(&id)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// First entity of `kind`, in spawn order.
    #[must_use]
    pub fn find_entity(&self, kind: &str) -> Option<&Entity> {
        self.entities.values().find(|e| e.kind.0 == kind)
    }

    /// Every entity, in spawn order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

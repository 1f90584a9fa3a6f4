//! Simulation value types
//!
//! Snapshots and handles for the things a phase can touch: blocks,
//! entities, players, item drops, and explosions. Everything here is a
//! plain value; the engine refers to live objects by identity only.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Worlds and Positions
// ============================================================================

/// Identity of a loaded world.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl WorldId {
    /// Creates a new `WorldId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new("world")
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dimension a location belongs to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// The default surface dimension.
    #[default]
    Overworld,
    /// The nether.
    Nether,
    /// The end.
    End,
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A precise location within a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World the location is in.
    #[serde(default)]
    pub world: WorldId,
    /// Dimension of the world.
    #[serde(default)]
    pub dimension: Dimension,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Location {
    /// Creates an overworld location.
    #[must_use]
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            dimension: Dimension::Overworld,
            x,
            y,
            z,
        }
    }

    /// Creates a location at the centre of a block.
    #[must_use]
    pub fn at_block(world: WorldId, pos: BlockPos) -> Self {
        Self::new(
            world,
            f64::from(pos.x) + 0.5,
            f64::from(pos.y),
            f64::from(pos.z) + 0.5,
        )
    }

    /// Returns the block containing this location.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn block_pos(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

// ============================================================================
// Blocks
// ============================================================================

/// A block state identifier such as `"minecraft:stone"`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockState(pub String);

impl BlockState {
    /// Identifier of the empty block.
    pub const AIR: &'static str = "minecraft:air";

    /// Creates a block state from an identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the air block state.
    #[must_use]
    pub fn air() -> Self {
        Self::new(Self::AIR)
    }

    /// Returns whether this is the air block.
    #[must_use]
    pub fn is_air(&self) -> bool {
        self.0 == Self::AIR
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A block state captured at a position at some instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockSnapshot {
    /// World the block is in.
    pub world: WorldId,
    /// Block coordinates.
    pub pos: BlockPos,
    /// Captured state.
    pub state: BlockState,
}

impl BlockSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub const fn new(world: WorldId, pos: BlockPos, state: BlockState) -> Self {
        Self { world, pos, state }
    }
}

/// How a block change is classified for event grouping.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    /// A solid block became air.
    Break,
    /// Air became a solid block.
    Place,
    /// A solid block became a different solid block.
    Modify,
}

impl ChangeCategory {
    /// Classifies a change from `original` to `proposed`.
    #[must_use]
    pub fn classify(original: &BlockState, proposed: &BlockState) -> Self {
        match (original.is_air(), proposed.is_air()) {
            (false, true) => Self::Break,
            (true, false) => Self::Place,
            _ => Self::Modify,
        }
    }

    /// All categories in event-firing order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Break, Self::Place, Self::Modify]
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Break => write!(f, "break"),
            Self::Place => write!(f, "place"),
            Self::Modify => write!(f, "modify"),
        }
    }
}

// ============================================================================
// Entities and Players
// ============================================================================

/// Unique identity of an entity.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generates a fresh random entity id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity type identifier such as `"minecraft:zombie"`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(pub String);

impl EntityKind {
    /// Identifier used for dropped item entities.
    pub const ITEM: &'static str = "minecraft:item";

    /// Creates an entity kind.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lightweight handle to an entity, used in causes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity identity.
    pub id: EntityId,
    /// Entity type.
    pub kind: EntityKind,
}

/// Lightweight handle to a connected player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Player profile identity.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

impl PlayerRef {
    /// Creates a player handle with a name-derived identity.
    ///
    /// The same name always yields the same id, which keeps scenario files
    /// free of raw UUIDs.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes());
        Self { id, name }
    }
}

/// A live (or candidate) entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identity.
    pub id: EntityId,
    /// Entity type.
    pub kind: EntityKind,
    /// Where the entity is.
    pub location: Location,
    /// Profile of whoever created the entity, if attributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Uuid>,
    /// Profile of whoever last notified the entity, if attributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifier: Option<Uuid>,
    /// Carried stack for item entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemStack>,
}

impl Entity {
    /// Creates an unattributed entity with a fresh id.
    #[must_use]
    pub fn new(kind: EntityKind, location: Location) -> Self {
        Self {
            id: EntityId::random(),
            kind,
            location,
            creator: None,
            notifier: None,
            item: None,
        }
    }

    /// Converts an item drop into an item entity.
    #[must_use]
    pub fn item_entity(drop: ItemDrop) -> Self {
        let mut entity = Self::new(EntityKind::new(EntityKind::ITEM), drop.location);
        entity.item = Some(drop.stack);
        entity
    }

    /// Returns a handle suitable for use in a cause.
    #[must_use]
    pub fn handle(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            kind: self.kind.clone(),
        }
    }
}

// ============================================================================
// Items
// ============================================================================

/// A stack of items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item identifier.
    pub item: String,
    /// Stack size.
    pub quantity: u32,
}

impl ItemStack {
    /// Creates an item stack.
    #[must_use]
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

/// An item stack about to be dropped into the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDrop {
    /// Where the item appears.
    pub location: Location,
    /// What is dropped.
    pub stack: ItemStack,
}

impl ItemDrop {
    /// Creates an item drop.
    #[must_use]
    pub const fn new(location: Location, stack: ItemStack) -> Self {
        Self { location, stack }
    }

    /// Returns whether two drops may be merged into one stack.
    #[must_use]
    pub fn can_merge_with(&self, other: &Self) -> bool {
        self.stack.item == other.stack.item
            && self.location.world == other.location.world
            && self.location.block_pos() == other.location.block_pos()
    }
}

// ============================================================================
// Explosions
// ============================================================================

/// An explosion being resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    /// Centre of the blast.
    pub location: Location,
    /// Blast radius in blocks.
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Entity that detonated, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EntityRef>,
    /// Whether the blast destroys blocks.
    #[serde(default = "default_true")]
    pub breaks_blocks: bool,
}

impl Explosion {
    /// Creates a block-breaking explosion with no source entity.
    #[must_use]
    pub const fn new(location: Location, radius: f32) -> Self {
        Self {
            location,
            radius,
            source: None,
            breaks_blocks: true,
        }
    }

    /// Sets the detonating entity.
    #[must_use]
    pub fn with_source(mut self, source: EntityRef) -> Self {
        self.source = Some(source);
        self
    }
}

const fn default_radius() -> f32 {
    4.0
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_block_pos_floors_negative_coordinates() {
        let loc = Location::new(WorldId::default(), -0.5, 64.9, 3.2);
        assert_eq!(loc.block_pos(), BlockPos::new(-1, 64, 3));
    }

    #[test]
    fn at_block_round_trips_to_same_block() {
        let pos = BlockPos::new(10, 5, -7);
        let loc = Location::at_block(WorldId::default(), pos);
        assert_eq!(loc.block_pos(), pos);
    }

    #[test]
    fn player_ids_are_stable_per_name() {
        assert_eq!(PlayerRef::named("alice").id, PlayerRef::named("alice").id);
        assert_ne!(PlayerRef::named("alice").id, PlayerRef::named("bob").id);
    }

    #[test]
    fn item_entity_carries_stack() {
        let drop = ItemDrop::new(
            Location::new(WorldId::default(), 0.0, 0.0, 0.0),
            ItemStack::new("minecraft:cobblestone", 3),
        );
        let entity = Entity::item_entity(drop);
        assert_eq!(entity.kind.0, EntityKind::ITEM);
        assert_eq!(entity.item.as_ref().map(|s| s.quantity), Some(3));
    }

    #[test]
    fn drops_merge_only_within_same_block_and_item() {
        let world = WorldId::default();
        let a = ItemDrop::new(
            Location::new(world.clone(), 1.2, 0.0, 1.7),
            ItemStack::new("minecraft:dirt", 1),
        );
        let b = ItemDrop::new(
            Location::new(world.clone(), 1.9, 0.3, 1.1),
            ItemStack::new("minecraft:dirt", 2),
        );
        let c = ItemDrop::new(
            Location::new(world, 2.1, 0.0, 1.1),
            ItemStack::new("minecraft:dirt", 2),
        );
        assert!(a.can_merge_with(&b));
        assert!(!a.can_merge_with(&c));
    }

    #[test]
    fn change_category_classification() {
        let air = BlockState::air();
        let stone = BlockState::new("minecraft:stone");
        let dirt = BlockState::new("minecraft:dirt");
        assert_eq!(ChangeCategory::classify(&stone, &air), ChangeCategory::Break);
        assert_eq!(ChangeCategory::classify(&air, &stone), ChangeCategory::Place);
        assert_eq!(ChangeCategory::classify(&stone, &dirt), ChangeCategory::Modify);
    }

    #[test]
    fn air_detection() {
        assert!(BlockState::air().is_air());
        assert!(!BlockState::new("minecraft:stone").is_air());
        assert!(BlockState::default().is_air());
    }

    #[test]
    fn explosion_deserializes_with_defaults() {
        let yaml = "location: { x: 1.0, y: 2.0, z: 3.0 }\n";
        let explosion: Explosion = serde_yaml::from_str(yaml).unwrap();
        assert!(explosion.breaks_blocks);
        assert!(explosion.source.is_none());
        assert_eq!(explosion.location.world, WorldId::default());
    }
}

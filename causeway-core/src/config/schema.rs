//! Scenario schema types
//!
//! A scenario describes a seeded world, the event listeners observing it,
//! and a tree of activities to drive through the phase tracker. Scenarios
//! are deserialized from YAML.

use serde::{Deserialize, Serialize};

use crate::types::{BlockPos, ChangeCategory, Dimension, WorldId};

// ============================================================================
// Top-Level Scenario
// ============================================================================

/// Root of a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioConfig {
    /// Scenario name (required)
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Phase tracker settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Initial world contents
    #[serde(default)]
    pub world: WorldSeed,

    /// Event listeners, registered in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<ListenerRule>,

    /// Activities to run, in order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Outcome checks evaluated after the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expectations>,
}

// ============================================================================
// Tracker Settings
// ============================================================================

/// Settings for the phase tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// How nested activities of the same kind are compared
    #[serde(default)]
    pub runaway: RunawayPolicy,

    /// What to do when a popped phase still holds captures
    #[serde(default)]
    pub unconsumed_captures: UnconsumedCapturePolicy,

    /// Keep a history of every dispatched event
    #[serde(default = "default_true")]
    pub record_history: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            runaway: RunawayPolicy::default(),
            unconsumed_captures: UnconsumedCapturePolicy::default(),
            record_history: true,
        }
    }
}

/// Runaway detection policy for nested activities of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum RunawayPolicy {
    /// Same world, dimension, and block coordinates.
    #[default]
    Coordinates,
    /// Same coordinates and the same detonating source.
    CoordinatesAndSource,
    /// Never refuse nested activities.
    Disabled,
}

impl std::fmt::Display for RunawayPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coordinates => write!(f, "coordinates"),
            Self::CoordinatesAndSource => write!(f, "coordinates_and_source"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Handling of captures left behind after a phase unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum UnconsumedCapturePolicy {
    /// Panic; a leftover capture is a programming defect.
    Panic,
    /// Discard the leftovers and log an error.
    DrainAndLog,
}

impl Default for UnconsumedCapturePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::DrainAndLog
        }
    }
}

impl std::fmt::Display for UnconsumedCapturePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Panic => write!(f, "panic"),
            Self::DrainAndLog => write!(f, "drain_and_log"),
        }
    }
}

// ============================================================================
// World Seed
// ============================================================================

/// Initial world contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorldSeed {
    /// World identity
    #[serde(default)]
    pub id: WorldId,

    /// Non-air blocks
    #[serde(default)]
    pub blocks: Vec<BlockSeed>,

    /// Pre-existing entities
    #[serde(default)]
    pub entities: Vec<EntitySeed>,
}

/// A block placed before the scenario starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSeed {
    /// Block position
    pub pos: BlockPos,
    /// Block state identifier
    pub state: String,
}

/// An entity present before the scenario starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySeed {
    /// Entity type identifier
    pub kind: String,
    /// Block the entity stands in
    pub pos: BlockPos,
}

// ============================================================================
// Listeners
// ============================================================================

/// A scripted event listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerRule {
    /// Cancel every per-category block event of the given category.
    CancelBlockChanges {
        /// Category to cancel
        category: ChangeCategory,
    },
    /// Cancel the aggregate post block event.
    CancelPost,
    /// Invalidate any transaction at the given position.
    InvalidatePosition {
        /// Position to veto
        pos: BlockPos,
    },
    /// Remove spawn candidates of a kind, or cancel spawns entirely.
    CancelSpawns {
        /// Entity kind to remove; all candidates when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
    /// Cancel every item drop event.
    CancelDrops,
}

// ============================================================================
// Steps
// ============================================================================

/// One activity or low-level mutation in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Run a command on behalf of a player.
    Command {
        /// Issuing player name
        source: String,
        /// Command line
        command: String,
        /// Work performed while the command runs
        #[serde(default)]
        steps: Vec<Self>,
    },

    /// Resolve an explosion.
    Explosion {
        /// Blast centre
        at: BlockPos,
        /// World of the blast; the seeded world when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        world: Option<WorldId>,
        /// Dimension of the blast
        #[serde(default)]
        dimension: Dimension,
        /// Blast radius
        #[serde(default = "default_radius")]
        radius: f32,
        /// Entity kind that detonated, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detonator: Option<String>,
        /// Work performed while the explosion resolves
        #[serde(default)]
        steps: Vec<Self>,
    },

    /// Tick the block at a position.
    BlockTick {
        /// Ticking block
        pos: BlockPos,
        /// Work performed during the tick
        #[serde(default)]
        steps: Vec<Self>,
    },

    /// Run a scheduled plugin task.
    PluginTask {
        /// Plugin id
        plugin: String,
        /// Player the task acts for, if declared
        #[serde(default, skip_serializing_if = "Option::is_none")]
        acting_for: Option<String>,
        /// Work performed by the task
        #[serde(default)]
        steps: Vec<Self>,
    },

    /// Unload the tile entity at a position.
    TileEntityUnload {
        /// Tile entity position
        pos: BlockPos,
        /// Work performed while unloading
        #[serde(default)]
        steps: Vec<Self>,
    },

    /// Change one block.
    SetBlock {
        /// Block position
        pos: BlockPos,
        /// New state identifier
        state: String,
    },

    /// Spawn entities.
    SpawnEntity {
        /// Entity type identifier
        kind: String,
        /// Block to spawn in
        pos: BlockPos,
        /// How many to spawn
        #[serde(default = "default_one")]
        count: u32,
    },

    /// Drop an item at a block.
    DropItem {
        /// Block the item drops from
        pos: BlockPos,
        /// Item identifier
        item: String,
        /// Stack size
        #[serde(default = "default_one")]
        quantity: u32,
    },

    /// Kill the first entity of a kind, dropping its loot.
    KillEntity {
        /// Entity type identifier
        kind: String,
        /// Loot dropped on death
        #[serde(default)]
        drops: Vec<ItemSpec>,
    },
}

impl Step {
    /// Short label for diagnostics and validation paths.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Explosion { .. } => "explosion",
            Self::BlockTick { .. } => "block_tick",
            Self::PluginTask { .. } => "plugin_task",
            Self::TileEntityUnload { .. } => "tile_entity_unload",
            Self::SetBlock { .. } => "set_block",
            Self::SpawnEntity { .. } => "spawn_entity",
            Self::DropItem { .. } => "drop_item",
            Self::KillEntity { .. } => "kill_entity",
        }
    }

    /// Nested steps, for activity steps.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Command { steps, .. }
            | Self::Explosion { steps, .. }
            | Self::BlockTick { steps, .. }
            | Self::PluginTask { steps, .. }
            | Self::TileEntityUnload { steps, .. } => steps,
            Self::SetBlock { .. }
            | Self::SpawnEntity { .. }
            | Self::DropItem { .. }
            | Self::KillEntity { .. } => &[],
        }
    }
}

/// An item stack in a scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Item identifier
    pub item: String,
    /// Stack size
    #[serde(default = "default_one")]
    pub quantity: u32,
}

// ============================================================================
// Expectations
// ============================================================================

/// Outcome checks for a scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Expectations {
    /// Final block states
    #[serde(default)]
    pub blocks: Vec<BlockSeed>,

    /// Number of spawn events fired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_events: Option<usize>,

    /// Number of drop events fired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_events: Option<usize>,

    /// Number of entities in the world at the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<usize>,

    /// Number of phase pushes refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refused_phases: Option<usize>,
}

const fn default_true() -> bool {
    true
}

const fn default_one() -> u32 {
    1
}

const fn default_radius() -> f32 {
    4.0
}

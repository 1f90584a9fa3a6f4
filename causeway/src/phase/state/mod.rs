//! Phase states
//!
//! Every kind of tracked activity has one stateless [`PhaseState`]
//! implementation living in a `static`. The tracker stores
//! `&'static dyn PhaseState` next to a per-frame [`PhaseContext`]; the
//! state decides what gets captured and how the captures unwind, the
//! context holds the data.

mod block_tick;
mod command;
mod explosion;
mod idle;
mod plugin;
mod post;
mod tile_unload;

use std::fmt;

use serde::{Deserialize, Serialize};

use causeway_core::cause::{Cause, SpawnType};
use causeway_core::types::{BlockPos, Entity};

use crate::error::UnwindError;

use super::context::PhaseContext;
use super::pipeline::UnwindScope;

pub use block_tick::BlockTickPhase;
pub use command::CommandPhase;
pub use explosion::ExplosionPhase;
pub use idle::IdlePhase;
pub use plugin::PluginTaskPhase;
pub use post::PostPhase;
pub(crate) use post::post_dispatch;
pub use tile_unload::TileEntityUnloadPhase;

/// The idle state, implicit at the bottom of every stack.
pub static IDLE: IdlePhase = IdlePhase;
/// State for command execution.
pub static COMMAND: CommandPhase = CommandPhase;
/// State for explosion resolution.
pub static EXPLOSION: ExplosionPhase = ExplosionPhase;
/// State for block ticks.
pub static BLOCK_TICK: BlockTickPhase = BlockTickPhase;
/// State for scheduled plugin tasks.
pub static PLUGIN_TASK: PluginTaskPhase = PluginTaskPhase;
/// State for tile entity unloading.
pub static TILE_ENTITY_UNLOAD: TileEntityUnloadPhase = TileEntityUnloadPhase;
/// The deferred-dispatch state pushed while another phase unwinds.
pub static POST: PostPhase = PostPhase;

// ============================================================================
// Kinds
// ============================================================================

/// Closed set of activity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Nothing tracked.
    #[default]
    Idle,
    /// A command is executing.
    Command,
    /// An explosion is resolving.
    Explosion,
    /// A block is ticking.
    BlockTick,
    /// A plugin task is running.
    PluginTask,
    /// A tile entity is unloading.
    TileEntityUnload,
    /// Another phase is unwinding.
    Post,
}

impl PhaseKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Idle,
        Self::Command,
        Self::Explosion,
        Self::BlockTick,
        Self::PluginTask,
        Self::TileEntityUnload,
        Self::Post,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Command => "command",
            Self::Explosion => "explosion",
            Self::BlockTick => "block_tick",
            Self::PluginTask => "plugin_task",
            Self::TileEntityUnload => "tile_entity_unload",
            Self::Post => "post",
        }
    }

    /// Whether callers may push this kind. Idle is only ever implicit and
    /// Post frames are managed by the tracker.
    #[must_use]
    pub const fn is_pushable(self) -> bool {
        !matches!(self, Self::Idle | Self::Post)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the state for `kind`.
#[must_use]
pub fn for_kind(kind: PhaseKind) -> &'static dyn PhaseState {
    match kind {
        PhaseKind::Idle => &IDLE,
        PhaseKind::Command => &COMMAND,
        PhaseKind::Explosion => &EXPLOSION,
        PhaseKind::BlockTick => &BLOCK_TICK,
        PhaseKind::PluginTask => &PLUGIN_TASK,
        PhaseKind::TileEntityUnload => &TILE_ENTITY_UNLOAD,
        PhaseKind::Post => &POST,
    }
}

/// Attribution handle a context may be required to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    /// The direct origin.
    Source,
    /// Whoever notified the source.
    Notifier,
    /// Whoever owns the source.
    Owner,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Notifier => f.write_str("notifier"),
            Self::Owner => f.write_str("owner"),
        }
    }
}

/// What happened to an entity handed to
/// [`PhaseState::spawn_entity_or_capture`].
#[derive(Debug)]
pub enum SpawnDisposition {
    /// The context captured it.
    Captured,
    /// Nothing captures here; the caller must spawn it.
    Immediate(Entity),
}

// ============================================================================
// State contract
// ============================================================================

/// Behaviour of one activity kind.
///
/// Implementations are stateless; everything mutable lives in the
/// [`PhaseContext`] passed in. Capability flags are read by the mutation
/// entry points to decide between capturing and applying immediately.
pub trait PhaseState: fmt::Debug + Sync {
    /// The kind this state implements.
    fn kind(&self) -> PhaseKind;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Whether a phase of kind `next` may be pushed on top of this one.
    fn can_switch_to(&self, next: PhaseKind) -> bool;

    /// Attribution the context must carry before it can be pushed.
    fn required_fields(&self) -> &'static [RequiredField] {
        &[]
    }

    /// Whether block changes are batched until unwind. When `false` each
    /// change runs through the block pipeline as soon as it is proposed.
    fn does_bulk_block_capture(&self) -> bool {
        true
    }

    /// Whether drops are keyed by the block they came from.
    fn tracks_block_specific_drops(&self) -> bool {
        false
    }

    /// Whether drops are keyed by the entity that produced them.
    fn tracks_entity_specific_drops(&self) -> bool {
        false
    }

    /// Whether loose drops skip merging before conversion.
    fn ignores_item_pre_merging(&self) -> bool {
        false
    }

    /// Whether unwinding pushes a Post frame to collect deferred effects.
    fn requires_post(&self) -> bool {
        true
    }

    /// Whether entity spawns are captured.
    fn captures_entities(&self) -> bool {
        true
    }

    /// Whether a change at `pos` is captured. `false` means apply now.
    fn should_capture_block_change_or_skip(&self, _ctx: &PhaseContext, _pos: BlockPos) -> bool {
        true
    }

    /// Spawn type stamped on entities this phase spawns.
    fn spawn_type(&self) -> SpawnType;

    /// Builds the cause for everything the phase captured.
    ///
    /// # Errors
    ///
    /// Returns an [`UnwindError`] when the context lacks what the cause
    /// needs or does not belong to this state.
    fn build_cause(&self, ctx: &PhaseContext) -> Result<Cause, UnwindError>;

    /// Captures `entity` or hands it back for immediate spawning.
    fn spawn_entity_or_capture(&self, ctx: &mut PhaseContext, entity: Entity) -> SpawnDisposition {
        if self.captures_entities() {
            ctx.captures.entities.push(entity);
            SpawnDisposition::Captured
        } else {
            SpawnDisposition::Immediate(entity)
        }
    }

    /// Turns the captures in `ctx` into world mutations and events.
    ///
    /// Must leave every capture collection empty on success and must be a
    /// no-op when nothing was captured.
    ///
    /// # Errors
    ///
    /// Returns an [`UnwindError`] when the captures cannot be attributed;
    /// the tracker then discards them.
    fn unwind(&self, ctx: &mut PhaseContext, scope: &mut UnwindScope<'_>)
    -> Result<(), UnwindError>;
}

/// Kinds that every permissive state accepts.
pub(crate) const fn is_activity(next: PhaseKind) -> bool {
    next.is_pushable()
}

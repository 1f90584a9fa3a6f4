//! Phase contexts
//!
//! A [`PhaseContext`] belongs to exactly one stack frame. It holds that
//! frame's captures, optional attribution handles, and a payload whose
//! variant names the activity the frame tracks.

use serde::Serialize;

use causeway_core::cause::{Cause, CauseBuilder, CauseValue};
use causeway_core::config::RunawayPolicy;
use causeway_core::types::{BlockPos, BlockSnapshot, Explosion, PlayerRef, WorldId};

use super::capture::Captures;
use super::state::{PhaseKind, RequiredField};

/// Activity-specific context data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextPayload {
    /// No activity.
    #[default]
    Idle,
    /// A command being executed.
    Command {
        /// Command line.
        command: String,
    },
    /// An explosion being resolved.
    Explosion {
        /// The blast.
        explosion: Explosion,
    },
    /// A block being ticked.
    BlockTick {
        /// The ticking block as it was when the tick began.
        block: BlockSnapshot,
    },
    /// A scheduled plugin task.
    PluginTask {
        /// Plugin id.
        plugin: String,
    },
    /// A tile entity being unloaded.
    TileEntityUnload {
        /// World of the tile entity.
        world: WorldId,
        /// Tile entity position.
        pos: BlockPos,
    },
    /// Deferred effects of a phase that just finished.
    Unwinding {
        /// Kind of the finished phase.
        unwinding: PhaseKind,
        /// Cause built by the finished phase.
        cause: Cause,
    },
}

impl ContextPayload {
    /// The phase kind this payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::Command { .. } => PhaseKind::Command,
            Self::Explosion { .. } => PhaseKind::Explosion,
            Self::BlockTick { .. } => PhaseKind::BlockTick,
            Self::PluginTask { .. } => PhaseKind::PluginTask,
            Self::TileEntityUnload { .. } => PhaseKind::TileEntityUnload,
            Self::Unwinding { .. } => PhaseKind::Post,
        }
    }

    /// One-line summary for diagnostics.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Idle => "idle".to_owned(),
            Self::Command { command } => format!("command {command:?}"),
            Self::Explosion { explosion } => format!(
                "explosion at {} in {} (radius {})",
                explosion.location.block_pos(),
                explosion.location.world,
                explosion.radius
            ),
            Self::BlockTick { block } => format!("tick of {} at {}", block.state, block.pos),
            Self::PluginTask { plugin } => format!("task of plugin {plugin}"),
            Self::TileEntityUnload { world, pos } => format!("unload at {pos} in {world}"),
            Self::Unwinding { unwinding, cause } => format!("unwinding {unwinding} ({cause})"),
        }
    }
}

/// Mutable state of one phase activation.
#[derive(Debug, Clone, Default)]
pub struct PhaseContext {
    /// Pending side effects.
    pub captures: Captures,
    source: Option<CauseValue>,
    notifier: Option<CauseValue>,
    owner: Option<CauseValue>,
    payload: ContextPayload,
}

impl PhaseContext {
    /// Creates a context with no attribution.
    #[must_use]
    pub fn new(payload: ContextPayload) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    /// Context for a command issued by `player`.
    #[must_use]
    pub fn command(player: PlayerRef, command: impl Into<String>) -> Self {
        Self::new(ContextPayload::Command {
            command: command.into(),
        })
        .with_source(CauseValue::Player(player))
    }

    /// Context for resolving `explosion`.
    #[must_use]
    pub fn explosion(explosion: Explosion) -> Self {
        Self::new(ContextPayload::Explosion { explosion })
    }

    /// Context for ticking `block`.
    #[must_use]
    pub fn block_tick(block: BlockSnapshot) -> Self {
        Self::new(ContextPayload::BlockTick { block })
    }

    /// Context for a task scheduled by `plugin`.
    #[must_use]
    pub fn plugin_task(plugin: impl Into<String>) -> Self {
        Self::new(ContextPayload::PluginTask {
            plugin: plugin.into(),
        })
    }

    /// Context for unloading the tile entity at `pos`.
    #[must_use]
    pub fn tile_entity_unload(world: WorldId, pos: BlockPos) -> Self {
        Self::new(ContextPayload::TileEntityUnload { world, pos })
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: CauseValue) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: CauseValue) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: CauseValue) -> Self {
        self.owner = Some(owner);
        self
    }

    /// The source, if set.
    #[must_use]
    pub const fn source(&self) -> Option<&CauseValue> {
        self.source.as_ref()
    }

    /// The notifier, if set.
    #[must_use]
    pub const fn notifier(&self) -> Option<&CauseValue> {
        self.notifier.as_ref()
    }

    /// The owner, if set.
    #[must_use]
    pub const fn owner(&self) -> Option<&CauseValue> {
        self.owner.as_ref()
    }

    /// The activity payload.
    #[must_use]
    pub const fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    /// Whether `field` is set.
    #[must_use]
    pub const fn has(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::Source => self.source.is_some(),
            RequiredField::Notifier => self.notifier.is_some(),
            RequiredField::Owner => self.owner.is_some(),
        }
    }

    /// Starts a cause builder carrying this context's notifier and owner.
    ///
    /// The caller adds the source.
    #[must_use]
    pub fn attribution(&self, builder: CauseBuilder) -> CauseBuilder {
        builder
            .maybe_notifier(self.notifier.clone())
            .maybe_owner(self.owner.clone())
    }

    /// Whether this context repeats `existing` closely enough to be refused.
    ///
    /// Only explosions are compared. Under [`RunawayPolicy::Coordinates`]
    /// two explosions match on world, dimension, and block coordinates,
    /// even if they belong to unrelated activities.
    #[must_use]
    pub fn is_runaway(&self, existing: &Self, policy: RunawayPolicy) -> bool {
        let (
            ContextPayload::Explosion { explosion: new },
            ContextPayload::Explosion { explosion: old },
        ) = (&self.payload, &existing.payload)
        else {
            return false;
        };
        let same_spot = new.location.world == old.location.world
            && new.location.dimension == old.location.dimension
            && new.location.block_pos() == old.location.block_pos();
        match policy {
            RunawayPolicy::Coordinates => same_spot,
            RunawayPolicy::CoordinatesAndSource => same_spot && new.source == old.source,
            RunawayPolicy::Disabled => false,
        }
    }

    /// Clears every field so the context can be reused.
    pub fn reset(&mut self) {
        self.captures.reset();
        self.source = None;
        self.notifier = None;
        self.owner = None;
        self.payload = ContextPayload::Idle;
    }

    pub(crate) fn set_payload(&mut self, payload: ContextPayload) {
        self.payload = payload;
    }
}

//! Cause chains
//!
//! A [`Cause`] is the ordered "why" behind a batch of side effects. It is
//! built once through [`CauseBuilder`], never mutated afterwards, and only
//! grows by producing a new, longer cause via [`Cause::with`].
//!
//! The first entry is the root. Unwind algorithms dispatch on the root's
//! [`RootKind`] to decide which [`SpawnCause`] to attach to spawned
//! entities; the dispatch is a closed match so a new root kind cannot slip
//! through unhandled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CauseError;
use crate::types::{BlockSnapshot, EntityId, EntityKind, EntityRef, Explosion, PlayerRef};

/// Named-entry key under which spawn sub-causes are stored.
pub const SPAWN_KEY: &str = "spawn";

/// Named-entry key for the entity whose drops are being emitted.
pub const DROPPER_KEY: &str = "dropper";

/// Named-entry key for the explosion being resolved.
pub const EXPLOSION_KEY: &str = "explosion";

// ============================================================================
// Entries
// ============================================================================

/// Role an object plays in a cause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "key")]
pub enum CauseRole {
    /// The direct origin. At most one per cause.
    Source,
    /// Whoever notified the source into acting.
    Notifier,
    /// Whoever owns the source.
    Owner,
    /// Any other contributing object, keyed by name.
    Named(String),
}

impl fmt::Display for CauseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Notifier => write!(f, "notifier"),
            Self::Owner => write!(f, "owner"),
            Self::Named(key) => write!(f, "named:{key}"),
        }
    }
}

/// An object contributing to a cause.
///
/// Values are handles and snapshots, never the live objects themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CauseValue {
    /// A connected player.
    Player(PlayerRef),
    /// A non-player entity.
    Entity(EntityRef),
    /// A block, as it was when it acted.
    Block(BlockSnapshot),
    /// An explosion.
    Explosion(Explosion),
    /// A plugin, by id.
    Plugin(String),
    /// A command line.
    Command(String),
    /// A spawn sub-cause.
    Spawn(SpawnCause),
    /// Free-form text.
    Text(String),
}

/// Coarse classification of a cause root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    /// Players and other entities.
    Entity,
    /// Block snapshots.
    Block,
    /// Anything else.
    Other,
}

impl CauseValue {
    /// Classifies this value for root dispatch.
    #[must_use]
    pub const fn root_kind(&self) -> RootKind {
        match self {
            Self::Player(_) | Self::Entity(_) => RootKind::Entity,
            Self::Block(_) => RootKind::Block,
            Self::Explosion(_)
            | Self::Plugin(_)
            | Self::Command(_)
            | Self::Spawn(_)
            | Self::Text(_) => RootKind::Other,
        }
    }

    /// Returns an entity handle when this value is a player or entity.
    #[must_use]
    pub fn as_entity_ref(&self) -> Option<EntityRef> {
        match self {
            Self::Player(player) => Some(EntityRef {
                id: EntityId(player.id),
                kind: EntityKind::new("minecraft:player"),
            }),
            Self::Entity(entity) => Some(entity.clone()),
            _ => None,
        }
    }

    /// Returns the player when this value is one.
    #[must_use]
    pub const fn as_player(&self) -> Option<&PlayerRef> {
        match self {
            Self::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Short human-readable label used in logs and diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Player(p) => format!("player:{}", p.name),
            Self::Entity(e) => format!("entity:{}#{}", e.kind, e.id),
            Self::Block(b) => format!("block:{}@{}", b.state, b.pos),
            Self::Explosion(x) => format!("explosion@{}", x.location.block_pos()),
            Self::Plugin(id) => format!("plugin:{id}"),
            Self::Command(cmd) => format!("command:{cmd}"),
            Self::Spawn(s) => format!("spawn:{}", s.spawn_type()),
            Self::Text(t) => t.clone(),
        }
    }
}

/// A single `(role, value)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CauseEntry {
    /// Role of the value.
    #[serde(flatten)]
    pub role: CauseRole,
    /// The contributing object.
    #[serde(flatten)]
    pub value: CauseValue,
}

// ============================================================================
// Spawn sub-causes
// ============================================================================

/// Why an entity came into existence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnType {
    /// Placed deliberately (eggs, commands that summon).
    Placement,
    /// Dropped as an item.
    Dropped,
    /// Thrown out by an explosion.
    Explosion,
    /// Summoned by a command.
    Command,
    /// Spawned by plugin code.
    Plugin,
    /// Anything else.
    Custom(String),
}

impl fmt::Display for SpawnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placement => write!(f, "placement"),
            Self::Dropped => write!(f, "dropped"),
            Self::Explosion => write!(f, "explosion"),
            Self::Command => write!(f, "command"),
            Self::Plugin => write!(f, "plugin"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Spawn attribution synthesised from a cause's root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "cause")]
pub enum SpawnCause {
    /// An entity (or player) spawned it.
    Entity {
        /// The spawning entity.
        spawner: EntityRef,
        /// Spawn type.
        spawn_type: SpawnType,
    },
    /// A block spawned it.
    Block {
        /// The spawning block.
        block: BlockSnapshot,
        /// Spawn type.
        spawn_type: SpawnType,
    },
    /// Neither an entity nor a block is at the root.
    Generic {
        /// Spawn type.
        spawn_type: SpawnType,
    },
}

impl SpawnCause {
    /// Returns the spawn type regardless of variant.
    #[must_use]
    pub const fn spawn_type(&self) -> &SpawnType {
        match self {
            Self::Entity { spawn_type, .. }
            | Self::Block { spawn_type, .. }
            | Self::Generic { spawn_type } => spawn_type,
        }
    }
}

// ============================================================================
// Cause
// ============================================================================

/// Immutable, ordered chain of contributing objects.
///
/// Invariants: never empty, at most one [`CauseRole::Source`] entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cause {
    entries: Vec<CauseEntry>,
}

impl Cause {
    /// Starts building a cause.
    #[must_use]
    pub fn builder() -> CauseBuilder {
        CauseBuilder::default()
    }

    /// Creates a cause whose only entry is `value` as the source.
    #[must_use]
    pub fn of(value: CauseValue) -> Self {
        Self {
            entries: vec![CauseEntry {
                role: CauseRole::Source,
                value,
            }],
        }
    }

    /// Returns the root value (the first entry).
    #[must_use]
    pub fn root(&self) -> &CauseValue {
        // Non-empty by construction.
        &self.entries[0].value
    }

    /// Classifies the root value.
    #[must_use]
    pub fn root_kind(&self) -> RootKind {
        self.root().root_kind()
    }

    /// Returns the source value, if any.
    #[must_use]
    pub fn source(&self) -> Option<&CauseValue> {
        self.first_with_role(&CauseRole::Source)
    }

    /// Returns the first notifier, if any.
    #[must_use]
    pub fn notifier(&self) -> Option<&CauseValue> {
        self.first_with_role(&CauseRole::Notifier)
    }

    /// Returns the first owner, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&CauseValue> {
        self.first_with_role(&CauseRole::Owner)
    }

    /// Returns the first value stored under `key`.
    #[must_use]
    pub fn named(&self, key: &str) -> Option<&CauseValue> {
        self.entries
            .iter()
            .find(|e| matches!(&e.role, CauseRole::Named(k) if k == key))
            .map(|e| &e.value)
    }

    fn first_with_role(&self, role: &CauseRole) -> Option<&CauseValue> {
        self.entries
            .iter()
            .find(|e| &e.role == role)
            .map(|e| &e.value)
    }

    /// Returns whether any entry has `role`.
    #[must_use]
    pub fn contains_role(&self, role: &CauseRole) -> bool {
        self.entries.iter().any(|e| &e.role == role)
    }

    /// Iterates entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &CauseEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns a new cause with `(role, value)` appended.
    ///
    /// # Errors
    ///
    /// Returns [`CauseError::DuplicateSource`] when appending a second source.
    pub fn with(&self, role: CauseRole, value: CauseValue) -> Result<Self, CauseError> {
        if role == CauseRole::Source && self.contains_role(&CauseRole::Source) {
            return Err(CauseError::DuplicateSource);
        }
        let mut entries = self.entries.clone();
        entries.push(CauseEntry { role, value });
        Ok(Self { entries })
    }

    /// Synthesises the spawn sub-cause for this cause's root.
    #[must_use]
    pub fn spawn_cause(&self, spawn_type: SpawnType) -> SpawnCause {
        match self.root_kind() {
            RootKind::Entity => match self.root().as_entity_ref() {
                Some(spawner) => SpawnCause::Entity {
                    spawner,
                    spawn_type,
                },
                None => SpawnCause::Generic { spawn_type },
            },
            RootKind::Block => match self.root() {
                CauseValue::Block(block) => SpawnCause::Block {
                    block: block.clone(),
                    spawn_type,
                },
                _ => SpawnCause::Generic { spawn_type },
            },
            RootKind::Other => SpawnCause::Generic { spawn_type },
        }
    }

    /// Returns a new cause with the root's spawn sub-cause appended under
    /// [`SPAWN_KEY`].
    #[must_use]
    pub fn with_spawn_cause(&self, spawn_type: SpawnType) -> Self {
        let spawn = self.spawn_cause(spawn_type);
        let mut entries = self.entries.clone();
        entries.push(CauseEntry {
            role: CauseRole::Named(SPAWN_KEY.to_owned()),
            value: CauseValue::Spawn(spawn),
        });
        Self { entries }
    }

    /// Returns the attached spawn sub-cause, if any.
    #[must_use]
    pub fn spawn(&self) -> Option<&SpawnCause> {
        match self.named(SPAWN_KEY) {
            Some(CauseValue::Spawn(spawn)) => Some(spawn),
            _ => None,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                write!(f, " <- ")?;
            }
            first = false;
            write!(f, "{}={}", entry.role, entry.value.label())?;
        }
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Additive builder for [`Cause`].
#[derive(Debug, Clone, Default)]
pub struct CauseBuilder {
    entries: Vec<CauseEntry>,
    duplicate_source: bool,
}

impl CauseBuilder {
    /// Adds the source. A second call makes [`build`](Self::build) fail.
    #[must_use]
    pub fn source(mut self, value: CauseValue) -> Self {
        if self.entries.iter().any(|e| e.role == CauseRole::Source) {
            self.duplicate_source = true;
        }
        self.entries.push(CauseEntry {
            role: CauseRole::Source,
            value,
        });
        self
    }

    /// Adds a notifier.
    #[must_use]
    pub fn notifier(self, value: CauseValue) -> Self {
        self.push(CauseRole::Notifier, value)
    }

    /// Adds an owner.
    #[must_use]
    pub fn owner(self, value: CauseValue) -> Self {
        self.push(CauseRole::Owner, value)
    }

    /// Adds a named entry.
    #[must_use]
    pub fn named(self, key: impl Into<String>, value: CauseValue) -> Self {
        self.push(CauseRole::Named(key.into()), value)
    }

    /// Adds an optional notifier.
    #[must_use]
    pub fn maybe_notifier(self, value: Option<CauseValue>) -> Self {
        match value {
            Some(v) => self.notifier(v),
            None => self,
        }
    }

    /// Adds an optional owner.
    #[must_use]
    pub fn maybe_owner(self, value: Option<CauseValue>) -> Self {
        match value {
            Some(v) => self.owner(v),
            None => self,
        }
    }

    fn push(mut self, role: CauseRole, value: CauseValue) -> Self {
        self.entries.push(CauseEntry { role, value });
        self
    }

    /// Freezes the builder into a [`Cause`].
    ///
    /// # Errors
    ///
    /// Returns [`CauseError::Empty`] if nothing was added, or
    /// [`CauseError::DuplicateSource`] if more than one source was added.
    pub fn build(self) -> Result<Cause, CauseError> {
        if self.duplicate_source {
            return Err(CauseError::DuplicateSource);
        }
        if self.entries.is_empty() {
            return Err(CauseError::Empty);
        }
        Ok(Cause {
            entries: self.entries,
        })
    }
}

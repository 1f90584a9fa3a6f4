//! Built-in scenarios
//!
//! Scenario files embedded in the binary at compile time, so the engine's
//! headline behaviours can be exercised with no files on disk:
//! `causeway run --builtin nested-coalescing`.

use std::fmt;
use std::sync::LazyLock;

// ============================================================================
// Types
// ============================================================================

/// A built-in scenario embedded in the binary.
pub struct BuiltinScenario {
    /// Unique identifier (kebab-case, e.g., "command-spawn").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Category for organization.
    pub category: ScenarioCategory,

    /// Tags for filtering.
    pub tags: &'static [&'static str],

    /// Raw YAML content (embedded at compile time).
    pub yaml: &'static str,
}

/// What a built-in scenario demonstrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioCategory {
    /// Causes and creator attribution.
    Attribution,
    /// Listener vetoes and restoration.
    Cancellation,
    /// Deferred effects handed between frames.
    Coalescing,
    /// Pushes the tracker refuses.
    Refusal,
}

impl ScenarioCategory {
    /// Title-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attribution => "Attribution",
            Self::Cancellation => "Cancellation",
            Self::Coalescing => "Coalescing",
            Self::Refusal => "Refusal",
        }
    }

    /// All categories in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Attribution,
            Self::Cancellation,
            Self::Coalescing,
            Self::Refusal,
        ]
    }
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribution => write!(f, "attribution"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Coalescing => write!(f, "coalescing"),
            Self::Refusal => write!(f, "refusal"),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            name: "command-spawn",
            description: "Player command spawns an entity credited to the player",
            category: ScenarioCategory::Attribution,
            tags: &["command", "spawn", "creator"],
            yaml: include_str!("../../scenarios/command-spawn.yaml"),
        },
        BuiltinScenario {
            name: "explosion-partial-cancel",
            description: "Listener cancels the break half of an explosion",
            category: ScenarioCategory::Cancellation,
            tags: &["explosion", "restore", "drops"],
            yaml: include_str!("../../scenarios/explosion-partial-cancel.yaml"),
        },
        BuiltinScenario {
            name: "nested-coalescing",
            description: "Nested block tick spawns leave with the command's event",
            category: ScenarioCategory::Coalescing,
            tags: &["command", "block-tick", "spawn", "post"],
            yaml: include_str!("../../scenarios/nested-coalescing.yaml"),
        },
        BuiltinScenario {
            name: "runaway-explosion",
            description: "Explosion re-detonating at its own position is refused",
            category: ScenarioCategory::Refusal,
            tags: &["explosion", "runaway", "drops", "post"],
            yaml: include_str!("../../scenarios/runaway-explosion.yaml"),
        },
        BuiltinScenario {
            name: "tile-unload",
            description: "Tile entity unload applies directly and refuses nesting",
            category: ScenarioCategory::Refusal,
            tags: &["tile-entity", "transition"],
            yaml: include_str!("../../scenarios/tile-unload.yaml"),
        },
    ]
});

// ============================================================================
// Public API
// ============================================================================

/// Look up a scenario by exact name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.name == name)
}

/// List all scenarios, optionally filtered by category and/or tag.
#[must_use]
pub fn list_scenarios(
    category: Option<ScenarioCategory>,
    tag: Option<&str>,
) -> Vec<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS
        .iter()
        .filter(|s| category.is_none_or(|c| s.category == c))
        .filter(|s| tag.is_none_or(|t| s.tags.contains(&t)))
        .collect()
}

/// Suggest a similar scenario name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
#[must_use]
pub fn suggest_scenario(input: &str) -> Option<String> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|s| (s.name, strsim::damerau_levenshtein(input, s.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Returns all scenario names in registry order.
#[must_use]
pub fn list_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|s| s.name).collect()
}

// ============================================================================
// Tests
// ============================================================================

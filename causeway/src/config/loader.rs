//! Scenario loader
//!
//! Loading pipeline for scenario files:
//! 1. Size check
//! 2. Read (UTF-8 BOM stripped)
//! 3. YAML parsing
//! 4. Deserialization to [`ScenarioConfig`]
//! 5. Environment overrides for tracker settings
//! 6. Validation

use std::path::Path;

use causeway_core::config::{RunawayPolicy, ScenarioConfig, UnconsumedCapturePolicy};
use causeway_core::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::config::validation::Validator;

/// Overrides `tracker.runaway` in every loaded scenario.
pub const RUNAWAY_POLICY_ENV: &str = "CAUSEWAY_RUNAWAY_POLICY";

/// Overrides `tracker.unconsumed_captures` in every loaded scenario.
pub const UNCONSUMED_CAPTURES_ENV: &str = "CAUSEWAY_UNCONSUMED_CAPTURES";

// ============================================================================
// Public API
// ============================================================================

/// Options for the scenario loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Size limits.
    pub limits: ScenarioLimits,

    /// Apply `CAUSEWAY_*` tracker overrides from the environment.
    pub env_overrides: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            limits: ScenarioLimits::default(),
            env_overrides: true,
        }
    }
}

/// Limits that keep a scenario from exhausting resources.
#[derive(Debug, Clone)]
pub struct ScenarioLimits {
    /// Maximum scenario file size in bytes.
    pub max_scenario_size: usize,

    /// Maximum number of steps, counting nested ones.
    pub max_steps: usize,

    /// Maximum nesting depth of activity steps.
    pub max_step_depth: usize,
}

impl Default for ScenarioLimits {
    fn default() -> Self {
        Self {
            max_scenario_size: env_or("CAUSEWAY_MAX_SCENARIO_SIZE", 1024 * 1024),
            max_steps: env_or("CAUSEWAY_MAX_STEPS", 10_000),
            max_step_depth: env_or("CAUSEWAY_MAX_STEP_DEPTH", 64),
        }
    }
}

/// Result of loading a scenario.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated scenario.
    pub config: ScenarioConfig,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during scenario loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) if !location.is_empty() => write!(f, "{} at {location}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Scenario loader.
///
/// Handles the full pipeline from YAML text to a validated
/// [`ScenarioConfig`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing or larger than the size limit
    /// - YAML parsing or deserialization fails
    /// - An environment override holds an unknown policy
    /// - Validation reports errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let max = self.options.limits.max_scenario_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_source(&raw, path)
    }

    /// Loads a scenario from YAML text, such as a built-in scenario.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file checks.
    pub fn load_from_str(&self, content: &str) -> Result<LoadResult, ConfigError> {
        self.load_source(content, Path::new("<inline>"))
    }

    fn load_source(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let root: Value = serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Scenario file is empty".to_string(),
            });
        }

        let mut config: ScenarioConfig =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: format!("Failed to deserialize scenario: {e}"),
            })?;

        if self.options.env_overrides {
            apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        }

        let result = Validator::new().validate(&config, &self.options.limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        let warnings = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();

        Ok(LoadResult { config, warnings })
    }
}

// ============================================================================
// Environment Overrides
// ============================================================================

/// Applies tracker overrides found through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when an override names an unknown
/// policy.
pub fn apply_overrides<F>(config: &mut ScenarioConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(RUNAWAY_POLICY_ENV) {
        config.tracker.runaway = parse_policy::<RunawayPolicy>(
            RUNAWAY_POLICY_ENV,
            &value,
            "coordinates, coordinates_and_source, or disabled",
        )?;
    }
    if let Some(value) = lookup(UNCONSUMED_CAPTURES_ENV) {
        config.tracker.unconsumed_captures = parse_policy::<UnconsumedCapturePolicy>(
            UNCONSUMED_CAPTURES_ENV,
            &value,
            "panic or drain_and_log",
        )?;
    }
    Ok(())
}

fn parse_policy<T: DeserializeOwned>(
    field: &str,
    value: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
    serde_yaml::from_value(Value::String(normalized)).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

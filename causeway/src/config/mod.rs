//! Scenario configuration
//!
//! Loading and validation of scenario files. The schema itself lives in
//! `causeway_core::config` so the engine and the CLI share one definition.

pub mod loader;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions, ScenarioLimits, apply_overrides};
pub use validation::{ValidationResult, Validator, activity_kind};

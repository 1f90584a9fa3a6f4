//! `Causeway` Core: shared domain types, causes, and scenario schema
//!
//! This crate provides the value types that flow through the phase engine
//! (block and entity snapshots, explosions, item drops), the immutable
//! [`cause::Cause`] chain used to attribute side effects, and the scenario
//! configuration schema shared by the engine and the CLI.

pub mod cause;
pub mod config;
pub mod error;
pub mod types;

/// Version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cause::{
    Cause, CauseBuilder, CauseEntry, CauseRole, CauseValue, RootKind, SpawnCause, SpawnType,
};
pub use error::{CauseError, ConfigError, Severity, ValidationIssue};

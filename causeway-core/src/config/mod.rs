//! Configuration module
//!
//! Scenario file schema shared by the engine, the loader, and the CLI.

pub mod schema;

pub use schema::*;

//! Command-line interface
//!
//! Argument definitions and command handlers for the `causeway` binary.

pub mod args;
pub mod commands;

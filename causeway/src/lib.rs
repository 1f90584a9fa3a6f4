//! `Causeway` - phase tracking and cause capture for tick-driven simulations
//!
//! A [`phase::PhaseTracker`] keeps a stack of the activities currently
//! running in a simulation tick (commands, explosions, block ticks, plugin
//! tasks, tile entity unloads). Side effects proposed while an activity is on
//! the stack are captured, offered to event listeners when the activity
//! ends, and then committed or rolled back, each attributed to a
//! [`causeway_core::Cause`] built from the stack.
//!
//! [`sim::Simulation`] drives a tracker against an in-memory
//! [`world::World`], and [`runner::ScenarioRunner`] executes YAML scenarios
//! through it.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod observability;
pub mod phase;
pub mod runner;
pub mod scenarios;
pub mod sim;
pub mod world;

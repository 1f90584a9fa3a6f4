//! CLI argument definitions
//!
//! All Clap derive structs for `Causeway` command-line parsing.

use std::path::PathBuf;

use causeway_core::config::{RunawayPolicy, UnconsumedCapturePolicy};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;
use crate::scenarios::ScenarioCategory;

// ============================================================================
// Root CLI
// ============================================================================

/// Phase tracking and cause capture for tick-driven simulations.
#[derive(Parser, Debug)]
#[command(name = "causeway", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "CAUSEWAY_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Human, global = true, env = "CAUSEWAY_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario through the phase tracker and check its expectations.
    Run(RunArgs),

    /// Validate scenario files without running them.
    Validate(ValidateArgs),

    /// List built-in scenarios.
    List(ListArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

// ============================================================================
// Run / Validate / List
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("source").required(true).multiple(false))]
pub struct RunArgs {
    /// Path to a YAML scenario file.
    #[arg(short, long, group = "source", env = "CAUSEWAY_SCENARIO")]
    pub scenario: Option<PathBuf>,

    /// Name of a built-in scenario (see `causeway list`).
    #[arg(short, long, group = "source")]
    pub builtin: Option<String>,

    /// Write the scenario journal as JSONL to this file.
    #[arg(long, env = "CAUSEWAY_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Output format for the run summary.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Expose Prometheus metrics on this port while the scenario runs.
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Override the scenario's runaway policy.
    #[arg(long)]
    pub runaway_policy: Option<RunawayPolicy>,

    /// Override the scenario's handling of unconsumed captures.
    #[arg(long)]
    pub unconsumed_captures: Option<UnconsumedCapturePolicy>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Scenario files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list scenarios in this category.
    #[arg(long)]
    pub category: Option<ScenarioCategory>,

    /// Filter by tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================

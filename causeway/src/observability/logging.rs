//! Log setup
//!
//! Engine logs go to stderr so `run --format json` keeps stdout clean.
//! Verbosity raises the `causeway` targets one step ahead of everything
//! else; `CAUSEWAY_LOG_LEVEL` replaces the computed filter outright.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "CAUSEWAY_LOG_LEVEL";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// One readable line per event.
    #[default]
    Human,
    /// One JSON object per event, fields flattened to the top level.
    Json,
}

/// Filter directive for `-v` repeated `verbosity` times.
#[must_use]
pub const fn directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,causeway=info",
        2 => "info,causeway=debug",
        _ => "debug,causeway=trace",
    }
}

/// Whether to emit ANSI escapes on a stream.
#[must_use]
pub const fn wants_ansi(color: ColorChoice, is_terminal: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => is_terminal && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter =
        EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new(directive(verbosity)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2);

    let installed = match format {
        LogFormat::Human => builder
            .with_ansi(wants_ansi(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            ))
            .compact()
            .try_init(),
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
    };
    if installed.is_err() {
        tracing::trace!("log subscriber already installed");
    }
}

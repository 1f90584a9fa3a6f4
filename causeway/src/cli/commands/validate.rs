//! `validate` command handler
//!
//! Loads and validates scenario files without running them.

use std::path::Path;

use causeway_core::error::{ConfigError, Severity, ValidationIssue};
use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{ConfigLoader, LoadWarning};
use crate::error::CausewayError;

/// Per-file validation outcome for JSON output.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    scenario: String,
    steps: usize,
    warnings: Vec<String>,
}

/// Validate scenario files without running them.
///
/// # Errors
///
/// Returns an I/O error if any file does not exist, or a config error if
/// validation fails. With `--strict`, warnings fail validation too.
#[allow(clippy::unused_async)]
pub async fn run(args: &ValidateArgs) -> Result<(), CausewayError> {
    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());

    for path in &args.files {
        if !path.exists() {
            return Err(CausewayError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
        tracing::info!(file = %path.display(), "validating scenario");

        let result = loader.load(path)?;

        for warning in &result.warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }

        if args.strict && !result.warnings.is_empty() {
            return Err(strict_failure(path, &result.warnings).into());
        }

        tracing::info!(file = %path.display(), "scenario valid");
        reports.push(FileReport {
            file: path.display().to_string(),
            scenario: result.config.name,
            steps: result.config.steps.len(),
            warnings: result.warnings.iter().map(ToString::to_string).collect(),
        });
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                println!(
                    "ok {} ({}, {} step(s), {} warning(s))",
                    report.file,
                    report.scenario,
                    report.steps,
                    report.warnings.len()
                );
                for warning in &report.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    Ok(())
}

/// Promotes warnings to errors for `--strict`.
fn strict_failure(path: &Path, warnings: &[LoadWarning]) -> ConfigError {
    ConfigError::ValidationError {
        path: path.display().to_string(),
        errors: warnings
            .iter()
            .map(|w| ValidationIssue {
                path: w.location.clone().unwrap_or_default(),
                message: w.message.clone(),
                severity: Severity::Error,
            })
            .collect(),
    }
}

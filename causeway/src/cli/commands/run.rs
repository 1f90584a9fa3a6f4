//! `run` command handler
//!
//! Loads a scenario from a file or the built-in registry, drives it through
//! the phase tracker, and prints the run summary.

use causeway_core::config::ScenarioConfig;
use causeway_core::error::ConfigError;

use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::loader::{ConfigLoader, LoadResult};
use crate::error::CausewayError;
use crate::observability::{EventEmitter, format_summary};
use crate::runner::ScenarioRunner;
use crate::scenarios::{find_scenario, suggest_scenario};

/// Run a scenario and check its expectations.
///
/// # Errors
///
/// Returns a config error if the scenario cannot be loaded, an I/O error
/// if the journal file cannot be created, or
/// [`CausewayError::ExpectationsFailed`] if the run ends in a state the
/// scenario did not expect.
#[allow(clippy::unused_async)]
pub async fn run(args: &RunArgs) -> Result<(), CausewayError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let mut config = load_scenario(args)?;
    apply_cli_overrides(&mut config, args);

    tracing::info!(
        scenario = %config.name,
        runaway = %config.tracker.runaway,
        unconsumed_captures = %config.tracker.unconsumed_captures,
        "running scenario"
    );

    let mut runner = ScenarioRunner::new(config);
    if let Some(path) = &args.events_file {
        runner = runner.with_journal(EventEmitter::from_file(path)?);
    }
    let summary = runner.run();

    match args.format {
        OutputFormat::Human => print!("{}", format_summary(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if summary.passed {
        Ok(())
    } else {
        Err(CausewayError::ExpectationsFailed {
            scenario: summary.scenario,
            failures: summary.unmet,
        })
    }
}

/// Loads the scenario named by `--scenario` or `--builtin`.
fn load_scenario(args: &RunArgs) -> Result<ScenarioConfig, CausewayError> {
    let loader = ConfigLoader::with_defaults();

    let result: LoadResult = if let Some(path) = &args.scenario {
        tracing::info!(scenario = %path.display(), "loading scenario");
        loader.load(path)?
    } else if let Some(name) = &args.builtin {
        let builtin = find_scenario(name).ok_or_else(|| ConfigError::UnknownScenario {
            name: name.clone(),
            suggestion: suggest_scenario(name),
        })?;
        tracing::info!(builtin = builtin.name, "loading built-in scenario");
        loader.load_from_str(builtin.yaml)?
    } else {
        return Err(CausewayError::Usage(
            "either --scenario or --builtin is required".to_string(),
        ));
    };

    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    Ok(result.config)
}

/// Command-line policy flags win over the file and the environment.
const fn apply_cli_overrides(config: &mut ScenarioConfig, args: &RunArgs) {
    if let Some(policy) = args.runaway_policy {
        config.tracker.runaway = policy;
    }
    if let Some(policy) = args.unconsumed_captures {
        config.tracker.unconsumed_captures = policy;
    }
}

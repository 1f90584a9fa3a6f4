//! Metrics collection for `Causeway`.
//!
//! Prometheus-compatible metrics with typed convenience functions for
//! recording phase engine activity. Every label value comes from a closed
//! set (phase kinds, refusal reasons, outcomes), so cardinality is bounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::CausewayError;
use crate::phase::state::PhaseKind;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `CausewayError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), CausewayError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| CausewayError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "causeway_phase_pushes_total",
        "Total number of accepted phase pushes"
    );
    describe_counter!(
        "causeway_phase_refusals_total",
        "Total number of refused phase pushes by reason"
    );
    describe_counter!(
        "causeway_transactions_total",
        "Block transactions by outcome"
    );
    describe_counter!(
        "causeway_spawns_total",
        "Entities and items that entered the world"
    );
    describe_gauge!("causeway_stack_depth", "Current phase stack depth");
    describe_histogram!(
        "causeway_unwind_duration_ms",
        "Phase unwind duration in milliseconds"
    );
    describe_counter!("causeway_scenarios_total", "Scenario runs by outcome");
}

/// Records an accepted push.
pub fn record_phase_push(kind: PhaseKind) {
    counter!("causeway_phase_pushes_total", "phase" => kind.as_str()).increment(1);
}

/// Records a refused push.
pub fn record_refusal(reason: &'static str) {
    counter!("causeway_phase_refusals_total", "reason" => reason).increment(1);
}

/// Records `count` transactions with the given outcome.
pub fn record_transactions(outcome: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!("causeway_transactions_total", "outcome" => outcome).increment(count as u64);
}

/// Records `count` spawns of the given kind (`entity` or `item`).
pub fn record_spawns(kind: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!("causeway_spawns_total", "kind" => kind).increment(count as u64);
}

/// Sets the stack depth gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_stack_depth(depth: usize) {
    gauge!("causeway_stack_depth").set(depth as f64);
}

/// Records how long one unwind took.
pub fn record_unwind_duration(kind: PhaseKind, duration: Duration) {
    histogram!("causeway_unwind_duration_ms", "phase" => kind.as_str())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Records a finished scenario run.
pub fn record_scenario(passed: bool) {
    let outcome = if passed { "passed" } else { "failed" };
    counter!("causeway_scenarios_total", "outcome" => outcome).increment(1);
}

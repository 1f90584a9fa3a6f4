//! Human-readable reports
//!
//! Renders phase diagnostics and run summaries as plain text. The engine
//! only produces the structured values; all formatting lives here.

use std::fmt::Write;

use crate::phase::{CaptureCounts, FrameSnapshot, PhaseDiagnostic};
use crate::runner::RunSummary;

/// Renders a diagnostic as an indented block, stack listed bottom first.
#[must_use]
pub fn format_diagnostic(diagnostic: &PhaseDiagnostic) -> String {
    let mut out = diagnostic.message.clone();
    if let Some(requested) = diagnostic.requested {
        let _ = write!(out, "\n  requested: {requested}");
    }
    if let Some(subject) = &diagnostic.subject {
        let _ = write!(out, "\n  subject:   {}", format_frame(subject));
    }
    if diagnostic.frames.is_empty() {
        out.push_str("\n  stack:     (idle)");
    } else {
        out.push_str("\n  stack:");
        for frame in &diagnostic.frames {
            let _ = write!(out, "\n    {}", format_frame(frame));
        }
    }
    out
}

/// One line per frame: depth, kind, payload, attribution, captures.
#[must_use]
pub fn format_frame(frame: &FrameSnapshot) -> String {
    let mut line = format!("#{} {} [{}]", frame.depth, frame.phase, frame.payload);
    for (label, value) in [
        ("source", &frame.source),
        ("notifier", &frame.notifier),
        ("owner", &frame.owner),
    ] {
        if let Some(value) = value {
            let _ = write!(line, " {label}={value}");
        }
    }
    if !frame.captures.is_zero() {
        let _ = write!(line, " captures({})", format_counts(frame.captures));
    }
    line
}

fn format_counts(counts: CaptureCounts) -> String {
    [
        ("blocks", counts.blocks),
        ("entities", counts.entities),
        ("items", counts.items),
        ("entity_drops", counts.per_entity_drops),
        ("block_drops", counts.per_block_drops),
    ]
    .into_iter()
    .filter(|(_, n)| *n > 0)
    .map(|(label, n)| format!("{label}={n}"))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Renders a run summary, with every failure's diagnostic and every unmet
/// expectation.
#[must_use]
pub fn format_summary(summary: &RunSummary) -> String {
    let verdict = if summary.passed { "PASS" } else { "FAIL" };
    let mut out = format!("{verdict} {} ({} ms)\n", summary.scenario, summary.duration_ms);
    let _ = writeln!(
        out,
        "  phases: {} completed, {} refused, {} failed to unwind",
        summary.phases, summary.refused, summary.unwind_failures
    );
    let _ = writeln!(
        out,
        "  events: {} block, {} spawn, {} drop",
        summary.events.block, summary.events.spawn, summary.events.drop
    );
    let _ = writeln!(
        out,
        "  blocks: {} applied, {} restored",
        summary.applied, summary.restored
    );
    let _ = writeln!(
        out,
        "  entities: {} spawned, {} in world, {} drops discarded",
        summary.spawned, summary.entities, summary.discarded_drops
    );
    if summary.unconsumed > 0 {
        let _ = writeln!(out, "  unconsumed captures drained on {} pop(s)", summary.unconsumed);
    }

    for failure in &summary.failures {
        let _ = writeln!(out, "\n{} at {}: {}", failure.reason, failure.step, failure.message);
        out.push_str(&indent(&format_diagnostic(&failure.diagnostic)));
        out.push('\n');
    }

    if !summary.unmet.is_empty() {
        out.push_str("\nunmet expectations:\n");
        for line in &summary.unmet {
            let _ = writeln!(out, "  - {line}");
        }
    }
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseKind;

    fn frame(depth: usize, phase: PhaseKind) -> FrameSnapshot {
        FrameSnapshot {
            depth,
            phase,
            payload: "explosion at (0, 64, 0) in world (radius 4)".into(),
            source: Some("entity:minecraft:creeper".into()),
            notifier: None,
            owner: None,
            captures: CaptureCounts {
                blocks: 3,
                ..CaptureCounts::default()
            },
        }
    }

    #[test]
    fn diagnostic_lists_stack_bottom_first() {
        let diag = PhaseDiagnostic::new(
            "explosion repeats the frame at depth 1",
            vec![frame(1, PhaseKind::Explosion)],
        )
        .with_requested(PhaseKind::Explosion);
        let text = format_diagnostic(&diag);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "explosion repeats the frame at depth 1");
        assert_eq!(lines[1], "  requested: explosion");
        assert_eq!(lines[2], "  stack:");
        assert!(lines[3].starts_with("    #1 explosion [explosion at (0, 64, 0)"));
        assert!(lines[3].ends_with("source=entity:minecraft:creeper captures(blocks=3)"));
    }

    #[test]
    fn empty_stack_reads_idle() {
        let text = format_diagnostic(&PhaseDiagnostic::new("pop on an empty phase stack", Vec::new()));
        assert!(text.ends_with("stack:     (idle)"));
    }

    #[test]
    fn summary_shows_verdict_and_unmet() {
        let summary = RunSummary {
            scenario: "demo".into(),
            passed: false,
            phases: 2,
            unmet: vec!["entities: expected 1, found 0".into()],
            ..RunSummary::default()
        };
        let text = format_summary(&summary);
        assert!(text.starts_with("FAIL demo (0 ms)"));
        assert!(text.contains("phases: 2 completed, 0 refused"));
        assert!(text.contains("  - entities: expected 1, found 0"));
    }
}

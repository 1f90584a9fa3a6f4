//! `list` command handler
//!
//! Lists built-in scenarios grouped by category.

use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::CausewayError;
use crate::scenarios::{BuiltinScenario, ScenarioCategory, list_scenarios};

/// List built-in scenarios.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn run(args: &ListArgs) -> Result<(), CausewayError> {
    let scenarios = list_scenarios(args.category, args.tag.as_deref());
    tracing::info!(count = scenarios.len(), "listing built-in scenarios");

    match args.format {
        OutputFormat::Human => print!("{}", render_human(&scenarios)),
        OutputFormat::Json => {
            let items: Vec<_> = scenarios
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "category": s.category.to_string(),
                        "description": s.description,
                        "tags": s.tags,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}

fn render_human(scenarios: &[&BuiltinScenario]) -> String {
    if scenarios.is_empty() {
        return "no matching scenarios\n".to_string();
    }

    let mut out = String::new();
    for category in ScenarioCategory::all() {
        let group: Vec<_> = scenarios
            .iter()
            .filter(|s| s.category == *category)
            .collect();
        if group.is_empty() {
            continue;
        }
        out.push_str(category.label());
        out.push_str(":\n");
        for scenario in group {
            out.push_str(&format!(
                "  {:<26} {}\n",
                scenario.name, scenario.description
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_groups_by_category() {
        let text = render_human(&list_scenarios(None, None));
        let refusal = text.find("Refusal:").unwrap();
        let attribution = text.find("Attribution:").unwrap();
        assert!(attribution < refusal);
        assert!(text.contains("  tile-unload "));
    }

    #[test]
    fn empty_filter_says_so() {
        let text = render_human(&list_scenarios(None, Some("no-such-tag")));
        assert_eq!(text, "no matching scenarios\n");
    }
}

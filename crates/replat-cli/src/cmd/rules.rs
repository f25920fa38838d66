use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use replat_core::rules::{RuleOutcome, RuleTable};
use std::path::Path;

pub fn run(extra: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let table = RuleTable::with_overlay(extra).context("failed to load rule table")?;

    if json {
        return print_json(&table.rules());
    }

    let rows = table
        .rules()
        .iter()
        .map(|rule| {
            let (outcome, detail) = match &rule.outcome {
                RuleOutcome::Mapped { target, .. } => ("mapped", target.to_string()),
                RuleOutcome::NeedsDecision { options, .. } => (
                    "needs_decision",
                    options.iter().map(|o| o.id.as_str()).collect::<Vec<_>>().join(" | "),
                ),
                RuleOutcome::Unmappable { workaround, .. } => ("unmappable", truncate(workaround, 60)),
            };
            vec![
                rule.category.clone(),
                rule.platform.clone(),
                rule.engine.clone(),
                outcome.to_string(),
                detail,
            ]
        })
        .collect();
    print_table(&["CATEGORY", "PLATFORM", "ENGINE", "OUTCOME", "TARGET / OPTIONS"], rows);
    println!("\n{} rules", table.len());
    Ok(())
}

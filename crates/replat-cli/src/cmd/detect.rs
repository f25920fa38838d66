use crate::output::{print_json, print_table};
use anyhow::Context;
use replat_core::detect::detect_repo;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, detection) = detect_repo(root).with_context(|| format!("failed to scan {}", root.display()))?;

    if json {
        return print_json(&detection);
    }

    let rows = detection
        .candidates
        .iter()
        .map(|c| {
            vec![
                c.platform.to_string(),
                c.level.as_str().to_string(),
                c.confidence.to_string(),
                c.indicators.join(", "),
            ]
        })
        .collect();
    print_table(&["PLATFORM", "CONFIDENCE", "SCORE", "INDICATORS"], rows);

    if detection.is_ambiguous() {
        let tied: Vec<String> = detection.leaders.iter().map(|p| p.to_string()).collect();
        println!(
            "\nAmbiguous: {} tie; `replat migrate` will ask which one to migrate from.",
            tied.join(", ")
        );
    }
    Ok(())
}

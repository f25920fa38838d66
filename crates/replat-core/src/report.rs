//! MIGRATION.md rendering.
//!
//! Sections come in a fixed order (Mapped, Needs Decision, Unmappable) and
//! every decision in the set appears in exactly one of them, exactly once.

use crate::detect::Detection;
use crate::mapping::{DecisionSet, MappingDecision};
use crate::model::ArchitectureModel;
use crate::types::Classification;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub markdown: String,
}

pub struct ReportGenerator<'a> {
    decisions: &'a DecisionSet,
    detection: Option<&'a Detection>,
    model: Option<&'a ArchitectureModel>,
    app_name: Option<&'a str>,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(decisions: &'a DecisionSet) -> Self {
        Self {
            decisions,
            detection: None,
            model: None,
            app_name: None,
        }
    }

    pub fn with_detection(mut self, detection: &'a Detection) -> Self {
        self.detection = Some(detection);
        self
    }

    pub fn with_model(mut self, model: &'a ArchitectureModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_app_name(mut self, name: &'a str) -> Self {
        self.app_name = Some(name);
        self
    }

    pub fn generate(&self) -> ReportDocument {
        let mut out = String::new();
        self.header(&mut out);

        section(&mut out, "Mapped", self.decisions, Classification::Mapped, mapped_item);
        section(
            &mut out,
            "Needs Decision",
            self.decisions,
            Classification::NeedsDecision,
            needs_decision_item,
        );
        section(
            &mut out,
            "Unmappable",
            self.decisions,
            Classification::Unmappable,
            unmappable_item,
        );

        ReportDocument { markdown: out }
    }

    fn header(&self, out: &mut String) {
        let platform = self.decisions.source_platform.description();
        let _ = writeln!(out, "# Migration report: {platform} to DigitalOcean App Platform\n");
        if let Some(name) = self.app_name {
            let _ = writeln!(out, "- App spec: `{name}` (app.yaml)");
        }
        if let Some(detection) = self.detection {
            let primary = detection.primary();
            let _ = writeln!(
                out,
                "- Detected platform: {} (confidence {}; indicators: {})",
                primary.platform.description(),
                primary.level.as_str(),
                primary.indicators.join(", ")
            );
            if detection.is_ambiguous() {
                let tied: Vec<&str> = detection.leaders.iter().map(|p| p.description()).collect();
                let _ = writeln!(out, "- Ambiguous detection: {} are tied", tied.join(", "));
            }
            let others: Vec<String> = detection
                .candidates
                .iter()
                .skip(1)
                .map(|c| format!("{} ({})", c.platform.description(), c.level.as_str()))
                .collect();
            if !others.is_empty() {
                let _ = writeln!(out, "- Other evidence: {}", others.join(", "));
            }
        }
        if let Some(model) = self.model {
            match &model.runtime_version {
                Some(version) => {
                    let _ = writeln!(out, "- Runtime: {} {version}", model.runtime);
                }
                None => {
                    let _ = writeln!(out, "- Runtime: {}", model.runtime);
                }
            }
            if let Some(layout) = &model.monorepo {
                let dirs: Vec<String> = [("frontend", &layout.frontend), ("backend", &layout.backend)]
                    .into_iter()
                    .filter_map(|(role, dir)| dir.as_ref().map(|d| format!("{role} `{d}`")))
                    .collect();
                let _ = writeln!(out, "- Monorepo: {}", dirs.join(", "));
            }
            if !model.set_aside.is_empty() {
                let _ = writeln!(
                    out,
                    "- Set aside (declared by a platform that is not the source of truth): {}",
                    model.set_aside.join(", ")
                );
            }
        }
        let counts = self.decisions.counts();
        let _ = writeln!(
            out,
            "- Elements: {} ({} mapped, {} need a decision, {} unmappable)",
            self.decisions.len(),
            counts.mapped,
            counts.needs_decision,
            counts.unmappable
        );
        if counts.needs_decision > 0 {
            let _ = writeln!(
                out,
                "\nResolve every item under Needs Decision in an overrides file and run `replat migrate --overrides <file>` again."
            );
        }
    }
}

fn section(
    out: &mut String,
    title: &str,
    decisions: &DecisionSet,
    classification: Classification,
    item: fn(&mut String, &MappingDecision),
) {
    let _ = writeln!(out, "\n## {title}\n");
    let mut any = false;
    for decision in decisions.with_classification(classification) {
        item(out, decision);
        any = true;
    }
    if !any {
        let _ = writeln!(out, "_None._");
    }
}

fn mapped_item(out: &mut String, d: &MappingDecision) {
    let target = d
        .target
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    let _ = write!(out, "- `{}` → {target}: {}", d.subject, one_line(&d.rationale));
    if let Some(option) = &d.selected_option {
        let _ = write!(out, " (override: `{option}`)");
    }
    out.push('\n');
}

fn needs_decision_item(out: &mut String, d: &MappingDecision) {
    let _ = writeln!(out, "### `{}`\n", d.subject);
    if let Some(question) = &d.question {
        let _ = writeln!(out, "**{}**\n", one_line(question));
    }
    let _ = writeln!(out, "{}\n", one_line(&d.rationale));
    let _ = writeln!(out, "Options:\n");
    for option in &d.options {
        let _ = writeln!(
            out,
            "- `{}`: {} ({})",
            option.id,
            one_line(&option.description),
            option.target
        );
    }
    let example = d.options.first().map(|o| o.id.as_str()).unwrap_or("<option>");
    let _ = writeln!(
        out,
        "\nTo resolve, add to the overrides file:\n\n```yaml\ndecisions:\n  {}: {example}\n```\n",
        d.subject
    );
}

fn unmappable_item(out: &mut String, d: &MappingDecision) {
    let _ = writeln!(out, "### `{}`\n", d.subject);
    let _ = writeln!(out, "{}\n", one_line(&d.rationale));
    if let Some(workaround) = &d.workaround {
        let _ = writeln!(out, "Workaround: {}\n", one_line(workaround));
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

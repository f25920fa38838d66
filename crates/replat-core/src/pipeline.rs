//! End-to-end run: detect → parse → normalize → map → generate.
//!
//! Any stage error aborts the run before anything is written. Artifacts are
//! written only after the app spec has passed validation.

use crate::config::MigrationConfig;
use crate::detect::{detect_repo, Detection};
use crate::error::{ReplatError, Result};
use crate::io::{atomic_write, ensure_dir};
use crate::mapping::{DecisionCounts, DecisionSet, MappingEngine, Overrides};
use crate::model::{ArchitectureModel, ElementId};
use crate::normalize::Normalizer;
use crate::parse::parse_all;
use crate::paths;
use crate::report::{ReportDocument, ReportGenerator};
use crate::rules::RuleTable;
use crate::source::RepoScan;
use crate::spec::{GeneratedSpec, SpecGenerator};
use crate::types::PlatformId;
use crate::validate::AppSpecValidator;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Detection plus the normalized model of one repository.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub scan: RepoScan,
    pub detection: Detection,
    pub model: ArchitectureModel,
}

pub fn analyze(root: &Path, config: &MigrationConfig) -> Result<Analysis> {
    analyze_with(root, config, None)
}

/// Like [`analyze`], with the option an overrides file gives for the
/// `platform` element. The option only counts when detection is tied.
pub fn analyze_with(root: &Path, config: &MigrationConfig, platform: Option<&str>) -> Result<Analysis> {
    let (scan, detection) = detect_repo(root)?;
    let choice = match platform {
        Some(option) if detection.is_ambiguous() => Some(chosen_platform(&detection, option)?),
        _ => None,
    };
    let files = detection.source_files(&scan);
    tracing::debug!(files = files.len(), parallel = config.parallel, "parsing source files");
    let fragments = parse_all(&scan, &files, config.parallel)?;

    let runtime = scan.runtime();
    let mut normalizer = Normalizer::new(detection.primary().platform, detection.leaders.clone())
        .with_runtime(runtime)
        .with_runtime_version(scan.runtime_version(runtime))
        .with_monorepo(scan.monorepo_layout());
    if let Some(platform) = choice {
        tracing::info!(platform = %platform, "source platform chosen by override");
        normalizer = normalizer.with_choice(platform);
    }
    let model = normalizer.normalize(fragments)?;
    Ok(Analysis {
        scan,
        detection,
        model,
    })
}

fn chosen_platform(detection: &Detection, option: &str) -> Result<PlatformId> {
    option
        .parse::<PlatformId>()
        .ok()
        .filter(|p| detection.leaders.contains(p))
        .ok_or_else(|| ReplatError::InvalidOverride {
            element: ElementId::Platform.to_string(),
            option: option.to_string(),
            valid: detection.leaders.iter().map(|p| p.as_str().to_string()).collect(),
        })
}

/// Everything one run produces, before it is written.
#[derive(Debug, Clone)]
pub struct Migration {
    pub analysis: Analysis,
    pub decisions: DecisionSet,
    pub spec: GeneratedSpec,
    pub report: ReportDocument,
}

pub fn plan(root: &Path, config: &MigrationConfig, overrides: &Overrides) -> Result<Migration> {
    let analysis = analyze_with(root, config, overrides.get(&ElementId::Platform))?;
    let rules = RuleTable::with_overlay(config.rules_path_in(root).as_deref())?;
    let decisions = MappingEngine::new(&rules).map(&analysis.model, overrides)?;

    let app_name = config.resolve_app_name(root, analysis.model.app_name_hint.as_deref());
    let spec = SpecGenerator::new(&analysis.model, &decisions, config, app_name).generate(&AppSpecValidator)?;
    let report = ReportGenerator::new(&decisions)
        .with_detection(&analysis.detection)
        .with_model(&analysis.model)
        .with_app_name(&spec.spec.name)
        .generate();

    Ok(Migration {
        analysis,
        decisions,
        spec,
        report,
    })
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Artifacts {
    pub app_spec: PathBuf,
    pub env_template: PathBuf,
    pub report: PathBuf,
    pub deploy_template: PathBuf,
}

impl Migration {
    /// Write app.yaml, env-template.yaml, MIGRATION.md and
    /// deploy.template.yaml into `out_dir`.
    pub fn write(&self, out_dir: &Path) -> Result<Artifacts> {
        ensure_dir(out_dir)?;
        let env_template = self.spec.env_template_yaml()?;
        let deploy_template = self.spec.deploy_template_yaml()?;
        let artifacts = Artifacts {
            app_spec: paths::app_spec_path(out_dir),
            env_template: paths::env_template_path(out_dir),
            report: paths::report_path(out_dir),
            deploy_template: paths::deploy_template_path(out_dir),
        };
        atomic_write(&artifacts.app_spec, self.spec.document.as_bytes())?;
        atomic_write(&artifacts.env_template, env_template.as_bytes())?;
        atomic_write(&artifacts.report, self.report.markdown.as_bytes())?;
        atomic_write(&artifacts.deploy_template, deploy_template.as_bytes())?;
        tracing::info!(out = %out_dir.display(), "wrote migration artifacts");
        Ok(artifacts)
    }

    pub fn summary(&self, artifacts: Artifacts) -> MigrationSummary {
        MigrationSummary {
            platform: self.analysis.model.source_platform,
            ambiguous: self.analysis.detection.is_ambiguous(),
            app_name: self.spec.spec.name.clone(),
            region: self.spec.spec.region.clone(),
            counts: self.decisions.counts(),
            artifacts,
        }
    }
}

/// What `replat migrate` reports after writing.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub platform: PlatformId,
    pub ambiguous: bool,
    pub app_name: String,
    pub region: String,
    pub counts: DecisionCounts,
    pub artifacts: Artifacts,
}

/// Plan and write in one step. `out_dir` defaults to `<root>/.do`.
pub fn migrate(
    root: &Path,
    out_dir: Option<&Path>,
    config: &MigrationConfig,
    overrides: &Overrides,
) -> Result<MigrationSummary> {
    let migration = plan(root, config, overrides)?;
    let out_dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::default_output_dir(root));
    let artifacts = migration.write(&out_dir)?;
    Ok(migration.summary(artifacts))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

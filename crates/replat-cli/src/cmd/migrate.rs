use crate::output::print_json;
use crate::root::resolve_repo;
use anyhow::Context;
use clap::Args;
use replat_core::config::{MigrationConfig, WarnLevel};
use replat_core::mapping::Overrides;
use replat_core::pipeline::{self, MigrationSummary};
use replat_core::types::Environment;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct MigrateArgs {
    /// Repository path (default: enclosing git repository or current directory)
    pub repo: Option<PathBuf>,

    /// Output directory (default: <repo>/.do)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// YAML file answering Needs Decision items (`decisions: {element: option}`)
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    /// App name (default: source manifest name, then repository directory)
    #[arg(long)]
    pub name: Option<String>,

    /// Target environment: test or production
    #[arg(long = "env", value_name = "ENV")]
    pub environment: Option<Environment>,

    /// App Platform region slug
    #[arg(long)]
    pub region: Option<String>,

    /// Git URL the generated components build from
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Git branch the generated components build from
    #[arg(long)]
    pub branch: Option<String>,

    /// Extra rule file overlaid on the built-in rules
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Config file (default: <repo>/replat.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Parse source files one at a time
    #[arg(long)]
    pub sequential: bool,
}

pub fn run(args: MigrateArgs, json: bool) -> anyhow::Result<()> {
    let root = resolve_repo(args.repo.as_deref());
    let config = load_config(&root, &args)?;

    let warnings = config.validate();
    for w in &warnings {
        let prefix = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("[{prefix}] {}", w.message);
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("configuration has errors");
    }

    let overrides = match &args.overrides {
        Some(path) => Overrides::load(path)
            .with_context(|| format!("failed to load overrides from {}", path.display()))?,
        None => Overrides::default(),
    };

    let summary = pipeline::migrate(&root, args.out.as_deref(), &config, &overrides)
        .with_context(|| format!("migration of {} failed", root.display()))?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn load_config(root: &Path, args: &MigrateArgs) -> anyhow::Result<MigrationConfig> {
    let mut config = match &args.config {
        Some(path) => MigrationConfig::load_from(path),
        None => MigrationConfig::load(root),
    }
    .context("failed to load config")?;

    if let Some(name) = &args.name {
        config.app_name = Some(name.clone());
    }
    if let Some(environment) = args.environment {
        config.environment = environment;
    }
    if let Some(region) = &args.region {
        config.region = Some(region.clone());
    }
    if let Some(url) = &args.repo_url {
        config.repo_url = Some(url.clone());
    }
    if let Some(branch) = &args.branch {
        config.branch = branch.clone();
    }
    if let Some(rules) = &args.rules {
        // Relative to where the command runs, not to the repository.
        config.rules_path = Some(std::env::current_dir()?.join(rules));
    }
    if args.sequential {
        config.parallel = false;
    }
    Ok(config)
}

fn print_summary(summary: &MigrationSummary) {
    let counts = &summary.counts;
    let ambiguous = if summary.ambiguous { " (ambiguous)" } else { "" };
    println!("Source platform: {}{ambiguous}", summary.platform.description());
    println!("App: {} (region {})", summary.app_name, summary.region);
    println!(
        "Decisions: {} mapped, {} need a decision, {} unmappable",
        counts.mapped, counts.needs_decision, counts.unmappable
    );
    println!("Wrote:");
    for path in [
        &summary.artifacts.app_spec,
        &summary.artifacts.env_template,
        &summary.artifacts.report,
        &summary.artifacts.deploy_template,
    ] {
        println!("  {}", path.display());
    }
    if counts.needs_decision > 0 || counts.unmappable > 0 {
        println!(
            "Review {} before deploying.",
            summary.artifacts.report.display()
        );
    }
}

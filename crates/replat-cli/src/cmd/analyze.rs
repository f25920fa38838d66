use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use replat_core::config::MigrationConfig;
use replat_core::pipeline;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = MigrationConfig::load(root).context("failed to load config")?;
    let analysis = pipeline::analyze(root, &config).with_context(|| format!("failed to analyze {}", root.display()))?;
    let model = &analysis.model;

    if json {
        return print_json(model);
    }

    let runtime = match &model.runtime_version {
        Some(version) => format!("{} {version}", model.runtime),
        None => model.runtime.to_string(),
    };
    println!(
        "Platform: {}  Runtime: {runtime}  Sources: {}",
        model.source_platform,
        model.sources.join(", ")
    );
    if let Some(layout) = &model.monorepo {
        println!(
            "Monorepo: frontend {}  backend {}",
            layout.frontend.as_deref().unwrap_or("-"),
            layout.backend.as_deref().unwrap_or("-")
        );
    }
    if !model.set_aside.is_empty() {
        println!("Set aside: {}", model.set_aside.join(", "));
    }

    println!("\nProcesses");
    let rows = model
        .processes
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.kind.to_string(),
                p.build.to_string(),
                p.port.map(|port| port.to_string()).unwrap_or_default(),
                truncate(&p.command, 48),
                p.origin.to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "KIND", "BUILD", "PORT", "COMMAND", "SOURCE"], rows);

    if !model.dependencies.is_empty() {
        println!("\nDependencies");
        let rows = model
            .dependencies
            .iter()
            .map(|d| {
                vec![
                    d.category.to_string(),
                    d.engine_hint.clone(),
                    d.source_name.clone(),
                    d.version.clone().unwrap_or_default(),
                    d.origin.to_string(),
                ]
            })
            .collect();
        print_table(&["CATEGORY", "ENGINE", "NAME", "VERSION", "SOURCE"], rows);
    }

    if !model.env_vars.is_empty() {
        println!("\nEnvironment");
        let rows = model
            .env_vars
            .iter()
            .map(|e| {
                vec![
                    e.key.clone(),
                    if e.is_secret_hint { "yes" } else { "" }.to_string(),
                    e.origin.to_string(),
                ]
            })
            .collect();
        print_table(&["KEY", "SECRET", "SOURCE"], rows);
    }

    if !model.schedules.is_empty() {
        println!("\nSchedules");
        let rows = model
            .schedules
            .iter()
            .map(|s| vec![s.name.clone(), s.cron_expression.clone(), truncate(&s.command, 48)])
            .collect();
        print_table(&["NAME", "CRON", "COMMAND"], rows);
    }
    Ok(())
}

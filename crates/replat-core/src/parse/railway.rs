//! Railway config-as-code (`railway.json`, `railway.toml`). Both files share
//! one schema; a file describes a single service.

use super::{CommandSpec, ParseContext, PartialIr};
use crate::error::Result;
use crate::model::{ProcessComponent, ScheduleSpec};
use crate::paths;
use crate::types::{BuildSource, ProcessKind};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RailwayConfig {
    build: Build,
    deploy: Deploy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Build {
    builder: Option<String>,
    dockerfile_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Deploy {
    start_command: Option<String>,
    pre_deploy_command: Option<CommandSpec>,
    cron_schedule: Option<String>,
    healthcheck_path: Option<String>,
    num_replicas: Option<u32>,
}

pub fn parse_json(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let config: RailwayConfig = ctx.json(content)?;
    build_fragment(ctx, config)
}

pub fn parse_toml(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let config: RailwayConfig = ctx.toml(content)?;
    build_fragment(ctx, config)
}

fn build_fragment(ctx: &ParseContext, config: RailwayConfig) -> Result<PartialIr> {
    let mut fragment = ctx.fragment();
    let deploy = config.deploy;
    let command = deploy.start_command.unwrap_or_default();

    let mut process = match deploy.cron_schedule.as_deref().map(str::trim) {
        Some("") => return Err(ctx.error(None, "deploy.cronSchedule is empty")),
        Some(cron) => {
            fragment.schedules.push(ScheduleSpec {
                name: "cron".to_string(),
                cron_expression: cron.to_string(),
                command: command.trim().to_string(),
                origin: ctx.origin(),
            });
            ProcessComponent::new("cron", ProcessKind::Scheduled, ctx.origin())
        }
        None => ProcessComponent::new("web", ProcessKind::Web, ctx.origin()),
    }
    .with_command(command);
    process.health_check_path = deploy.healthcheck_path;
    process.instances = deploy.num_replicas;

    let dockerfile = config.build.dockerfile_path.map(|p| p.trim_start_matches("./").to_string());
    let uses_dockerfile = dockerfile.is_some()
        || config
            .build
            .builder
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case("dockerfile"));
    if uses_dockerfile {
        let path = dockerfile.unwrap_or_else(|| "Dockerfile".to_string());
        process.source_dir = paths::source_dir_of(&path);
        process.dockerfile_path = Some(path);
        process.build = BuildSource::Dockerfile;
    }

    if let Some(pre) = deploy.pre_deploy_command {
        let line = match pre {
            CommandSpec::Line(line) => line.trim().to_string(),
            CommandSpec::Argv(commands) => commands.join(" && "),
        };
        if !line.is_empty() {
            let mut release = ProcessComponent::new("release", ProcessKind::Release, ctx.origin()).with_command(line);
            release.source_dir = process.source_dir.clone();
            release.build = process.build;
            release.dockerfile_path = process.dockerfile_path.clone();
            fragment.processes.push(release);
        }
    }
    fragment.processes.insert(0, process);

    Ok(fragment)
}

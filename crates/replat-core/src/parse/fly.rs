//! Fly.io app configuration (`fly.toml`).

use super::{ParseContext, PartialIr};
use crate::error::Result;
use crate::model::{DependencyRef, ProcessComponent};
use crate::paths;
use crate::types::{BuildSource, DependencyCategory, ProcessKind};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Process group Fly runs when `[processes]` is absent.
const DEFAULT_GROUP: &str = "app";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlyToml {
    app: Option<String>,
    primary_region: Option<String>,
    build: Build,
    deploy: Deploy,
    env: BTreeMap<String, toml::Value>,
    processes: BTreeMap<String, String>,
    http_service: Option<HttpService>,
    services: Vec<Service>,
    mounts: Vec<Mount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Build {
    dockerfile: Option<String>,
    image: Option<String>,
    builder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Deploy {
    release_command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpService {
    internal_port: Option<u16>,
    processes: Vec<String>,
    checks: Vec<Check>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Service {
    internal_port: Option<u16>,
    processes: Vec<String>,
    http_checks: Vec<Check>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Check {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Mount {
    source: String,
}

/// Port and health check for one process group, if anything routes to it.
#[derive(Debug, Default, Clone)]
struct Exposure {
    port: Option<u16>,
    health_check_path: Option<String>,
}

fn exposures(fly: &FlyToml) -> BTreeMap<String, Exposure> {
    let mut out: BTreeMap<String, Exposure> = BTreeMap::new();
    let mut add = |groups: &[String], port: Option<u16>, checks: &[Check]| {
        let health = checks.iter().find_map(|c| c.path.clone());
        let default_group = [DEFAULT_GROUP.to_string()];
        let groups = if groups.is_empty() { &default_group[..] } else { groups };
        for group in groups {
            let entry = out.entry(group.clone()).or_default();
            entry.port = entry.port.or(port);
            if entry.health_check_path.is_none() {
                entry.health_check_path = health.clone();
            }
        }
    };
    if let Some(http) = &fly.http_service {
        add(&http.processes, http.internal_port, &http.checks);
    }
    for svc in &fly.services {
        add(&svc.processes, svc.internal_port, &svc.http_checks);
    }
    out
}

pub fn parse(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let fly: FlyToml = ctx.toml(content)?;
    let mut fragment = ctx.fragment();
    fragment.app_name_hint = fly.app.clone();
    fragment.region_hint = fly.primary_region.clone();

    let exposed = exposures(&fly);
    let mut groups: Vec<(String, String)> = fly
        .processes
        .iter()
        .map(|(name, cmd)| (name.clone(), cmd.clone()))
        .collect();
    if groups.is_empty() {
        groups.push((DEFAULT_GROUP.to_string(), String::new()));
    }
    for name in exposed.keys() {
        if !groups.iter().any(|(g, _)| g == name) {
            return Err(ctx.error(
                None,
                format!("a service routes to process group '{name}', which is not declared"),
            ));
        }
    }

    let build = |mut process: ProcessComponent| -> ProcessComponent {
        if let Some(image) = &fly.build.image {
            process = process.with_image(image.as_str());
        } else if let Some(dockerfile) = &fly.build.dockerfile {
            let dockerfile = dockerfile.trim_start_matches("./").to_string();
            process.source_dir = paths::source_dir_of(&dockerfile);
            process.dockerfile_path = Some(dockerfile);
            process.build = BuildSource::Dockerfile;
        } else if fly.build.builder.is_some() {
            process.build = BuildSource::Buildpack;
        }
        process
    };

    for (name, command) in groups {
        let exposure = exposed.get(&name);
        let kind = if exposure.is_some() {
            ProcessKind::Web
        } else {
            ProcessKind::Worker
        };
        let mut process = ProcessComponent::new(name.as_str(), kind, ctx.origin()).with_command(command);
        if let Some(exposure) = exposure {
            process.port = exposure.port;
            process.health_check_path = exposure.health_check_path.clone();
        }
        fragment.processes.push(build(process));
    }

    if let Some(release) = fly.deploy.release_command.as_deref().filter(|c| !c.trim().is_empty()) {
        let process = ProcessComponent::new("release", ProcessKind::Release, ctx.origin()).with_command(release);
        fragment.processes.push(build(process));
    }

    for (key, value) in &fly.env {
        let literal = !matches!(value, toml::Value::String(s) if s.is_empty());
        fragment.env_vars.push(ctx.env(key, literal));
    }

    for mount in &fly.mounts {
        fragment.dependencies.push(DependencyRef {
            category: DependencyCategory::Storage,
            engine_hint: "volume".to_string(),
            source_name: mount.source.clone(),
            required_env_vars: Vec::new(),
            version: None,
            origin: ctx.origin(),
        });
    }

    Ok(fragment)
}

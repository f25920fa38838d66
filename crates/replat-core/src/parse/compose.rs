//! Docker Compose files (`docker-compose.yml`, `compose.yaml`).
//!
//! Each service is either a datastore (see [`images`](super::images)) and
//! becomes a dependency, or an application process. A datastore is known by
//! its image, or by an infrastructure service name such as `db` when the
//! image is custom. Application services that publish a port are web
//! processes; everything else is a worker.

use super::{images, parse_port, CommandSpec, ParseContext, PartialIr};
use crate::error::Result;
use crate::model::ProcessComponent;
use crate::paths;
use crate::types::{BuildSource, ProcessKind};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, Service>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Service {
    image: Option<String>,
    build: Option<BuildSpec>,
    command: Option<CommandSpec>,
    ports: Vec<PortSpec>,
    expose: Vec<PortSpec>,
    environment: Option<EnvironmentSpec>,
    deploy: Option<Deploy>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BuildSpec {
    Context(String),
    Full {
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortSpec {
    Number(u32),
    Short(String),
    Long { target: u32 },
}

impl PortSpec {
    /// The container-side port of the mapping.
    fn container_port(&self) -> Option<u16> {
        match self {
            PortSpec::Number(n) | PortSpec::Long { target: n } => u16::try_from(*n).ok(),
            PortSpec::Short(s) => {
                // [ip:][host:]container[-range][/proto]
                let container = s.rsplit(':').next().unwrap_or(s);
                let container = container.split('/').next().unwrap_or(container);
                let container = container.split('-').next().unwrap_or(container);
                parse_port(container)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvironmentSpec {
    List(Vec<String>),
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
}

impl EnvironmentSpec {
    /// `(key, has_literal_value)` pairs in declaration order.
    fn entries(&self) -> Vec<(String, bool)> {
        match self {
            EnvironmentSpec::List(items) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.trim().to_string(), is_literal(v)),
                    None => (item.trim().to_string(), false),
                })
                .collect(),
            EnvironmentSpec::Map(map) => map
                .iter()
                .map(|(k, v)| {
                    let literal = match v {
                        None | Some(serde_yaml::Value::Null) => false,
                        Some(serde_yaml::Value::String(s)) => is_literal(s),
                        Some(_) => true,
                    };
                    (k.clone(), literal)
                })
                .collect(),
        }
    }
}

/// Interpolated values (`${VAR}`) come from the host, not the file.
fn is_literal(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && !v.starts_with("${")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Deploy {
    replicas: Option<u32>,
}

pub fn parse(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let file: ComposeFile = ctx.yaml(content)?;
    if file.services.is_empty() {
        return Err(ctx.error(None, "no services declared"));
    }
    let mut fragment = ctx.fragment();
    fragment.app_name_hint = file.name;

    for (name, svc) in &file.services {
        if svc.build.is_none() {
            if let Some(dep) = svc
                .image
                .as_deref()
                .and_then(|image| images::dependency_for(ctx, name, image))
            {
                fragment.dependencies.push(dep);
                continue;
            }
        }
        if let Some(dep) = images::dependency_for_service_name(ctx, name, svc.image.as_deref()) {
            fragment.dependencies.push(dep);
            continue;
        }

        let published = svc.ports.iter().find_map(PortSpec::container_port);
        let kind = if published.is_some() {
            ProcessKind::Web
        } else {
            ProcessKind::Worker
        };
        let port = published.or_else(|| svc.expose.iter().find_map(PortSpec::container_port));
        let mut process = ProcessComponent::new(name.as_str(), kind, ctx.origin()).with_port(port);
        if let Some(cmd) = &svc.command {
            process = process.with_command(cmd.render());
        }
        match (&svc.build, &svc.image) {
            (Some(build), _) => {
                let (context, dockerfile) = match build {
                    BuildSpec::Context(c) => (c.as_str(), None),
                    BuildSpec::Full {
                        context,
                        dockerfile,
                    } => (context.as_deref().unwrap_or("."), dockerfile.as_deref()),
                };
                process.source_dir = paths::normalize_source_dir(context);
                process.build = BuildSource::Dockerfile;
                process.dockerfile_path = Some(dockerfile_path(&process.source_dir, dockerfile));
            }
            (None, Some(image)) => process = process.with_image(image.as_str()),
            (None, None) => {
                return Err(ctx.error(
                    None,
                    format!("service '{name}' has neither 'image' nor 'build'"),
                ))
            }
        }
        process.instances = svc.deploy.as_ref().and_then(|d| d.replicas);

        if let Some(env) = &svc.environment {
            for (key, literal) in env.entries() {
                fragment.env_vars.push(ctx.env(&key, literal));
            }
        }
        fragment.processes.push(process);
    }

    Ok(fragment)
}

/// Repository-relative Dockerfile path for a build context.
fn dockerfile_path(source_dir: &str, dockerfile: Option<&str>) -> String {
    let file = dockerfile.unwrap_or("Dockerfile").trim_start_matches("./");
    match source_dir.trim_start_matches('/') {
        "" => file.to_string(),
        dir => format!("{dir}/{file}"),
    }
}

//! Render blueprints (`render.yaml`).

use super::{parse_port, ParseContext, PartialIr};
use crate::error::Result;
use crate::model::{DependencyRef, ProcessComponent, ScheduleSpec};
use crate::paths;
use crate::types::{BuildSource, DependencyCategory, ProcessKind};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Blueprint {
    services: Vec<Service>,
    databases: Vec<Database>,
    #[serde(rename = "envVarGroups")]
    env_var_groups: Vec<EnvGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Service {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default, alias = "env")]
    runtime: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    build_command: Option<String>,
    #[serde(default)]
    start_command: Option<String>,
    #[serde(default)]
    docker_command: Option<String>,
    #[serde(default)]
    root_dir: Option<String>,
    #[serde(default)]
    dockerfile_path: Option<String>,
    #[serde(default)]
    image: Option<ImageRef>,
    #[serde(default)]
    health_check_path: Option<String>,
    #[serde(default)]
    num_instances: Option<u32>,
    #[serde(default)]
    schedule: Option<String>,
    #[serde(default)]
    static_publish_path: Option<String>,
    #[serde(default)]
    disk: Option<Disk>,
    #[serde(default)]
    env_vars: Vec<EnvVar>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Disk {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Database {
    name: String,
    #[serde(default)]
    postgres_major_version: Option<serde_yaml::Value>,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvGroup {
    #[serde(default)]
    env_vars: Vec<EnvVar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvVar {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<serde_yaml::Value>,
    #[serde(default)]
    from_database: Option<FromRef>,
    #[serde(default)]
    from_service: Option<FromService>,
    #[serde(default)]
    generate_value: Option<bool>,
    #[serde(default)]
    sync: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FromRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FromService {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Who a `fromDatabase`/`fromService` reference points at, keyed by name.
type Bindings = BTreeMap<String, Vec<String>>;

fn collect_bindings<'a>(vars: impl Iterator<Item = &'a EnvVar>) -> Bindings {
    let mut bindings = Bindings::new();
    for var in vars {
        let Some(key) = &var.key else { continue };
        let target = var
            .from_database
            .as_ref()
            .map(|d| &d.name)
            .or(var.from_service.as_ref().map(|s| &s.name));
        if let Some(target) = target {
            let keys = bindings.entry(target.clone()).or_default();
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    bindings
}

fn push_env(ctx: &ParseContext, fragment: &mut PartialIr, vars: &[EnvVar]) {
    for var in vars {
        let Some(key) = var.key.as_deref() else {
            // `fromGroup` entries; the group itself is parsed separately.
            continue;
        };
        let decl = if let Some(db) = &var.from_database {
            ctx.secret_env(key, format!("connection string of render database '{}'", db.name))
        } else if var.generate_value == Some(true) {
            ctx.secret_env(key, "generated by render")
        } else if var.sync == Some(false) {
            ctx.secret_env(key, "set in the render dashboard (sync: false)")
        } else if let Some(svc) = &var.from_service {
            let mut decl = ctx.env(key, false);
            decl.note = Some(format!("reference to render {} '{}'", svc.kind, svc.name));
            decl
        } else {
            let literal = match &var.value {
                None | Some(serde_yaml::Value::Null) => false,
                Some(serde_yaml::Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            };
            ctx.env(key, literal)
        };
        fragment.env_vars.push(decl);
    }
}

fn value_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn dependency(
    ctx: &ParseContext,
    bindings: &Bindings,
    name: &str,
    category: DependencyCategory,
    engine: &str,
    default_env: &str,
    version: Option<String>,
) -> DependencyRef {
    let required_env_vars = bindings
        .get(name)
        .cloned()
        .unwrap_or_else(|| vec![default_env.to_string()]);
    DependencyRef {
        category,
        engine_hint: engine.to_string(),
        source_name: name.to_string(),
        required_env_vars,
        version,
        origin: ctx.origin(),
    }
}

pub fn parse(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let blueprint: Blueprint = ctx.yaml(content)?;
    if blueprint.services.is_empty() && blueprint.databases.is_empty() {
        return Err(ctx.error(None, "blueprint declares no services or databases"));
    }
    let mut fragment = ctx.fragment();
    let bindings = collect_bindings(
        blueprint
            .services
            .iter()
            .flat_map(|s| s.env_vars.iter())
            .chain(blueprint.env_var_groups.iter().flat_map(|g| g.env_vars.iter())),
    );

    for db in &blueprint.databases {
        let version = db.postgres_major_version.as_ref().and_then(value_string);
        fragment.dependencies.push(dependency(
            ctx,
            &bindings,
            &db.name,
            DependencyCategory::Database,
            "postgres",
            "DATABASE_URL",
            version,
        ));
        if fragment.region_hint.is_none() {
            fragment.region_hint = db.region.clone();
        }
    }

    for svc in &blueprint.services {
        if fragment.region_hint.is_none() {
            fragment.region_hint = svc.region.clone();
        }
        let runtime = svc.runtime.as_deref().unwrap_or_default();
        let kind = match (svc.kind.as_str(), runtime) {
            ("redis", _) | ("keyvalue", _) => {
                let engine = if svc.kind == "redis" { "redis" } else { "valkey" };
                fragment.dependencies.push(dependency(
                    ctx,
                    &bindings,
                    &svc.name,
                    DependencyCategory::Cache,
                    engine,
                    "REDIS_URL",
                    None,
                ));
                continue;
            }
            ("web", "static") | ("static", _) => ProcessKind::Static,
            ("web", _) => ProcessKind::Web,
            ("pserv", _) | ("worker", _) | ("bworker", _) => ProcessKind::Worker,
            ("cron", _) => ProcessKind::Scheduled,
            (other, _) => {
                return Err(ctx.error(
                    None,
                    format!("service '{}' has unknown type '{other}'", svc.name),
                ))
            }
        };

        let command = svc
            .start_command
            .as_deref()
            .or(svc.docker_command.as_deref())
            .unwrap_or_default();
        let mut process = ProcessComponent::new(svc.name.as_str(), kind, ctx.origin()).with_command(command);
        process.source_dir = paths::normalize_source_dir(svc.root_dir.as_deref().unwrap_or("."));
        process.health_check_path = svc.health_check_path.clone();
        process.instances = svc.num_instances;
        match runtime {
            "docker" => {
                process.build = BuildSource::Dockerfile;
                let dockerfile = svc
                    .dockerfile_path
                    .as_deref()
                    .unwrap_or("Dockerfile")
                    .trim_start_matches("./");
                process.dockerfile_path = Some(match process.source_dir.trim_start_matches('/') {
                    "" => dockerfile.to_string(),
                    dir => format!("{dir}/{dockerfile}"),
                });
            }
            "image" => match &svc.image {
                Some(image) => process = process.with_image(image.url.as_str()),
                None => {
                    return Err(ctx.error(
                        None,
                        format!("service '{}' has runtime 'image' but no image.url", svc.name),
                    ))
                }
            },
            _ => {}
        }
        if kind == ProcessKind::Static {
            process.build_command = svc.build_command.clone();
            process.output_dir = svc.static_publish_path.clone();
        }
        process.port = svc
            .env_vars
            .iter()
            .find(|v| v.key.as_deref() == Some("PORT"))
            .and_then(|v| v.value.as_ref())
            .and_then(value_string)
            .and_then(|p| parse_port(&p));

        if kind == ProcessKind::Scheduled {
            let Some(cron) = svc.schedule.as_deref() else {
                return Err(ctx.error(None, format!("cron service '{}' has no schedule", svc.name)));
            };
            fragment.schedules.push(ScheduleSpec {
                name: svc.name.clone(),
                cron_expression: cron.trim().to_string(),
                command: process.command.clone(),
                origin: ctx.origin(),
            });
        }
        if let Some(disk) = &svc.disk {
            fragment.dependencies.push(DependencyRef {
                category: DependencyCategory::Storage,
                engine_hint: "volume".to_string(),
                source_name: format!("{}:{}", svc.name, disk.name),
                required_env_vars: Vec::new(),
                version: None,
                origin: ctx.origin(),
            });
        }
        push_env(ctx, &mut fragment, &svc.env_vars);
        fragment.processes.push(process);
    }

    for group in &blueprint.env_var_groups {
        push_env(ctx, &mut fragment, &group.env_vars);
    }

    Ok(fragment)
}

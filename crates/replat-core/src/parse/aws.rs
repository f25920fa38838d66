//! AWS manifests: ECS task definitions, App Runner `apprunner.yaml`, and
//! Elastic Beanstalk `Dockerrun.aws.json` (v1 single-container and v2
//! multi-container).

use super::{images, CommandSpec, ParseContext, PartialIr};
use crate::error::Result;
use crate::model::ProcessComponent;
use crate::types::ProcessKind;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// App Runner's port when `run.network.port` is omitted.
const APPRUNNER_DEFAULT_PORT: u16 = 8080;

// ---------------------------------------------------------------------------
// Container definitions (ECS and Dockerrun v2)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerDefinition {
    name: String,
    image: String,
    #[serde(default)]
    port_mappings: Vec<PortMapping>,
    #[serde(default)]
    environment: Vec<NameValue>,
    #[serde(default)]
    secrets: Vec<Secret>,
    #[serde(default)]
    command: Option<CommandSpec>,
    #[serde(default)]
    entry_point: Option<CommandSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortMapping {
    container_port: u16,
}

#[derive(Debug, Deserialize)]
struct NameValue {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Secret {
    name: String,
    value_from: String,
}

static ECR_RE: OnceLock<Regex> = OnceLock::new();

fn ecr_re() -> &'static Regex {
    ECR_RE.get_or_init(|| Regex::new(r"\.dkr\.ecr\.([a-z0-9-]+)\.amazonaws\.com").unwrap())
}

/// Region of an ECR-hosted image, e.g. `us-east-1`.
pub fn ecr_region(image: &str) -> Option<String> {
    ecr_re().captures(image).map(|c| c[1].to_string())
}

fn push_containers(ctx: &ParseContext, fragment: &mut PartialIr, containers: &[ContainerDefinition]) -> Result<()> {
    if containers.is_empty() {
        return Err(ctx.error(None, "containerDefinitions is empty"));
    }
    for def in containers {
        if let Some(dep) = images::dependency_for(ctx, &def.name, &def.image) {
            fragment.dependencies.push(dep);
            continue;
        }
        if fragment.region_hint.is_none() {
            fragment.region_hint = ecr_region(&def.image);
        }
        let port = def.port_mappings.first().map(|p| p.container_port);
        let kind = if port.is_some() {
            ProcessKind::Web
        } else {
            ProcessKind::Worker
        };
        let command = [def.entry_point.as_ref(), def.command.as_ref()]
            .into_iter()
            .flatten()
            .map(CommandSpec::render)
            .collect::<Vec<_>>()
            .join(" ");
        fragment.processes.push(
            ProcessComponent::new(def.name.as_str(), kind, ctx.origin())
                .with_command(command)
                .with_port(port)
                .with_image(def.image.as_str()),
        );
        for var in &def.environment {
            fragment
                .env_vars
                .push(ctx.env(&var.name, var.value.as_deref().is_some_and(|v| !v.is_empty())));
        }
        for secret in &def.secrets {
            fragment
                .env_vars
                .push(ctx.secret_env(&secret.name, format!("from {}", secret.value_from)));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ECS task definition
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinition {
    #[serde(default)]
    family: Option<String>,
    container_definitions: Vec<ContainerDefinition>,
}

pub fn parse_task_definition(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let task: TaskDefinition = ctx.json(content)?;
    let mut fragment = ctx.fragment();
    fragment.app_name_hint = task.family;
    push_containers(ctx, &mut fragment, &task.container_definitions)?;
    Ok(fragment)
}

// ---------------------------------------------------------------------------
// App Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AppRunnerYaml {
    #[serde(default)]
    run: AppRunnerRun,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppRunnerRun {
    command: Option<String>,
    network: Option<AppRunnerNetwork>,
    env: Vec<NameValue>,
    secrets: Vec<AppRunnerSecret>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppRunnerNetwork {
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct AppRunnerSecret {
    name: String,
    #[serde(rename = "value-from")]
    value_from: String,
}

pub fn parse_apprunner(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let config: AppRunnerYaml = ctx.yaml(content)?;
    let mut fragment = ctx.fragment();
    let run = config.run;
    let port = run
        .network
        .and_then(|n| n.port)
        .unwrap_or(APPRUNNER_DEFAULT_PORT);
    fragment.processes.push(
        ProcessComponent::new("web", ProcessKind::Web, ctx.origin())
            .with_command(run.command.unwrap_or_default())
            .with_port(Some(port)),
    );
    for var in &run.env {
        fragment
            .env_vars
            .push(ctx.env(&var.name, var.value.as_deref().is_some_and(|v| !v.is_empty())));
    }
    for secret in &run.secrets {
        fragment
            .env_vars
            .push(ctx.secret_env(&secret.name, format!("from {}", secret.value_from)));
    }
    Ok(fragment)
}

// ---------------------------------------------------------------------------
// Elastic Beanstalk Dockerrun
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Dockerrun {
    #[serde(rename = "AWSEBDockerrunVersion")]
    version: serde_json::Value,
    #[serde(rename = "Image", default)]
    image: Option<DockerrunImage>,
    #[serde(rename = "Ports", default)]
    ports: Vec<DockerrunPort>,
    #[serde(rename = "containerDefinitions", default)]
    container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Deserialize)]
struct DockerrunImage {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct DockerrunPort {
    #[serde(rename = "ContainerPort")]
    container_port: serde_json::Value,
}

pub fn parse_dockerrun(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let run: Dockerrun = ctx.json(content)?;
    let mut fragment = ctx.fragment();
    let version = match &run.version {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    match version.as_str() {
        "1" => {
            // Without an image, Beanstalk builds the Dockerfile next to this file.
            let port = run.ports.first().and_then(|p| match &p.container_port {
                serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
                serde_json::Value::String(s) => super::parse_port(s),
                _ => None,
            });
            let mut process = ProcessComponent::new("web", ProcessKind::Web, ctx.origin()).with_port(port);
            if let Some(image) = &run.image {
                process = process.with_image(image.name.as_str());
            }
            fragment.processes.push(process);
        }
        "2" => push_containers(ctx, &mut fragment, &run.container_definitions)?,
        other => {
            return Err(ctx.error(
                None,
                format!("unsupported AWSEBDockerrunVersion '{other}' (expected 1 or 2)"),
            ))
        }
    }
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildSource, DependencyCategory, SourceFormat};

    #[test]
    fn ecs_task_definition() {
        let ctx = ParseContext::new("deploy/task-definition.json", SourceFormat::EcsTaskDefinition);
        let json = r#"{
          "family": "billing",
          "containerDefinitions": [
            {
              "name": "api",
              "image": "123456789012.dkr.ecr.eu-west-1.amazonaws.com/billing:1.4",
              "portMappings": [{"containerPort": 8000, "hostPort": 8000}],
              "command": ["gunicorn", "billing.wsgi"],
              "environment": [{"name": "LOG_LEVEL", "value": "info"}],
              "secrets": [{"name": "DB_PASSWORD", "valueFrom": "arn:aws:ssm:eu-west-1:1:parameter/db"}]
            },
            {"name": "queue", "image": "123456789012.dkr.ecr.eu-west-1.amazonaws.com/billing:1.4", "command": ["celery", "worker"]},
            {"name": "cache", "image": "redis:7"}
          ]
        }"#;
        let ir = parse_task_definition(&ctx, json).unwrap();
        assert_eq!(ir.app_name_hint.as_deref(), Some("billing"));
        assert_eq!(ir.region_hint.as_deref(), Some("eu-west-1"));
        assert_eq!(ir.processes.len(), 2);
        assert_eq!(ir.processes[0].kind, ProcessKind::Web);
        assert_eq!(ir.processes[0].port, Some(8000));
        assert_eq!(ir.processes[0].command, "gunicorn billing.wsgi");
        assert_eq!(ir.processes[0].build, BuildSource::Image);
        assert_eq!(ir.processes[1].kind, ProcessKind::Worker);
        assert_eq!(ir.dependencies[0].category, DependencyCategory::Cache);

        let secret = ir.env_vars.iter().find(|e| e.key == "DB_PASSWORD").unwrap();
        assert!(secret.is_secret_hint);
        assert!(!secret.has_literal_value);
        assert!(ir.env_vars.iter().find(|e| e.key == "LOG_LEVEL").unwrap().has_literal_value);
    }

    #[test]
    fn apprunner_defaults_port() {
        let ctx = ParseContext::new("apprunner.yaml", SourceFormat::AppRunnerYaml);
        let yaml = "version: 1.0\nruntime: python3\nrun:\n  command: python app.py\n  env:\n    - name: MODE\n      value: prod\n  secrets:\n    - name: API_TOKEN\n      value-from: arn:aws:secretsmanager:x\n";
        let ir = parse_apprunner(&ctx, yaml).unwrap();
        assert_eq!(ir.processes[0].port, Some(8080));
        assert_eq!(ir.processes[0].command, "python app.py");
        assert_eq!(ir.env_vars.len(), 2);
        assert!(ir.env_vars[1].is_secret_hint);
    }

    #[test]
    fn dockerrun_v1_and_v2() {
        let ctx = ParseContext::new("Dockerrun.aws.json", SourceFormat::Dockerrun);
        let v1 = r#"{"AWSEBDockerrunVersion": "1", "Image": {"Name": "acme/site:2"}, "Ports": [{"ContainerPort": "3000"}]}"#;
        let ir = parse_dockerrun(&ctx, v1).unwrap();
        assert_eq!(ir.processes[0].port, Some(3000));
        assert_eq!(ir.processes[0].image.as_deref(), Some("acme/site:2"));

        let v2 = r#"{"AWSEBDockerrunVersion": 2, "containerDefinitions": [
            {"name": "web", "image": "acme/web", "portMappings": [{"hostPort": 80, "containerPort": 80}]},
            {"name": "db", "image": "mysql:8.0"}
        ]}"#;
        let ir = parse_dockerrun(&ctx, v2).unwrap();
        assert_eq!(ir.processes.len(), 1);
        assert_eq!(ir.dependencies[0].engine_hint, "mysql");

        assert!(parse_dockerrun(&ctx, r#"{"AWSEBDockerrunVersion": 3}"#).is_err());
    }

    #[test]
    fn ecr_region_extraction() {
        assert_eq!(ecr_region("1.dkr.ecr.ap-south-1.amazonaws.com/x").as_deref(), Some("ap-south-1"));
        assert_eq!(ecr_region("nginx"), None);
    }
}

//! DigitalOcean App Platform app spec document, as much of it as the
//! generator emits. Field names follow the published app spec schema.

use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REGION: &str = "nyc";

/// App Platform region slugs.
pub const REGIONS: &[&str] = &["nyc", "ams", "sfo", "sgp", "lon", "fra", "tor", "blr", "syd", "atl"];

pub const SCOPE_RUN_TIME: &str = "RUN_TIME";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_sites: Vec<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<DatabaseSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvSpec>,
}

impl AppSpec {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Every component with the array it lives in.
    pub fn components(&self) -> impl Iterator<Item = (&'static str, &ComponentSpec)> {
        self.services
            .iter()
            .map(|c| ("services", c))
            .chain(self.workers.iter().map(|c| ("workers", c)))
            .chain(self.jobs.iter().map(|c| ("jobs", c)))
            .chain(self.static_sites.iter().map(|c| ("static_sites", c)))
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseSpec> {
        self.databases.iter().find(|d| d.name == name)
    }
}

/// One service, worker, job or static site. Fields that only apply to one
/// kind are left unset on the others.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    /// Jobs only: `PRE_DEPLOY`, `POST_DEPLOY` or `SCHEDULED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_size_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<Autoscaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<JobSchedule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    pub repo_clone_url: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// `DOCKER_HUB`, `GHCR` or `DOCR`.
    pub registry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub http_path: String,
    pub initial_delay_seconds: u32,
    pub period_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autoscaling {
    pub min_instance_count: u32,
    pub max_instance_count: u32,
    pub metrics: AutoscalingMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingMetrics {
    pub cpu: CpuMetric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuMetric {
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSchedule {
    pub cron: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

impl JobSchedule {
    pub fn new(cron: impl Into<String>) -> Self {
        Self {
            cron: cron.into(),
            time_zone: default_time_zone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub name: String,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub production: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    pub key: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// `GENERAL` or `SECRET`.
    #[serde(rename = "type", default = "default_env_type")]
    pub env_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn default_scope() -> String {
    SCOPE_RUN_TIME.to_string()
}

fn default_env_type() -> String {
    "GENERAL".to_string()
}

impl EnvSpec {
    pub fn general(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            scope: default_scope(),
            env_type: default_env_type(),
            value,
        }
    }

    pub fn secret(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scope: default_scope(),
            env_type: "SECRET".to_string(),
            value: None,
        }
    }

    pub fn is_secret(&self) -> bool {
        self.env_type == "SECRET"
    }
}

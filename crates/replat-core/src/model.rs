//! The normalized architecture model (IR).
//!
//! Built once per run by the normalizer and only read afterwards. Every
//! element has a stable [`ElementId`]; the mapping engine emits exactly one
//! decision per id.

use crate::error::ReplatError;
use crate::types::{BuildSource, DependencyCategory, PlatformId, ProcessKind, Runtime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Where an IR element was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Repository-relative path of the source file.
    pub path: String,
    /// Platform the file is evidence for; `None` for platform-neutral files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformId>,
}

impl Origin {
    pub fn new(path: impl Into<String>, platform: Option<PlatformId>) -> Self {
        Self {
            path: path.into(),
            platform,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

// ---------------------------------------------------------------------------
// ProcessComponent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessComponent {
    pub name: String,
    pub kind: ProcessKind,
    /// Empty means "the image or Dockerfile default command".
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// `/` for the repository root.
    pub source_dir: String,
    pub build: BuildSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    /// Static sites only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// Static sites only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub origin: Origin,
}

impl ProcessComponent {
    pub fn new(name: impl Into<String>, kind: ProcessKind, origin: Origin) -> Self {
        Self {
            name: name.into(),
            kind,
            command: String::new(),
            port: None,
            source_dir: "/".to_string(),
            build: BuildSource::Buildpack,
            image: None,
            dockerfile_path: None,
            health_check_path: None,
            instances: None,
            build_command: None,
            output_dir: None,
            origin,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into().trim().to_string();
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self.build = BuildSource::Image;
        self
    }

    pub fn id(&self) -> ElementId {
        ElementId::Process(self.name.clone())
    }

    /// Key identifying the deployable unit this component belongs to.
    pub fn unit_key(&self) -> String {
        match (&self.image, self.build) {
            (Some(image), BuildSource::Image | BuildSource::ForeignImage) => {
                format!("image:{image}")
            }
            _ => format!("dir:{}", self.source_dir),
        }
    }
}

// ---------------------------------------------------------------------------
// DependencyRef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub category: DependencyCategory,
    pub engine_hint: String,
    /// Name in the source: compose service, add-on plan, render database name.
    pub source_name: String,
    #[serde(default)]
    pub required_env_vars: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub origin: Origin,
}

impl DependencyRef {
    pub fn id(&self) -> ElementId {
        ElementId::Dependency {
            category: self.category,
            engine: self.engine_hint.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// EnvVarDecl
// ---------------------------------------------------------------------------

/// A declared environment variable. Values are never carried, only whether
/// the source had one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarDecl {
    pub key: String,
    pub has_literal_value: bool,
    /// Heuristic only; absence does not mean the value is safe to publish.
    pub is_secret_hint: bool,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EnvVarDecl {
    pub fn new(key: impl Into<String>, origin: Origin) -> Self {
        Self {
            key: key.into(),
            has_literal_value: false,
            is_secret_hint: false,
            origin,
            note: None,
        }
    }

    pub fn id(&self) -> ElementId {
        ElementId::EnvVar(self.key.clone())
    }
}

// ---------------------------------------------------------------------------
// ScheduleSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// Name of the scheduled process this schedule triggers.
    pub name: String,
    pub cron_expression: String,
    pub command: String,
    pub origin: Origin,
}

impl ScheduleSpec {
    pub fn id(&self) -> ElementId {
        ElementId::Schedule(self.name.clone())
    }
}

// ---------------------------------------------------------------------------
// ArchitectureModel
// ---------------------------------------------------------------------------

/// Frontend and backend directories of a monorepo, as `/dir` paths.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonorepoLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureModel {
    pub source_platform: PlatformId,
    /// Platforms tied for first place in detection; more than one entry means
    /// the source platform itself needs a human decision.
    pub platform_candidates: Vec<PlatformId>,
    pub runtime: Runtime,
    /// Version pin such as `20.x` or `3.12`, when the repository declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monorepo: Option<MonorepoLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name_hint: Option<String>,
    pub processes: Vec<ProcessComponent>,
    pub dependencies: Vec<DependencyRef>,
    pub env_vars: Vec<EnvVarDecl>,
    pub schedules: Vec<ScheduleSpec>,
    /// Files that contributed to this model, in merge order.
    pub sources: Vec<String>,
    /// Processes and schedules declared by platforms that were not chosen as
    /// the source of truth, as `name (path)`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_aside: Vec<String>,
}

impl ArchitectureModel {
    pub fn is_platform_ambiguous(&self) -> bool {
        self.platform_candidates.len() > 1
    }

    /// Every element id in decision order: platform, processes,
    /// dependencies, env vars, schedules.
    pub fn element_ids(&self) -> Vec<ElementId> {
        let mut ids = Vec::with_capacity(self.element_count());
        ids.push(ElementId::Platform);
        ids.extend(self.processes.iter().map(ProcessComponent::id));
        ids.extend(self.dependencies.iter().map(DependencyRef::id));
        ids.extend(self.env_vars.iter().map(EnvVarDecl::id));
        ids.extend(self.schedules.iter().map(ScheduleSpec::id));
        ids
    }

    pub fn element_count(&self) -> usize {
        1 + self.processes.len()
            + self.dependencies.len()
            + self.env_vars.len()
            + self.schedules.len()
    }

    pub fn process(&self, name: &str) -> Option<&ProcessComponent> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn dependency(&self, category: DependencyCategory, engine: &str) -> Option<&DependencyRef> {
        self.dependencies
            .iter()
            .find(|d| d.category == category && d.engine_hint == engine)
    }

    pub fn env_var(&self, key: &str) -> Option<&EnvVarDecl> {
        self.env_vars.iter().find(|e| e.key == key)
    }

    pub fn schedule(&self, name: &str) -> Option<&ScheduleSpec> {
        self.schedules.iter().find(|s| s.name == name)
    }

    /// The dependency whose connection variables include `key`, if any.
    pub fn dependency_for_env(&self, key: &str) -> Option<&DependencyRef> {
        self.dependencies
            .iter()
            .find(|d| d.required_env_vars.iter().any(|k| k == key))
    }
}

// ---------------------------------------------------------------------------
// ElementId
// ---------------------------------------------------------------------------

/// Stable reference to one IR element. Rendered as `platform`,
/// `process/web`, `dependency/cache/redis`, `env/SECRET_KEY`,
/// `schedule/nightly`; the same strings key the overrides file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ElementId {
    Platform,
    Process(String),
    Dependency {
        category: DependencyCategory,
        engine: String,
    },
    EnvVar(String),
    Schedule(String),
}

impl ElementId {
    pub fn kind(&self) -> &'static str {
        match self {
            ElementId::Platform => "platform",
            ElementId::Process(_) => "process",
            ElementId::Dependency { .. } => "dependency",
            ElementId::EnvVar(_) => "env",
            ElementId::Schedule(_) => "schedule",
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Platform => f.write_str("platform"),
            ElementId::Process(name) => write!(f, "process/{name}"),
            ElementId::Dependency { category, engine } => {
                write!(f, "dependency/{category}/{engine}")
            }
            ElementId::EnvVar(key) => write!(f, "env/{key}"),
            ElementId::Schedule(name) => write!(f, "schedule/{name}"),
        }
    }
}

impl std::str::FromStr for ElementId {
    type Err = ReplatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReplatError::InvalidElementId(s.to_string());
        if s == "platform" {
            return Ok(ElementId::Platform);
        }
        let (kind, rest) = s.split_once('/').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }
        match kind {
            "process" => Ok(ElementId::Process(rest.to_string())),
            "env" => Ok(ElementId::EnvVar(rest.to_string())),
            "schedule" => Ok(ElementId::Schedule(rest.to_string())),
            "dependency" => {
                let (category, engine) = rest.split_once('/').ok_or_else(invalid)?;
                if engine.is_empty() {
                    return Err(invalid());
                }
                Ok(ElementId::Dependency {
                    category: category.parse().map_err(|_| invalid())?,
                    engine: engine.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ElementId {
    type Error = ReplatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementId> for String {
    fn from(id: ElementId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Mapping rule table: `(category, platform, engine)` → decision template.
//!
//! The default table ships as YAML inside the crate (`rules/default.yaml`)
//! and can be overlaid from a file. Keys may use `*` for platform and
//! engine; the most specific matching rule wins, with an exact engine
//! outranking an exact platform.

use crate::error::{ReplatError, Result};
use crate::types::{DependencyCategory, PlatformId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

const DEFAULT_RULES: &str = include_str!("../rules/default.yaml");

pub const WILDCARD: &str = "*";

/// Rule categories that are not dependency categories.
const ELEMENT_CATEGORIES: &[&str] = &["web", "worker", "release", "scheduled", "static", "env", "schedule"];

// ---------------------------------------------------------------------------
// Target constructs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    PreDeploy,
    PostDeploy,
    Scheduled,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::PreDeploy => "PRE_DEPLOY",
            JobKind::PostDeploy => "POST_DEPLOY",
            JobKind::Scheduled => "SCHEDULED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatabaseEngine {
    Pg,
    Mysql,
    Mongodb,
    Valkey,
    Kafka,
    Opensearch,
}

impl DatabaseEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseEngine::Pg => "PG",
            DatabaseEngine::Mysql => "MYSQL",
            DatabaseEngine::Mongodb => "MONGODB",
            DatabaseEngine::Valkey => "VALKEY",
            DatabaseEngine::Kafka => "KAFKA",
            DatabaseEngine::Opensearch => "OPENSEARCH",
        }
    }

    /// Dev databases only exist for PG; every other engine needs a cluster.
    pub fn supports_dev_database(self) -> bool {
        self == DatabaseEngine::Pg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvScope {
    General,
    Secret,
}

/// Where a component's runnable artifact comes from on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSource {
    /// Whatever the source declares: Dockerfile, buildpack, or public image.
    #[default]
    Declared,
    /// Image mirrored into the DigitalOcean Container Registry.
    Docr,
    /// Rebuilt from the repository's Dockerfile.
    Dockerfile,
}

fn is_declared(source: &ComponentSource) -> bool {
    *source == ComponentSource::Declared
}

/// App Platform construct an element maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "construct", rename_all = "snake_case")]
pub enum TargetConstruct {
    Service {
        #[serde(default, skip_serializing_if = "is_declared")]
        source: ComponentSource,
    },
    Worker {
        #[serde(default, skip_serializing_if = "is_declared")]
        source: ComponentSource,
    },
    Job {
        kind: JobKind,
        #[serde(default, skip_serializing_if = "is_declared")]
        source: ComponentSource,
    },
    StaticSite,
    Database {
        engine: DatabaseEngine,
    },
    /// Stays with an outside provider; its connection variables become secrets.
    External {
        provider: String,
    },
    Env {
        scope: EnvScope,
    },
    /// Env var bound to a managed database attached to the app.
    Binding,
    /// Injected by App Platform at runtime.
    PlatformProvided,
    Schedule,
    App,
}

fn with_source(f: &mut fmt::Formatter<'_>, base: &str, source: &ComponentSource) -> fmt::Result {
    match source {
        ComponentSource::Declared => f.write_str(base),
        ComponentSource::Docr => write!(f, "{base} (image mirrored to DOCR)"),
        ComponentSource::Dockerfile => write!(f, "{base} (built from Dockerfile)"),
    }
}

impl fmt::Display for TargetConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetConstruct::Service { source } => with_source(f, "services[]", source),
            TargetConstruct::Worker { source } => with_source(f, "workers[]", source),
            TargetConstruct::Job { kind, source } => {
                with_source(f, &format!("jobs[] kind {}", kind.as_str()), source)
            }
            TargetConstruct::StaticSite => f.write_str("static_sites[]"),
            TargetConstruct::Database { engine } => write!(f, "databases[] engine {}", engine.as_str()),
            TargetConstruct::External { provider } => write!(f, "external provider {provider} (SECRET env vars)"),
            TargetConstruct::Env { scope } => match scope {
                EnvScope::General => f.write_str("envs[] GENERAL"),
                EnvScope::Secret => f.write_str("envs[] SECRET"),
            },
            TargetConstruct::Binding => f.write_str("envs[] bound to database"),
            TargetConstruct::PlatformProvided => f.write_str("provided by App Platform"),
            TargetConstruct::Schedule => f.write_str("jobs[].schedule.cron"),
            TargetConstruct::App => f.write_str("app"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOption {
    pub id: String,
    pub description: String,
    pub target: TargetConstruct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    Mapped {
        target: TargetConstruct,
        rationale: String,
    },
    NeedsDecision {
        question: String,
        rationale: String,
        options: Vec<RuleOption>,
    },
    Unmappable {
        rationale: String,
        workaround: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub category: String,
    #[serde(default = "wildcard")]
    pub platform: String,
    #[serde(default = "wildcard")]
    pub engine: String,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

impl Rule {
    /// `category/platform/engine`, e.g. `cache/*/redis`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.category, self.platform, self.engine)
    }

    /// Match score, or `None` when the rule does not apply.
    fn score(&self, category: &str, platform: PlatformId, engine: &str) -> Option<u8> {
        if self.category != category {
            return None;
        }
        let platform_score = match self.platform.as_str() {
            WILDCARD => 0,
            p if p == platform.as_str() => 1,
            _ => return None,
        };
        let engine_score = match self.engine.as_str() {
            WILDCARD => 0,
            e if e == engine => 2,
            _ => return None,
        };
        Some(platform_score + engine_score)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let key = self.key();
        let known_category = ELEMENT_CATEGORIES.contains(&self.category.as_str())
            || self.category.parse::<DependencyCategory>().is_ok();
        if !known_category {
            return Err(format!("rule {key}: unknown category '{}'", self.category));
        }
        if self.platform != WILDCARD && self.platform.parse::<PlatformId>().is_err() {
            return Err(format!("rule {key}: unknown platform '{}'", self.platform));
        }
        if self.engine.trim().is_empty() {
            return Err(format!("rule {key}: engine must not be empty (use '*')"));
        }
        match &self.outcome {
            RuleOutcome::Mapped { rationale, .. } if rationale.trim().is_empty() => {
                Err(format!("rule {key}: rationale is empty"))
            }
            RuleOutcome::NeedsDecision {
                question,
                rationale,
                options,
            } => {
                if question.trim().is_empty() || rationale.trim().is_empty() {
                    return Err(format!("rule {key}: question and rationale are required"));
                }
                if options.len() < 2 {
                    return Err(format!("rule {key}: a decision needs at least two options"));
                }
                let mut ids = BTreeSet::new();
                for option in options {
                    if !ids.insert(option.id.as_str()) {
                        return Err(format!("rule {key}: option '{}' is listed twice", option.id));
                    }
                }
                Ok(())
            }
            RuleOutcome::Unmappable {
                rationale,
                workaround,
            } if rationale.trim().is_empty() || workaround.trim().is_empty() => {
                Err(format!("rule {key}: rationale and workaround are required"))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// RuleTable
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// The table embedded in the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml("builtin rules", DEFAULT_RULES)
    }

    pub fn from_yaml(source_name: &str, content: &str) -> Result<Self> {
        let invalid = |message: String| ReplatError::RuleTable {
            source_name: source_name.to_string(),
            message,
        };
        let file: RuleFile = serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let mut keys = BTreeSet::new();
        for rule in &file.rules {
            rule.validate().map_err(invalid)?;
            if !keys.insert(rule.key()) {
                return Err(invalid(format!("rule {} is defined twice", rule.key())));
            }
        }
        Ok(Self { rules: file.rules })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ReplatError::read(path.display().to_string(), e))?;
        Self::from_yaml(&path.display().to_string(), &content)
    }

    /// Rules in `other` replace rules with the same key; new keys are appended.
    pub fn overlay(mut self, other: RuleTable) -> Self {
        for rule in other.rules {
            match self.rules.iter_mut().find(|r| r.key() == rule.key()) {
                Some(existing) => *existing = rule,
                None => self.rules.push(rule),
            }
        }
        self
    }

    /// Built-in table, overlaid with `extra` when given.
    pub fn with_overlay(extra: Option<&Path>) -> Result<Self> {
        let table = Self::builtin()?;
        match extra {
            Some(path) => {
                let overlay = Self::load(path)?;
                tracing::debug!(path = %path.display(), rules = overlay.len(), "loaded rule overlay");
                Ok(table.overlay(overlay))
            }
            None => Ok(table),
        }
    }

    pub fn lookup(&self, category: &str, platform: PlatformId, engine: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .filter_map(|r| r.score(category, platform, engine).map(|s| (s, r)))
            .max_by_key(|(s, _)| *s)
            .map(|(_, r)| r)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! App spec schema validation.
//!
//! Validation is a pure function of the document text: it returns the full
//! list of diagnostics instead of stopping at the first problem, so one run
//! shows everything wrong with a generated spec.

use crate::appspec::{AppSpec, ComponentSpec, REGIONS};
use crate::error::{ReplatError, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const JOB_KINDS: &[&str] = &["PRE_DEPLOY", "POST_DEPLOY", "FAILED_DEPLOY", "SCHEDULED"];
const ENV_TYPES: &[&str] = &["GENERAL", "SECRET"];
const ENV_SCOPES: &[&str] = &["RUN_TIME", "BUILD_TIME", "RUN_AND_BUILD_TIME"];
const DB_ENGINES: &[&str] = &["PG", "MYSQL", "MONGODB", "VALKEY", "KAFKA", "OPENSEARCH"];
const REGISTRY_TYPES: &[&str] = &["DOCKER_HUB", "GHCR", "DOCR"];

static NAME_RE: OnceLock<Regex> = OnceLock::new();
static ENV_KEY_RE: OnceLock<Regex> = OnceLock::new();
static BINDING_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]{0,30}[a-z0-9]$").unwrap())
}

fn env_key_re() -> &'static Regex {
    ENV_KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

fn binding_re() -> &'static Regex {
    BINDING_RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_-]+)\.([A-Za-z0-9_]+)\}").unwrap())
}

/// True if `name` is usable as an app, component or database name.
pub fn is_valid_name(name: &str) -> bool {
    name_re().is_match(name)
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub diagnostics: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ReplatError::SpecValidation {
                diagnostics: self.diagnostics,
            })
        }
    }

    fn push(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }
}

/// Schema check for a target spec document.
pub trait SpecValidator {
    fn validate(&self, document: &str) -> Validation;
}

/// Structural checks for App Platform app specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppSpecValidator;

impl SpecValidator for AppSpecValidator {
    fn validate(&self, document: &str) -> Validation {
        let mut v = Validation::default();
        let spec = match AppSpec::from_yaml(document) {
            Ok(spec) => spec,
            Err(e) => {
                v.push(format!("document is not an app spec: {e}"));
                return v;
            }
        };

        if !is_valid_name(&spec.name) {
            v.push(format!(
                "app name '{}' must be 2-32 lowercase letters, digits or dashes, starting with a letter",
                spec.name
            ));
        }
        if !REGIONS.contains(&spec.region.as_str()) {
            v.push(format!("unknown region '{}'", spec.region));
        }

        let mut names = BTreeSet::new();
        for (section, component) in spec.components() {
            if !names.insert(component.name.as_str()) {
                v.push(format!("component name '{}' is used more than once", component.name));
            }
            check_component(&mut v, section, component);
        }

        let mut databases = BTreeSet::new();
        for db in &spec.databases {
            let at = format!("databases.{}", db.name);
            if !is_valid_name(&db.name) {
                v.push(format!("{at}: invalid name"));
            }
            if !names.insert(db.name.as_str()) {
                v.push(format!("{at}: name is already used by another component"));
            }
            databases.insert(db.name.as_str());
            if !DB_ENGINES.contains(&db.engine.as_str()) {
                v.push(format!("{at}: unknown engine '{}'", db.engine));
            }
            if db.production && db.cluster_name.as_deref().unwrap_or("").is_empty() {
                v.push(format!("{at}: production databases need a cluster_name"));
            }
            if !db.production && db.engine != "PG" {
                v.push(format!("{at}: dev databases are only available for PG"));
            }
        }

        let mut keys = BTreeSet::new();
        for env in &spec.envs {
            let at = format!("envs.{}", env.key);
            if !env_key_re().is_match(&env.key) {
                v.push(format!("{at}: invalid key"));
            }
            if !keys.insert(env.key.as_str()) {
                v.push(format!("{at}: declared more than once"));
            }
            if !ENV_TYPES.contains(&env.env_type.as_str()) {
                v.push(format!("{at}: unknown type '{}'", env.env_type));
            }
            if !ENV_SCOPES.contains(&env.scope.as_str()) {
                v.push(format!("{at}: unknown scope '{}'", env.scope));
            }
            if env.is_secret() && env.value.is_some() {
                v.push(format!("{at}: SECRET variables must not carry a value"));
            }
            if let Some(value) = &env.value {
                for cap in binding_re().captures_iter(value) {
                    let target = &cap[1];
                    if !databases.contains(target) {
                        v.push(format!("{at}: binds to '{target}', which is not a declared database"));
                    }
                }
            }
        }

        match spec.to_yaml().and_then(|yaml| AppSpec::from_yaml(&yaml)) {
            Ok(again) if again == spec => {}
            Ok(_) => v.push("spec does not survive a serialize/parse round trip"),
            Err(e) => v.push(format!("spec does not re-serialize: {e}")),
        }
        v
    }
}

fn check_component(v: &mut Validation, section: &str, c: &ComponentSpec) {
    let at = format!("{section}.{}", c.name);
    if !is_valid_name(&c.name) {
        v.push(format!("{at}: invalid component name"));
    }
    if let Some(port) = c.http_port {
        if !(1..=65535).contains(&port) {
            v.push(format!("{at}: http_port {port} is out of range"));
        }
    }
    if section == "services" && c.http_port.is_none() {
        v.push(format!("{at}: services need an http_port"));
    }
    if c.image.is_some() && (c.git.is_some() || c.dockerfile_path.is_some()) {
        v.push(format!("{at}: image components cannot also build from source"));
    }
    if let Some(image) = &c.image {
        if !REGISTRY_TYPES.contains(&image.registry_type.as_str()) {
            v.push(format!("{at}: unknown registry_type '{}'", image.registry_type));
        }
        if image.repository.is_empty() {
            v.push(format!("{at}: image repository is empty"));
        }
    }
    if c.instance_count.is_some() && c.autoscaling.is_some() {
        v.push(format!("{at}: instance_count and autoscaling are mutually exclusive"));
    }
    if let Some(scaling) = &c.autoscaling {
        if scaling.min_instance_count > scaling.max_instance_count {
            v.push(format!("{at}: autoscaling minimum exceeds maximum"));
        }
    }

    if section == "jobs" {
        match c.kind.as_deref() {
            None => v.push(format!("{at}: jobs need a kind")),
            Some(kind) if !JOB_KINDS.contains(&kind) => {
                v.push(format!("{at}: unknown job kind '{kind}'"))
            }
            Some("SCHEDULED") => match &c.schedule {
                Some(s) if s.cron.split_whitespace().count() == 5 => {}
                Some(s) => v.push(format!("{at}: cron '{}' must have five fields", s.cron)),
                None => v.push(format!("{at}: SCHEDULED jobs need schedule.cron")),
            },
            Some(_) if c.schedule.is_some() => {
                v.push(format!("{at}: only SCHEDULED jobs take a schedule"))
            }
            Some(_) => {}
        }
    } else if c.kind.is_some() || c.schedule.is_some() {
        v.push(format!("{at}: kind and schedule only apply to jobs"));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

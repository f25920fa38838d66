//! App spec and env template generation.
//!
//! Only Mapped decisions are rendered into the app spec. Every element that is
//! not rendered (NeedsDecision, Unmappable, or a Mapped target that has no
//! place in the app spec) is listed as a comment at the end of the document so
//! nothing disappears without a trace.

use crate::appspec::{
    AppSpec, Autoscaling, AutoscalingMetrics, ComponentSpec, CpuMetric, DatabaseSpec, EnvSpec, GitSource,
    HealthCheck, ImageSource, JobSchedule, DEFAULT_REGION, REGIONS,
};
use crate::config::{slugify, MigrationConfig, MAX_NAME_LEN};
use crate::error::Result;
use crate::mapping::DecisionSet;
use crate::model::{ArchitectureModel, ElementId, EnvVarDecl, ProcessComponent};
use crate::parse::heroku::POSTDEPLOY_PROCESS;
use crate::parse::images::split_image;
use crate::rules::{ComponentSource, DatabaseEngine, EnvScope, JobKind, TargetConstruct};
use crate::types::{BuildSource, Classification, Environment, Runtime};
use crate::validate::SpecValidator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source region → App Platform region.
const REGION_MAP: &[(&str, &str)] = &[
    // heroku
    ("us", "nyc"),
    ("eu", "ams"),
    // aws
    ("us-east-1", "nyc"),
    ("us-east-2", "nyc"),
    ("us-west-1", "sfo"),
    ("us-west-2", "sfo"),
    ("ca-central-1", "tor"),
    ("eu-west-1", "lon"),
    ("eu-west-2", "lon"),
    ("eu-central-1", "fra"),
    ("ap-southeast-1", "sgp"),
    ("ap-southeast-2", "syd"),
    ("ap-south-1", "blr"),
    // render
    ("oregon", "sfo"),
    ("ohio", "nyc"),
    ("virginia", "nyc"),
    ("frankfurt", "fra"),
    ("singapore", "sgp"),
    // fly
    ("iad", "nyc"),
    ("ewr", "nyc"),
    ("sjc", "sfo"),
    ("lax", "sfo"),
    ("lhr", "lon"),
    ("sin", "sgp"),
    ("bom", "blr"),
    ("yyz", "tor"),
    ("atl", "atl"),
];

const SUPPORTED_PG_VERSIONS: &[&str] = &["14", "15", "16"];

/// App Platform region for a region name from the source configuration.
pub fn region_for(hint: &str) -> Option<&'static str> {
    let hint = hint.trim().to_ascii_lowercase();
    REGIONS
        .iter()
        .copied()
        .find(|r| *r == hint)
        .or_else(|| REGION_MAP.iter().find(|(from, _)| *from == hint).map(|(_, to)| *to))
}

fn database_name(engine: DatabaseEngine) -> &'static str {
    match engine {
        DatabaseEngine::Pg => "db",
        DatabaseEngine::Mysql => "mysqldb",
        DatabaseEngine::Mongodb => "mongodb",
        DatabaseEngine::Valkey => "cache",
        DatabaseEngine::Kafka => "kafka",
        DatabaseEngine::Opensearch => "search",
    }
}

/// Bindable database variable a connection variable maps to. Keys with no
/// bindable counterpart (client keys and the like) stay plain secrets.
fn binding_field(key: &str) -> Option<&'static str> {
    let key = key.to_ascii_uppercase();
    if key.ends_with("_CERT_KEY") || key.ends_with("_CLIENT_CERT") || key.ends_with("_PRIVATE_KEY") {
        None
    } else if key.ends_with("_USERNAME") || key.ends_with("_USER") {
        Some("USERNAME")
    } else if key.ends_with("_PASSWORD") {
        Some("PASSWORD")
    } else if key.ends_with("_HOST") || key.ends_with("_HOSTNAME") || key.ends_with("_SERVERS") {
        Some("HOSTNAME")
    } else if key.ends_with("_PORT") {
        Some("PORT")
    } else if key.ends_with("_CERT") {
        Some("CA_CERT")
    } else {
        Some("DATABASE_URL")
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One line of the env template. Values are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvTemplateEntry {
    pub key: String,
    /// The operator must supply a value before the first deploy.
    pub required: bool,
    pub secret: bool,
    pub source_note: String,
}

/// An element that is not rendered into the app spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pending {
    pub subject: ElementId,
    pub classification: Classification,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedSpec {
    pub spec: AppSpec,
    /// The validated app spec, with pending items as trailing comments.
    pub document: String,
    pub env_template: Vec<EnvTemplateEntry>,
    pub pending: Vec<Pending>,
}

/// `deploy.template.yaml` wraps the app spec under a `spec` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTemplate {
    pub spec: AppSpec,
}

impl GeneratedSpec {
    /// The app spec for a Deploy to DigitalOcean button: no fixed scaling,
    /// dev databases wherever the engine has one.
    pub fn deploy_template(&self) -> DeployTemplate {
        let mut spec = self.spec.clone();
        for service in &mut spec.services {
            service.instance_count = None;
            service.autoscaling = None;
        }
        for db in &mut spec.databases {
            if db.engine == DatabaseEngine::Pg.as_str() {
                db.production = false;
                db.cluster_name = None;
            }
        }
        DeployTemplate { spec }
    }

    pub fn deploy_template_yaml(&self) -> Result<String> {
        Ok(format!(
            "# Deploy to DigitalOcean template for {}.\n{}",
            self.spec.name,
            serde_yaml::to_string(&self.deploy_template())?
        ))
    }

    pub fn env_template_yaml(&self) -> Result<String> {
        let body = if self.env_template.is_empty() {
            "[]\n".to_string()
        } else {
            serde_yaml::to_string(&self.env_template)?
        };
        Ok(format!(
            "# Environment variables for {}. Values are never copied from the source repository;\n# fill them in through the App Platform console or doctl.\n{body}",
            self.spec.name
        ))
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct SpecGenerator<'a> {
    model: &'a ArchitectureModel,
    decisions: &'a DecisionSet,
    config: &'a MigrationConfig,
    app_name: String,
}

/// How one env var ended up in the app spec.
enum EnvOutcome {
    Provided,
    Bound(String),
    Secret,
    General,
    Pending(Classification, String),
}

impl<'a> SpecGenerator<'a> {
    pub fn new(
        model: &'a ArchitectureModel,
        decisions: &'a DecisionSet,
        config: &'a MigrationConfig,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            model,
            decisions,
            config,
            app_name: app_name.into(),
        }
    }

    pub fn generate(&self, validator: &dyn SpecValidator) -> Result<GeneratedSpec> {
        let mut pending = Vec::new();
        let environment = self.config.environment;
        let suffix = format!("-{environment}");
        let mut spec = AppSpec {
            name: format!(
                "{}{suffix}",
                slugify(&self.app_name, MAX_NAME_LEN - suffix.len())
            ),
            region: self.region(),
            ..Default::default()
        };

        for process in &self.model.processes {
            self.add_component(&mut spec, process, &mut pending);
        }
        let bound = self.add_databases(&mut spec, &mut pending);

        let mut env_template = Vec::with_capacity(self.model.env_vars.len());
        for decl in &self.model.env_vars {
            let outcome = self.env_outcome(decl, &bound);
            match &outcome {
                EnvOutcome::Provided => {}
                EnvOutcome::Bound(value) => spec.envs.push(EnvSpec::general(&decl.key, Some(value.clone()))),
                EnvOutcome::Secret => spec.envs.push(EnvSpec::secret(&decl.key)),
                EnvOutcome::General => spec.envs.push(EnvSpec::general(&decl.key, None)),
                EnvOutcome::Pending(classification, note) => pending.push(Pending {
                    subject: decl.id(),
                    classification: *classification,
                    note: note.clone(),
                }),
            }
            env_template.push(template_entry(decl, &outcome));
        }

        for dep in &self.model.dependencies {
            self.note_unrendered(dep.id(), &mut pending);
        }
        for schedule in &self.model.schedules {
            self.note_unrendered(schedule.id(), &mut pending);
        }
        self.note_unrendered(ElementId::Platform, &mut pending);

        let document = render_document(&spec, &pending, self.model)?;
        validator.validate(&document).into_result()?;

        tracing::info!(
            name = %spec.name,
            region = %spec.region,
            services = spec.services.len(),
            workers = spec.workers.len(),
            jobs = spec.jobs.len(),
            databases = spec.databases.len(),
            pending = pending.len(),
            "generated app spec"
        );
        Ok(GeneratedSpec {
            spec,
            document,
            env_template,
            pending,
        })
    }

    fn region(&self) -> String {
        if let Some(region) = &self.config.region {
            return region.clone();
        }
        match self.model.region_hint.as_deref() {
            Some(hint) => match region_for(hint) {
                Some(region) => region.to_string(),
                None => {
                    tracing::warn!(hint, default = DEFAULT_REGION, "unknown source region");
                    DEFAULT_REGION.to_string()
                }
            },
            None => DEFAULT_REGION.to_string(),
        }
    }

    fn mapped_target(&self, id: &ElementId) -> Option<&'a TargetConstruct> {
        self.decisions.target(id)
    }

    /// Record a non-Mapped element; Mapped ones are rendered elsewhere.
    fn note_unrendered(&self, id: ElementId, pending: &mut Vec<Pending>) {
        let Some(decision) = self.decisions.get(&id) else {
            return;
        };
        let note = match decision.classification {
            Classification::Mapped => return,
            Classification::NeedsDecision => decision.question.clone().unwrap_or_else(|| decision.rationale.clone()),
            Classification::Unmappable => decision.rationale.clone(),
        };
        pending.push(Pending {
            subject: id,
            classification: decision.classification,
            note,
        });
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    fn add_component(&self, spec: &mut AppSpec, process: &ProcessComponent, pending: &mut Vec<Pending>) {
        let id = process.id();
        let Some(target) = self.mapped_target(&id) else {
            self.note_unrendered(id, pending);
            return;
        };
        let sizes = self.config.sizes();
        let production = self.config.environment == Environment::Production;

        match target {
            TargetConstruct::Service { source } => {
                let mut c = self.component(spec, process, *source);
                c.http_port = process.port.map(u32::from);
                c.instance_size_slug = Some(sizes.service.clone());
                c.health_check = process.health_check_path.as_ref().map(|path| HealthCheck {
                    http_path: path.clone(),
                    initial_delay_seconds: 10,
                    period_seconds: 10,
                });
                if production {
                    c.autoscaling = Some(Autoscaling {
                        min_instance_count: 2,
                        max_instance_count: 5,
                        metrics: AutoscalingMetrics {
                            cpu: CpuMetric { percent: 80 },
                        },
                    });
                } else {
                    c.instance_count = Some(process.instances.unwrap_or(1));
                }
                spec.services.push(c);
            }
            TargetConstruct::Worker { source } => {
                let mut c = self.component(spec, process, *source);
                c.instance_size_slug = Some(sizes.worker.clone());
                c.instance_count = Some(process.instances.unwrap_or(if production { 2 } else { 1 }));
                spec.workers.push(c);
            }
            TargetConstruct::Job { kind, source } => {
                let kind = match kind {
                    JobKind::PreDeploy if process.name == POSTDEPLOY_PROCESS => JobKind::PostDeploy,
                    other => *other,
                };
                let mut c = self.component(spec, process, *source);
                c.kind = Some(kind.as_str().to_string());
                c.instance_size_slug = Some(sizes.job.clone());
                if kind == JobKind::Scheduled {
                    let schedule = self.model.schedule(&process.name).filter(|s| {
                        self.mapped_target(&s.id()) == Some(&TargetConstruct::Schedule)
                    });
                    match schedule {
                        Some(s) => c.schedule = Some(JobSchedule::new(s.cron_expression.clone())),
                        None => {
                            pending.push(Pending {
                                subject: id,
                                classification: Classification::Mapped,
                                note: format!(
                                    "scheduled job '{}' has no mapped cron schedule; add schedule.cron by hand",
                                    process.name
                                ),
                            });
                            return;
                        }
                    }
                }
                spec.jobs.push(c);
            }
            TargetConstruct::StaticSite => {
                let mut c = self.component(spec, process, ComponentSource::Declared);
                c.run_command = None;
                c.build_command = process.build_command.clone().or_else(|| {
                    (self.model.runtime == Runtime::Nodejs).then(|| "npm run build".to_string())
                });
                c.output_dir = Some(process.output_dir.clone().unwrap_or_else(|| "dist".to_string()));
                spec.static_sites.push(c);
            }
            other => pending.push(Pending {
                subject: id,
                classification: Classification::Mapped,
                note: format!("mapped to {other}, which cannot hold a process; place it by hand"),
            }),
        }
    }

    fn component(&self, spec: &AppSpec, process: &ProcessComponent, source: ComponentSource) -> ComponentSpec {
        let mut c = ComponentSpec {
            name: unique_component_name(spec, &process.name),
            run_command: Some(process.command.clone()).filter(|cmd| !cmd.is_empty()),
            source_dir: Some(process.source_dir.clone()).filter(|dir| dir != "/"),
            ..Default::default()
        };

        let image = match (source, process.build) {
            (ComponentSource::Docr, _) => process.image.as_deref().map(docr_image),
            (ComponentSource::Declared, BuildSource::Image) => process.image.as_deref().map(public_image),
            (ComponentSource::Declared, BuildSource::ForeignImage) => process.image.as_deref().map(docr_image),
            _ => None,
        };
        if image.is_some() {
            c.image = image;
            c.source_dir = None;
            return c;
        }

        c.git = self.config.repo_url.as_ref().map(|url| GitSource {
            repo_clone_url: url.clone(),
            branch: self.config.branch.clone(),
        });
        let use_dockerfile = source == ComponentSource::Dockerfile || process.build == BuildSource::Dockerfile;
        if use_dockerfile {
            c.dockerfile_path = Some(process.dockerfile_path.clone().unwrap_or_else(|| {
                match process.source_dir.trim_matches('/') {
                    "" => "Dockerfile".to_string(),
                    dir => format!("{dir}/Dockerfile"),
                }
            }));
        } else {
            c.environment_slug = self.model.runtime.environment_slug().map(str::to_string);
        }
        c
    }

    // -----------------------------------------------------------------------
    // Databases
    // -----------------------------------------------------------------------

    /// Adds one database per mapped engine; returns engine → database name.
    fn add_databases(&self, spec: &mut AppSpec, pending: &mut Vec<Pending>) -> BTreeMap<&'static str, String> {
        let mut names = BTreeMap::new();
        let production = self.config.environment == Environment::Production;
        let app = slugify(&self.app_name, MAX_NAME_LEN);

        for dep in &self.model.dependencies {
            let id = dep.id();
            let engine = match self.mapped_target(&id) {
                Some(TargetConstruct::Database { engine }) => *engine,
                Some(TargetConstruct::External { .. }) | None => continue,
                Some(other) => {
                    pending.push(Pending {
                        subject: id,
                        classification: Classification::Mapped,
                        note: format!("mapped to {other}, which cannot hold a dependency; place it by hand"),
                    });
                    continue;
                }
            };
            if names.contains_key(engine.as_str()) {
                continue;
            }

            let mut name = database_name(engine).to_string();
            if spec.components().any(|(_, c)| c.name == name) {
                name = format!("{name}-db");
            }
            let cluster = production || !engine.supports_dev_database();
            let version = dep
                .version
                .as_deref()
                .and_then(|v| v.split('.').next())
                .filter(|major| engine == DatabaseEngine::Pg && SUPPORTED_PG_VERSIONS.contains(major))
                .map(str::to_string);
            spec.databases.push(DatabaseSpec {
                cluster_name: cluster.then(|| slugify(&format!("{app}-{name}"), 63)),
                name: name.clone(),
                engine: engine.as_str().to_string(),
                version,
                production: cluster,
            });
            names.insert(engine.as_str(), name);
        }
        names
    }

    // -----------------------------------------------------------------------
    // Env vars
    // -----------------------------------------------------------------------

    fn env_outcome(&self, decl: &EnvVarDecl, bound: &BTreeMap<&'static str, String>) -> EnvOutcome {
        let id = decl.id();
        let Some(decision) = self.decisions.get(&id) else {
            return EnvOutcome::Pending(Classification::Unmappable, "no decision recorded".to_string());
        };
        let target = match (decision.classification, &decision.target) {
            (Classification::Mapped, Some(target)) => target,
            (classification, _) => {
                let note = decision.question.clone().unwrap_or_else(|| decision.rationale.clone());
                return EnvOutcome::Pending(classification, note);
            }
        };
        match target {
            TargetConstruct::PlatformProvided => EnvOutcome::Provided,
            TargetConstruct::Binding => {
                let database = self
                    .model
                    .dependency_for_env(&decl.key)
                    .and_then(|dep| match self.mapped_target(&dep.id()) {
                        Some(TargetConstruct::Database { engine }) => bound.get(engine.as_str()),
                        _ => None,
                    });
                match (database, binding_field(&decl.key)) {
                    (Some(name), Some(field)) => EnvOutcome::Bound(format!("${{{name}.{field}}}")),
                    _ => EnvOutcome::Secret,
                }
            }
            TargetConstruct::Env { .. } if decl.is_secret_hint => EnvOutcome::Secret,
            TargetConstruct::Env { scope: EnvScope::Secret } => EnvOutcome::Secret,
            TargetConstruct::Env { scope: EnvScope::General } => EnvOutcome::General,
            other => EnvOutcome::Pending(
                Classification::Mapped,
                format!("mapped to {other}, which cannot hold an env var; set it by hand"),
            ),
        }
    }
}

fn template_entry(decl: &EnvVarDecl, outcome: &EnvOutcome) -> EnvTemplateEntry {
    let mut notes = vec![format!("declared in {}", decl.origin.path)];
    if let Some(note) = &decl.note {
        notes.push(note.clone());
    }
    let (required, secret) = match outcome {
        EnvOutcome::Provided => {
            notes.push("provided by App Platform".to_string());
            (false, false)
        }
        EnvOutcome::Bound(value) => {
            notes.push(format!("bound to {value}"));
            (false, true)
        }
        EnvOutcome::Secret => {
            notes.push("set as an encrypted SECRET".to_string());
            (true, true)
        }
        EnvOutcome::General => {
            if decl.has_literal_value {
                notes.push("the source sets a value; copy it by hand".to_string());
            }
            (true, false)
        }
        EnvOutcome::Pending(classification, _) => {
            notes.push(format!("not in app.yaml ({classification}); see MIGRATION.md"));
            (*classification == Classification::NeedsDecision, decl.is_secret_hint)
        }
    };
    EnvTemplateEntry {
        key: decl.key.clone(),
        required,
        secret: secret || decl.is_secret_hint,
        source_note: notes.join("; "),
    }
}

/// Component slug for `raw`. Names that slug to one already taken get
/// `-2`, `-3`, and so on.
fn unique_component_name(spec: &AppSpec, raw: &str) -> String {
    let taken = |name: &str| spec.components().any(|(_, c)| c.name == name);
    let base = slugify(raw, MAX_NAME_LEN);
    if !taken(&base) {
        return base;
    }
    (2u32..)
        .map(|n| {
            let suffix = format!("-{n}");
            format!("{}{suffix}", slugify(raw, MAX_NAME_LEN - suffix.len()))
        })
        .find(|name| !taken(name.as_str()))
        .unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Image sources
// ---------------------------------------------------------------------------

fn public_image(image: &str) -> ImageSource {
    let (repo, tag) = split_image(image);
    let tag = Some(tag.unwrap_or("latest").to_string());
    let (host, path) = match repo.split_once('/') {
        Some((host, rest)) if host.contains('.') || host.contains(':') => (Some(host), rest),
        _ => (None, repo),
    };
    match host {
        Some("ghcr.io") => {
            let (owner, name) = path.split_once('/').unwrap_or(("", path));
            ImageSource {
                registry_type: "GHCR".to_string(),
                registry: Some(owner.to_string()).filter(|o| !o.is_empty()),
                repository: name.to_string(),
                tag,
            }
        }
        Some("registry.digitalocean.com") => ImageSource {
            registry_type: "DOCR".to_string(),
            registry: None,
            repository: path.split_once('/').map(|(_, r)| r).unwrap_or(path).to_string(),
            tag,
        },
        _ => {
            let (namespace, name) = path.split_once('/').unwrap_or(("library", path));
            ImageSource {
                registry_type: "DOCKER_HUB".to_string(),
                registry: Some(namespace.to_string()),
                repository: name.to_string(),
                tag,
            }
        }
    }
}

/// Image mirrored into the account's DigitalOcean Container Registry under
/// its last path segment.
fn docr_image(image: &str) -> ImageSource {
    let (repo, tag) = split_image(image);
    ImageSource {
        registry_type: "DOCR".to_string(),
        registry: None,
        repository: repo.rsplit('/').next().unwrap_or(repo).to_string(),
        tag: Some(tag.unwrap_or("latest").to_string()),
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

fn render_document(spec: &AppSpec, pending: &[Pending], model: &ArchitectureModel) -> Result<String> {
    let mut out = format!(
        "# App Platform spec generated by replat from {} configuration.\n# Review MIGRATION.md before deploying.\n",
        model.source_platform.description()
    );
    out.push_str(&spec.to_yaml()?);
    if !pending.is_empty() {
        out.push_str("\n# Not included above; see MIGRATION.md:\n");
        for item in pending {
            let note = item.note.replace(['\n', '\r'], " ");
            out.push_str(&format!("#   [{}] {}: {}\n", item.classification, item.subject, note));
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingEngine, Overrides};
    use crate::model::{DependencyRef, Origin, ScheduleSpec};
    use crate::rules::RuleTable;
    use crate::types::{DependencyCategory, PlatformId, ProcessKind};
    use crate::validate::AppSpecValidator;

    fn heroku_model() -> ArchitectureModel {
        let procfile = Origin::new("Procfile", Some(PlatformId::Heroku));
        let app_json = Origin::new("app.json", Some(PlatformId::Heroku));
        let mut secret = EnvVarDecl::new("SECRET_KEY", app_json.clone());
        secret.is_secret_hint = true;
        let mut database_url = EnvVarDecl::new("DATABASE_URL", app_json.clone());
        database_url.is_secret_hint = true;
        let mut amqp = EnvVarDecl::new("CLOUDAMQP_URL", app_json.clone());
        amqp.is_secret_hint = true;
        let mut debug = EnvVarDecl::new("DEBUG", app_json.clone());
        debug.has_literal_value = true;
        ArchitectureModel {
            source_platform: PlatformId::Heroku,
            platform_candidates: vec![PlatformId::Heroku],
            runtime: Runtime::Python,
            runtime_version: None,
            monorepo: None,
            region_hint: Some("eu".into()),
            app_name_hint: None,
            processes: vec![
                ProcessComponent::new("web", ProcessKind::Web, procfile.clone())
                    .with_command("gunicorn app:app")
                    .with_port(Some(8000)),
                ProcessComponent::new("worker", ProcessKind::Worker, procfile.clone())
                    .with_command("celery -A tasks worker"),
                ProcessComponent::new("postdeploy", ProcessKind::Release, app_json.clone())
                    .with_command("python manage.py seed"),
                ProcessComponent::new("report", ProcessKind::Scheduled, procfile).with_command("python report.py"),
            ],
            dependencies: vec![
                DependencyRef {
                    category: DependencyCategory::Database,
                    engine_hint: "postgres".into(),
                    source_name: "heroku-postgresql".into(),
                    required_env_vars: vec!["DATABASE_URL".into()],
                    version: Some("15.4".into()),
                    origin: app_json.clone(),
                },
                DependencyRef {
                    category: DependencyCategory::Queue,
                    engine_hint: "rabbitmq".into(),
                    source_name: "cloudamqp".into(),
                    required_env_vars: vec!["CLOUDAMQP_URL".into()],
                    version: None,
                    origin: app_json.clone(),
                },
            ],
            env_vars: vec![
                amqp,
                database_url,
                debug,
                EnvVarDecl::new("DYNO", app_json.clone()),
                EnvVarDecl::new("PORT", app_json.clone()),
                secret,
            ],
            schedules: vec![ScheduleSpec {
                name: "report".into(),
                cron_expression: "0 3 * * *".into(),
                command: "python report.py".into(),
                origin: app_json,
            }],
            sources: vec!["Procfile".into(), "app.json".into()],
            set_aside: vec![],
        }
    }

    fn generate(model: &ArchitectureModel, overrides: &Overrides, config: &MigrationConfig) -> GeneratedSpec {
        let rules = RuleTable::builtin().unwrap();
        let decisions = MappingEngine::new(&rules).map(model, overrides).unwrap();
        SpecGenerator::new(model, &decisions, config, "shop")
            .generate(&AppSpecValidator)
            .unwrap()
    }

    #[test]
    fn components_and_databases() {
        let out = generate(&heroku_model(), &Overrides::default(), &MigrationConfig::default());
        let spec = &out.spec;
        assert_eq!(spec.name, "shop-test");
        assert_eq!(spec.region, "ams");
        assert_eq!(spec.services.len(), 1);
        let web = &spec.services[0];
        assert_eq!(web.http_port, Some(8000));
        assert_eq!(web.environment_slug.as_deref(), Some("python"));
        assert_eq!(web.instance_count, Some(1));
        assert!(web.autoscaling.is_none());
        assert_eq!(spec.workers[0].run_command.as_deref(), Some("celery -A tasks worker"));

        let kinds: Vec<(&str, &str)> = spec
            .jobs
            .iter()
            .map(|j| (j.name.as_str(), j.kind.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(kinds, vec![("postdeploy", "POST_DEPLOY"), ("report", "SCHEDULED")]);
        assert_eq!(spec.jobs[1].schedule.as_ref().unwrap().cron, "0 3 * * *");

        assert_eq!(spec.databases.len(), 1);
        assert_eq!(spec.databases[0].name, "db");
        assert_eq!(spec.databases[0].version.as_deref(), Some("15"));
        assert!(!spec.databases[0].production);
    }

    #[test]
    fn envs_never_carry_literal_values() {
        let out = generate(&heroku_model(), &Overrides::default(), &MigrationConfig::default());
        let env = |key: &str| out.spec.envs.iter().find(|e| e.key == key);
        assert_eq!(env("DATABASE_URL").unwrap().value.as_deref(), Some("${db.DATABASE_URL}"));
        assert!(env("SECRET_KEY").unwrap().is_secret());
        assert!(env("SECRET_KEY").unwrap().value.is_none());
        assert!(env("DEBUG").unwrap().value.is_none());
        assert!(env("PORT").is_none());
        assert!(env("DYNO").is_none());
        // rabbitmq is undecided, so its connection variable is a plain secret
        assert!(env("CLOUDAMQP_URL").unwrap().is_secret());

        assert_eq!(out.env_template.len(), 6);
        let entry = |key: &str| out.env_template.iter().find(|e| e.key == key).unwrap();
        assert!(!entry("PORT").required);
        assert!(!entry("DATABASE_URL").required);
        assert!(entry("DATABASE_URL").secret);
        assert!(entry("SECRET_KEY").required && entry("SECRET_KEY").secret);
        assert!(entry("DEBUG").source_note.contains("copy it by hand"));
        assert!(!entry("DYNO").required);
    }

    #[test]
    fn pending_items_are_commented() {
        let out = generate(&heroku_model(), &Overrides::default(), &MigrationConfig::default());
        let subjects: Vec<String> = out.pending.iter().map(|p| p.subject.to_string()).collect();
        assert!(subjects.contains(&"dependency/queue/rabbitmq".to_string()));
        assert!(subjects.contains(&"env/DYNO".to_string()));
        assert!(out.document.contains("#   [needs_decision] dependency/queue/rabbitmq:"));
        assert!(out.document.contains("#   [unmappable] env/DYNO:"));
        assert!(AppSpecValidator.validate(&out.document).is_valid());
    }

    #[test]
    fn override_choice_reaches_the_spec() {
        let model = heroku_model();
        let rabbit = ElementId::Dependency {
            category: DependencyCategory::Queue,
            engine: "rabbitmq".into(),
        };
        let out = generate(
            &model,
            &Overrides::default().with(rabbit.clone(), "managed_kafka"),
            &MigrationConfig::default(),
        );
        let kafka = out.spec.database("kafka").unwrap();
        assert_eq!(kafka.engine, "KAFKA");
        assert!(kafka.production);
        assert_eq!(kafka.cluster_name.as_deref(), Some("shop-kafka"));
        let amqp = out.spec.envs.iter().find(|e| e.key == "CLOUDAMQP_URL").unwrap();
        assert_eq!(amqp.value.as_deref(), Some("${kafka.DATABASE_URL}"));
        assert!(!out.pending.iter().any(|p| p.subject == rabbit));

        let out = generate(
            &model,
            &Overrides::default().with(rabbit, "external_rabbitmq"),
            &MigrationConfig::default(),
        );
        assert!(out.spec.database("kafka").is_none());
        assert!(out.spec.envs.iter().any(|e| e.key == "CLOUDAMQP_URL" && e.is_secret()));
    }

    #[test]
    fn production_settings() {
        let config = MigrationConfig {
            environment: Environment::Production,
            repo_url: Some("https://github.com/acme/shop.git".into()),
            region: Some("sfo".into()),
            ..Default::default()
        };
        let out = generate(&heroku_model(), &Overrides::default(), &config);
        let web = &out.spec.services[0];
        assert_eq!(out.spec.name, "shop-production");
        assert_eq!(out.spec.region, "sfo");
        assert_eq!(web.instance_size_slug.as_deref(), Some("apps-d-1vcpu-2gb"));
        assert!(web.instance_count.is_none());
        assert_eq!(web.autoscaling.as_ref().unwrap().max_instance_count, 5);
        assert_eq!(web.git.as_ref().unwrap().branch, "main");
        assert_eq!(out.spec.workers[0].instance_count, Some(2));
        let db = out.spec.database("db").unwrap();
        assert!(db.production);
        assert_eq!(db.cluster_name.as_deref(), Some("shop-db"));
    }

    #[test]
    fn image_components() {
        let mut model = heroku_model();
        let compose = Origin::new("docker-compose.yml", Some(PlatformId::DockerCompose));
        model.processes.push(
            ProcessComponent::new("proxy", ProcessKind::Web, compose.clone())
                .with_image("nginx:1.27")
                .with_port(Some(80)),
        );
        let mut ecr = ProcessComponent::new("api", ProcessKind::Web, compose)
            .with_image("123456789012.dkr.ecr.us-east-1.amazonaws.com/team/api:2.1")
            .with_port(Some(9000));
        ecr.build = BuildSource::ForeignImage;
        model.processes.push(ecr);

        let overrides = Overrides::default().with(ElementId::Process("api".into()), "mirror_to_docr");
        let out = generate(&model, &overrides, &MigrationConfig::default());
        let find = |name: &str| out.spec.services.iter().find(|s| s.name == name).unwrap();
        let proxy = find("proxy").image.clone().unwrap();
        assert_eq!(proxy.registry_type, "DOCKER_HUB");
        assert_eq!(proxy.registry.as_deref(), Some("library"));
        assert_eq!(proxy.repository, "nginx");
        assert_eq!(proxy.tag.as_deref(), Some("1.27"));
        let api = find("api").image.clone().unwrap();
        assert_eq!(api.registry_type, "DOCR");
        assert_eq!(api.repository, "api");
        assert_eq!(api.tag.as_deref(), Some("2.1"));
    }

    #[test]
    fn regions() {
        assert_eq!(region_for("us"), Some("nyc"));
        assert_eq!(region_for("Frankfurt"), Some("fra"));
        assert_eq!(region_for("iad"), Some("nyc"));
        assert_eq!(region_for("ap-south-1"), Some("blr"));
        assert_eq!(region_for("syd"), Some("syd"));
        assert_eq!(region_for("mars-1"), None);
    }

    #[test]
    fn binding_fields() {
        assert_eq!(binding_field("DATABASE_URL"), Some("DATABASE_URL"));
        assert_eq!(binding_field("MEMCACHIER_SERVERS"), Some("HOSTNAME"));
        assert_eq!(binding_field("MEMCACHIER_USERNAME"), Some("USERNAME"));
        assert_eq!(binding_field("KAFKA_TRUSTED_CERT"), Some("CA_CERT"));
        assert_eq!(binding_field("KAFKA_CLIENT_CERT_KEY"), None);
    }

    #[test]
    fn ghcr_image_source() {
        let src = public_image("ghcr.io/acme/api");
        assert_eq!(src.registry_type, "GHCR");
        assert_eq!(src.registry.as_deref(), Some("acme"));
        assert_eq!(src.repository, "api");
        assert_eq!(src.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn colliding_slugs_get_suffixes() {
        let mut model = heroku_model();
        let procfile = Origin::new("Procfile", Some(PlatformId::Heroku));
        model.processes.push(
            ProcessComponent::new("web_worker", ProcessKind::Worker, procfile.clone()).with_command("rake jobs:a"),
        );
        model.processes.push(
            ProcessComponent::new("web-worker", ProcessKind::Worker, procfile).with_command("rake jobs:b"),
        );
        let out = generate(&model, &Overrides::default(), &MigrationConfig::default());
        let names: Vec<(&str, &str)> = out
            .spec
            .workers
            .iter()
            .map(|w| (w.name.as_str(), w.run_command.as_deref().unwrap_or("")))
            .collect();
        assert!(names.contains(&("web-worker", "rake jobs:a")));
        assert!(names.contains(&("web-worker-2", "rake jobs:b")));
        assert!(AppSpecValidator.validate(&out.document).is_valid());
    }

    #[test]
    fn deploy_template_drops_fixed_scaling() {
        let config = MigrationConfig {
            environment: Environment::Production,
            ..Default::default()
        };
        let rabbit = ElementId::Dependency {
            category: DependencyCategory::Queue,
            engine: "rabbitmq".into(),
        };
        let out = generate(
            &heroku_model(),
            &Overrides::default().with(rabbit, "managed_kafka"),
            &config,
        );
        assert!(out.spec.services[0].autoscaling.is_some());

        let template = out.deploy_template();
        let web = &template.spec.services[0];
        assert!(web.instance_count.is_none());
        assert!(web.autoscaling.is_none());
        let db = template.spec.database("db").unwrap();
        assert!(!db.production);
        assert!(db.cluster_name.is_none());
        assert!(template.spec.database("kafka").unwrap().production);

        let yaml = out.deploy_template_yaml().unwrap();
        let parsed: DeployTemplate = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn env_template_yaml_is_a_list() {
        let out = generate(&heroku_model(), &Overrides::default(), &MigrationConfig::default());
        let yaml = out.env_template_yaml().unwrap();
        let parsed: Vec<EnvTemplateEntry> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, out.env_template);
    }
}

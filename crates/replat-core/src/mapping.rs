//! Mapping engine: one [`MappingDecision`] per IR element.
//!
//! The engine is a pure function of `(ArchitectureModel, Overrides)` and the
//! rule table. Human answers never mutate a previous decision set; they are
//! fed back as [`Overrides`] and the whole set is recomputed.

use crate::error::{ReplatError, Result};
use crate::model::{ArchitectureModel, DependencyRef, ElementId, EnvVarDecl, ProcessComponent};
use crate::rules::{Rule, RuleOption, RuleOutcome, RuleTable, TargetConstruct};
use crate::types::{Classification, PlatformId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Keys set at runtime by a source platform that App Platform does not provide.
const PLATFORM_ENV_KEYS: &[&str] = &["DYNO", "RENDER", "IS_PULL_REQUEST", "FLY_APP_NAME", "RAILWAY_ENVIRONMENT"];

const PLATFORM_ENV_PREFIXES: &[&str] = &[
    "HEROKU_",
    "RENDER_",
    "FLY_",
    "RAILWAY_",
    "ECS_CONTAINER_METADATA",
    "AWS_EXECUTION_ENV",
];

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDecision {
    pub subject: ElementId,
    pub classification: Classification,
    /// Set for Mapped decisions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetConstruct>,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<RuleOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workaround: Option<String>,
    /// Option id chosen through an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    /// Key of the rule that produced this decision; `None` for built-in
    /// platform decisions and for elements no rule matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl MappingDecision {
    fn mapped(subject: ElementId, target: TargetConstruct, rationale: impl Into<String>) -> Self {
        Self {
            subject,
            classification: Classification::Mapped,
            target: Some(target),
            rationale: rationale.into(),
            question: None,
            options: Vec::new(),
            workaround: None,
            selected_option: None,
            rule: None,
        }
    }

    fn from_rule(subject: ElementId, rule: &Rule) -> Self {
        let mut decision = match &rule.outcome {
            RuleOutcome::Mapped { target, rationale } => Self::mapped(subject, target.clone(), rationale.clone()),
            RuleOutcome::NeedsDecision {
                question,
                rationale,
                options,
            } => Self {
                classification: Classification::NeedsDecision,
                target: None,
                question: Some(question.clone()),
                options: options.clone(),
                ..Self::mapped(subject, TargetConstruct::App, rationale.clone())
            },
            RuleOutcome::Unmappable { rationale, workaround } => Self {
                classification: Classification::Unmappable,
                target: None,
                workaround: Some(workaround.clone()),
                ..Self::mapped(subject, TargetConstruct::App, rationale.clone())
            },
        };
        decision.rule = Some(rule.key());
        decision
    }

    pub fn option(&self, id: &str) -> Option<&RuleOption> {
        self.options.iter().find(|o| o.id == id)
    }

    fn option_ids(&self) -> Vec<String> {
        self.options.iter().map(|o| o.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub mapped: usize,
    pub needs_decision: usize,
    pub unmappable: usize,
}

/// Decisions in model order: platform, processes, dependencies, env vars,
/// schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSet {
    pub source_platform: PlatformId,
    pub decisions: Vec<MappingDecision>,
}

impl DecisionSet {
    pub fn get(&self, id: &ElementId) -> Option<&MappingDecision> {
        self.decisions.iter().find(|d| &d.subject == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingDecision> {
        self.decisions.iter()
    }

    pub fn with_classification(&self, classification: Classification) -> impl Iterator<Item = &MappingDecision> {
        self.decisions
            .iter()
            .filter(move |d| d.classification == classification)
    }

    /// Target of `id` when it is Mapped.
    pub fn target(&self, id: &ElementId) -> Option<&TargetConstruct> {
        self.get(id)
            .filter(|d| d.classification == Classification::Mapped)
            .and_then(|d| d.target.as_ref())
    }

    pub fn counts(&self) -> DecisionCounts {
        let mut counts = DecisionCounts::default();
        for decision in &self.decisions {
            match decision.classification {
                Classification::Mapped => counts.mapped += 1,
                Classification::NeedsDecision => counts.needs_decision += 1,
                Classification::Unmappable => counts.unmappable += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Human answers to NeedsDecision items, keyed by element id.
///
/// ```yaml
/// decisions:
///   dependency/queue/rabbitmq: external_rabbitmq
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub decisions: BTreeMap<ElementId, String>,
}

impl Overrides {
    pub fn from_yaml(source_name: &str, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            let line = e.location().map(|l| l.line());
            ReplatError::parse(source_name, line, format!("invalid overrides file: {e}"))
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ReplatError::read(path.display().to_string(), e))?;
        Self::from_yaml(&path.display().to_string(), &content)
    }

    pub fn with(mut self, id: ElementId, option: impl Into<String>) -> Self {
        self.decisions.insert(id, option.into());
        self
    }

    pub fn get(&self, id: &ElementId) -> Option<&str> {
        self.decisions.get(id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct MappingEngine<'a> {
    rules: &'a RuleTable,
}

impl<'a> MappingEngine<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    pub fn map(&self, model: &ArchitectureModel, overrides: &Overrides) -> Result<DecisionSet> {
        let ids: BTreeSet<ElementId> = model.element_ids().into_iter().collect();
        if let Some(unknown) = overrides.decisions.keys().find(|id| !ids.contains(*id)) {
            return Err(ReplatError::UnknownElement(unknown.to_string()));
        }

        let mut decisions = Vec::with_capacity(model.element_count());
        decisions.push(self.platform_decision(model));
        decisions.extend(model.processes.iter().map(|p| self.process_decision(model, p)));
        decisions.extend(model.dependencies.iter().map(|d| self.dependency_decision(model, d)));
        decisions.extend(model.env_vars.iter().map(|e| self.env_decision(model, e)));
        decisions.extend(model.schedules.iter().map(|s| {
            let platform = s.origin.platform.unwrap_or(model.source_platform);
            self.decide(s.id(), "schedule", platform, "cron", || {
                format!(
                    "Recreate '{}' ({}) as a SCHEDULED job with the same cron expression.",
                    s.name, s.cron_expression
                )
            })
        }));

        for decision in &mut decisions {
            if let Some(option) = overrides.get(&decision.subject) {
                apply_override(decision, option)?;
            }
        }

        if let Err(e) = check_complete(model, &decisions) {
            tracing::error!(
                ir = %serde_json::to_string(model).unwrap_or_default(),
                "decision set is incomplete"
            );
            return Err(e);
        }

        let set = DecisionSet {
            source_platform: model.source_platform,
            decisions,
        };
        let counts = set.counts();
        tracing::info!(
            mapped = counts.mapped,
            needs_decision = counts.needs_decision,
            unmappable = counts.unmappable,
            overrides = overrides.decisions.len(),
            "mapping complete"
        );
        Ok(set)
    }

    fn decide(
        &self,
        subject: ElementId,
        category: &str,
        platform: PlatformId,
        engine: &str,
        workaround: impl FnOnce() -> String,
    ) -> MappingDecision {
        match self.rules.lookup(category, platform, engine) {
            Some(rule) => MappingDecision::from_rule(subject, rule),
            None => MappingDecision {
                classification: Classification::Unmappable,
                target: None,
                workaround: Some(workaround()),
                ..MappingDecision::mapped(
                    subject,
                    TargetConstruct::App,
                    format!(
                        "No App Platform equivalent is known for {category} '{engine}' from {}.",
                        platform.description()
                    ),
                )
            },
        }
    }

    fn platform_decision(&self, model: &ArchitectureModel) -> MappingDecision {
        let source = model.source_platform.description();
        if !model.is_platform_ambiguous() {
            return MappingDecision::mapped(
                ElementId::Platform,
                TargetConstruct::App,
                format!("Detected {source}; every component maps into one App Platform app."),
            );
        }
        let names: Vec<&str> = model
            .platform_candidates
            .iter()
            .map(|p| p.description())
            .collect();
        MappingDecision {
            classification: Classification::NeedsDecision,
            target: None,
            question: Some(format!(
                "The repository carries equally strong configuration for {}. Which one is the source of truth?",
                names.join(" and ")
            )),
            options: model
                .platform_candidates
                .iter()
                .map(|p| RuleOption {
                    id: p.as_str().to_string(),
                    description: format!("Treat the {} configuration as authoritative.", p.description()),
                    target: TargetConstruct::App,
                })
                .collect(),
            ..MappingDecision::mapped(
                ElementId::Platform,
                TargetConstruct::App,
                format!(
                    "Platform indicators are tied between {}; processes come from every tied platform until one is chosen.",
                    names.join(" and ")
                ),
            )
        }
    }

    fn process_decision(&self, model: &ArchitectureModel, process: &ProcessComponent) -> MappingDecision {
        let platform = process.origin.platform.unwrap_or(model.source_platform);
        self.decide(
            process.id(),
            process.kind.as_str(),
            platform,
            process.build.as_str(),
            || {
                format!(
                    "Run '{}' on a Droplet or keep it on {} and point it at the migrated app.",
                    process.name,
                    platform.description()
                )
            },
        )
    }

    fn dependency_decision(&self, model: &ArchitectureModel, dep: &DependencyRef) -> MappingDecision {
        let platform = dep.origin.platform.unwrap_or(model.source_platform);
        self.decide(dep.id(), dep.category.as_str(), platform, &dep.engine_hint, || {
            let vars = if dep.required_env_vars.is_empty() {
                "its connection variables".to_string()
            } else {
                dep.required_env_vars.join(", ")
            };
            format!(
                "Keep '{}' with an external provider and set {vars} as SECRET env vars, or add a rule for {}/{} to the rule overlay once a target is chosen.",
                dep.source_name, dep.category, dep.engine_hint
            )
        })
    }

    fn env_decision(&self, model: &ArchitectureModel, decl: &EnvVarDecl) -> MappingDecision {
        let platform = decl.origin.platform.unwrap_or(model.source_platform);
        self.decide(decl.id(), "env", platform, env_class(model, decl), || {
            format!("Set {} by hand in the App Platform console after reviewing its value.", decl.key)
        })
    }
}

/// Rule-table engine for an env var: `port`, `binding`, `platform`,
/// `secret` or `plain`.
pub fn env_class(model: &ArchitectureModel, decl: &EnvVarDecl) -> &'static str {
    let key = decl.key.as_str();
    if key == "PORT" {
        "port"
    } else if model.dependency_for_env(key).is_some() {
        "binding"
    } else if PLATFORM_ENV_KEYS.contains(&key) || PLATFORM_ENV_PREFIXES.iter().any(|p| key.starts_with(p)) {
        "platform"
    } else if decl.is_secret_hint {
        "secret"
    } else {
        "plain"
    }
}

fn apply_override(decision: &mut MappingDecision, option_id: &str) -> Result<()> {
    if decision.classification != Classification::NeedsDecision {
        tracing::warn!(
            element = %decision.subject,
            option = option_id,
            classification = %decision.classification,
            "override ignored: element does not need a decision"
        );
        return Ok(());
    }
    let option = decision
        .option(option_id)
        .cloned()
        .ok_or_else(|| ReplatError::InvalidOverride {
            element: decision.subject.to_string(),
            option: option_id.to_string(),
            valid: decision.option_ids(),
        })?;
    decision.classification = Classification::Mapped;
    decision.target = Some(option.target);
    decision.rationale = format!("{} Chosen: {}", decision.rationale, option.description);
    decision.selected_option = Some(option.id);
    Ok(())
}

/// Every model element has exactly one decision and nothing else does.
pub(crate) fn check_complete(model: &ArchitectureModel, decisions: &[MappingDecision]) -> Result<()> {
    let mut expected: BTreeMap<ElementId, usize> = BTreeMap::new();
    for id in model.element_ids() {
        *expected.entry(id).or_default() += 1;
    }
    let mut seen: BTreeMap<&ElementId, usize> = BTreeMap::new();
    for decision in decisions {
        *seen.entry(&decision.subject).or_default() += 1;
    }

    let mut faults = Vec::new();
    for (id, n) in &expected {
        if *n > 1 {
            faults.push(format!("element {id} appears {n} times in the model"));
        }
        match seen.get(id) {
            None => faults.push(format!("no decision for {id}")),
            Some(1) => {}
            Some(k) => faults.push(format!("{k} decisions for {id}")),
        }
    }
    for id in seen.keys() {
        if !expected.contains_key(*id) {
            faults.push(format!("decision for unknown element {id}"));
        }
    }

    if faults.is_empty() {
        Ok(())
    } else {
        Err(ReplatError::MappingFault(faults.join("; ")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Origin, ScheduleSpec};
    use crate::rules::{ComponentSource, DatabaseEngine, EnvScope, JobKind};
    use crate::types::{BuildSource, DependencyCategory, ProcessKind, Runtime};

    fn origin(path: &str, platform: PlatformId) -> Origin {
        Origin::new(path, Some(platform))
    }

    fn model() -> ArchitectureModel {
        let procfile = origin("Procfile", PlatformId::Heroku);
        let app_json = origin("app.json", PlatformId::Heroku);
        let mut secret = EnvVarDecl::new("SECRET_KEY", app_json.clone());
        secret.is_secret_hint = true;
        let mut debug = EnvVarDecl::new("DEBUG", app_json.clone());
        debug.has_literal_value = true;
        ArchitectureModel {
            source_platform: PlatformId::Heroku,
            platform_candidates: vec![PlatformId::Heroku],
            runtime: Runtime::Python,
            runtime_version: None,
            monorepo: None,
            region_hint: None,
            app_name_hint: None,
            processes: vec![
                ProcessComponent::new("web", ProcessKind::Web, procfile.clone())
                    .with_command("gunicorn app:app")
                    .with_port(Some(8000)),
                ProcessComponent::new("worker", ProcessKind::Worker, procfile)
                    .with_command("celery -A tasks worker"),
            ],
            dependencies: vec![
                DependencyRef {
                    category: DependencyCategory::Database,
                    engine_hint: "postgres".into(),
                    source_name: "heroku-postgresql".into(),
                    required_env_vars: vec!["DATABASE_URL".into()],
                    version: None,
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
                DependencyRef {
                    category: DependencyCategory::Other,
                    engine_hint: "papertrail".into(),
                    source_name: "papertrail".into(),
                    required_env_vars: Vec::new(),
                    version: None,
                    origin: app_json.clone(),
                },
            ],
            env_vars: vec![
                EnvVarDecl::new("CLOUDAMQP_URL", app_json.clone()),
                EnvVarDecl::new("DATABASE_URL", app_json.clone()),
                debug,
                EnvVarDecl::new("DYNO", app_json.clone()),
                EnvVarDecl::new("PORT", app_json),
                secret,
            ],
            schedules: Vec::new(),
            sources: vec!["Procfile".into(), "app.json".into()],
            set_aside: Vec::new(),
        }
    }

    fn run(model: &ArchitectureModel, overrides: &Overrides) -> Result<DecisionSet> {
        let rules = RuleTable::builtin().unwrap();
        MappingEngine::new(&rules).map(model, overrides)
    }

    fn dep(category: DependencyCategory, engine: &str) -> ElementId {
        ElementId::Dependency {
            category,
            engine: engine.into(),
        }
    }

    #[test]
    fn one_decision_per_element() {
        let model = model();
        let set = run(&model, &Overrides::default()).unwrap();
        assert_eq!(set.len(), model.element_count());
        let subjects: Vec<ElementId> = set.iter().map(|d| d.subject.clone()).collect();
        assert_eq!(subjects, model.element_ids());
    }

    #[test]
    fn processes_map_to_service_and_worker() {
        let set = run(&model(), &Overrides::default()).unwrap();
        assert_eq!(
            set.target(&ElementId::Process("web".into())),
            Some(&TargetConstruct::Service {
                source: ComponentSource::Declared
            })
        );
        assert_eq!(
            set.target(&ElementId::Process("worker".into())),
            Some(&TargetConstruct::Worker {
                source: ComponentSource::Declared
            })
        );
        assert_eq!(set.target(&ElementId::Platform), Some(&TargetConstruct::App));
    }

    #[test]
    fn unknown_addon_is_unmappable_with_workaround() {
        let set = run(&model(), &Overrides::default()).unwrap();
        let d = set.get(&dep(DependencyCategory::Other, "papertrail")).unwrap();
        assert_eq!(d.classification, Classification::Unmappable);
        assert!(d.rule.is_none());
        assert!(!d.rationale.is_empty());
        assert!(d.workaround.as_deref().is_some_and(|w| w.contains("papertrail")));
    }

    #[test]
    fn env_classes() {
        let set = run(&model(), &Overrides::default()).unwrap();
        let target = |key: &str| set.target(&ElementId::EnvVar(key.into())).cloned();
        assert_eq!(target("PORT"), Some(TargetConstruct::PlatformProvided));
        assert_eq!(target("DATABASE_URL"), Some(TargetConstruct::Binding));
        assert_eq!(target("CLOUDAMQP_URL"), Some(TargetConstruct::Binding));
        assert_eq!(
            target("SECRET_KEY"),
            Some(TargetConstruct::Env {
                scope: EnvScope::Secret
            })
        );
        assert_eq!(
            target("DEBUG"),
            Some(TargetConstruct::Env {
                scope: EnvScope::General
            })
        );
        let dyno = set.get(&ElementId::EnvVar("DYNO".into())).unwrap();
        assert_eq!(dyno.classification, Classification::Unmappable);
    }

    #[test]
    fn deterministic_output() {
        let model = model();
        let overrides = Overrides::default().with(dep(DependencyCategory::Queue, "rabbitmq"), "managed_kafka");
        let a = serde_json::to_vec(&run(&model, &overrides).unwrap()).unwrap();
        let b = serde_json::to_vec(&run(&model, &overrides).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn override_resolves_only_its_element() {
        let model = model();
        let before = run(&model, &Overrides::default()).unwrap();
        let rabbit = dep(DependencyCategory::Queue, "rabbitmq");
        assert_eq!(
            before.get(&rabbit).unwrap().classification,
            Classification::NeedsDecision
        );

        let overrides = Overrides::default().with(rabbit.clone(), "external_rabbitmq");
        let after = run(&model, &overrides).unwrap();
        let resolved = after.get(&rabbit).unwrap();
        assert_eq!(resolved.classification, Classification::Mapped);
        assert_eq!(resolved.selected_option.as_deref(), Some("external_rabbitmq"));
        assert_eq!(
            resolved.target,
            Some(TargetConstruct::External {
                provider: "cloudamqp".into()
            })
        );

        for (a, b) in before.iter().zip(after.iter()) {
            if a.subject != rabbit {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn bad_overrides_rejected() {
        let model = model();
        let err = run(
            &model,
            &Overrides::default().with(dep(DependencyCategory::Queue, "rabbitmq"), "carrier_pigeon"),
        )
        .unwrap_err();
        match err {
            ReplatError::InvalidOverride { valid, .. } => assert!(valid.contains(&"managed_kafka".to_string())),
            other => panic!("unexpected error: {other}"),
        }

        let err = run(&model, &Overrides::default().with(ElementId::Process("clock".into()), "x")).unwrap_err();
        assert!(matches!(err, ReplatError::UnknownElement(ref id) if id == "process/clock"));
    }

    #[test]
    fn override_for_mapped_element_is_ignored() {
        let model = model();
        let plain = run(&model, &Overrides::default()).unwrap();
        let ignored = run(&model, &Overrides::default().with(ElementId::Process("web".into()), "anything")).unwrap();
        assert_eq!(plain, ignored);
    }

    #[test]
    fn ambiguous_platform_needs_decision() {
        let mut model = model();
        model.source_platform = PlatformId::Render;
        model.platform_candidates = vec![PlatformId::Render, PlatformId::Fly];
        let set = run(&model, &Overrides::default()).unwrap();
        let d = set.get(&ElementId::Platform).unwrap();
        assert_eq!(d.classification, Classification::NeedsDecision);
        let ids: Vec<&str> = d.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["render", "fly"]);

        let set = run(&model, &Overrides::default().with(ElementId::Platform, "fly")).unwrap();
        let d = set.get(&ElementId::Platform).unwrap();
        assert_eq!(d.classification, Classification::Mapped);
        assert_eq!(d.selected_option.as_deref(), Some("fly"));
    }

    #[test]
    fn foreign_image_needs_decision() {
        let mut model = model();
        let ecs = origin("task-definition.json", PlatformId::AwsEcs);
        let mut api = ProcessComponent::new("api", ProcessKind::Web, ecs)
            .with_image("123456789012.dkr.ecr.us-east-1.amazonaws.com/api:1.4")
            .with_port(Some(8080));
        api.build = BuildSource::ForeignImage;
        model.processes.push(api);
        let set = run(&model, &Overrides::default()).unwrap();
        let d = set.get(&ElementId::Process("api".into())).unwrap();
        assert_eq!(d.classification, Classification::NeedsDecision);

        let overrides = Overrides::default().with(ElementId::Process("api".into()), "mirror_to_docr");
        let set = run(&model, &overrides).unwrap();
        assert_eq!(
            set.target(&ElementId::Process("api".into())),
            Some(&TargetConstruct::Service {
                source: ComponentSource::Docr
            })
        );
    }

    #[test]
    fn schedules_and_release_jobs() {
        let mut model = model();
        let render = origin("render.yaml", PlatformId::Render);
        model.processes.push(
            ProcessComponent::new("release", ProcessKind::Release, origin("Procfile", PlatformId::Heroku))
                .with_command("python manage.py migrate"),
        );
        model.processes.push(
            ProcessComponent::new("nightly", ProcessKind::Scheduled, render.clone()).with_command("python report.py"),
        );
        model.schedules.push(ScheduleSpec {
            name: "nightly".into(),
            cron_expression: "0 3 * * *".into(),
            command: "python report.py".into(),
            origin: render,
        });
        let set = run(&model, &Overrides::default()).unwrap();
        assert_eq!(
            set.target(&ElementId::Process("release".into())),
            Some(&TargetConstruct::Job {
                kind: JobKind::PreDeploy,
                source: ComponentSource::Declared
            })
        );
        assert_eq!(
            set.target(&ElementId::Schedule("nightly".into())),
            Some(&TargetConstruct::Schedule)
        );
    }

    #[test]
    fn redis_cache_maps_to_valkey() {
        let mut model = model();
        model.dependencies.push(DependencyRef {
            category: DependencyCategory::Cache,
            engine_hint: "redis".into(),
            source_name: "redis".into(),
            required_env_vars: vec!["REDIS_URL".into()],
            version: Some("7".into()),
            origin: origin("docker-compose.yml", PlatformId::DockerCompose),
        });
        let set = run(&model, &Overrides::default()).unwrap();
        assert_eq!(
            set.target(&dep(DependencyCategory::Cache, "redis")),
            Some(&TargetConstruct::Database {
                engine: DatabaseEngine::Valkey
            })
        );
    }

    #[test]
    fn completeness_check_catches_gaps_and_duplicates() {
        let model = model();
        let set = run(&model, &Overrides::default()).unwrap();

        let mut missing = set.decisions.clone();
        missing.pop();
        assert!(matches!(
            check_complete(&model, &missing),
            Err(ReplatError::MappingFault(_))
        ));

        let mut doubled = set.decisions.clone();
        doubled.push(doubled[1].clone());
        let err = check_complete(&model, &doubled).unwrap_err();
        assert!(err.to_string().contains("2 decisions for process/web"));
        assert!(!err.is_user_facing());
    }

    #[test]
    fn overrides_file_format() {
        let yaml = "decisions:\n  dependency/queue/rabbitmq: external_rabbitmq\n  platform: render\n";
        let overrides = Overrides::from_yaml("overrides.yaml", yaml).unwrap();
        assert_eq!(
            overrides.get(&dep(DependencyCategory::Queue, "rabbitmq")),
            Some("external_rabbitmq")
        );
        assert!(Overrides::from_yaml("overrides.yaml", "").unwrap().is_empty());
        let err = Overrides::from_yaml("overrides.yaml", "decisions:\n  bogus/x: y\n").unwrap_err();
        assert!(matches!(err, ReplatError::Parse { .. }));
    }
}

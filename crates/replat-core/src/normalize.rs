//! Merges parser fragments into one [`ArchitectureModel`].
//!
//! Merging never guesses: two sources that disagree about the same process
//! or schedule abort the run with both sources named. Only the leading
//! platforms declare processes; files of lower-ranked platforms add their
//! dependencies and env vars and nothing else.

use crate::error::{ReplatError, Result};
use crate::model::{
    ArchitectureModel, DependencyRef, EnvVarDecl, MonorepoLayout, Origin, ProcessComponent, ScheduleSpec,
};
use crate::parse::images;
use crate::parse::{DockerfileMeta, PartialIr};
use crate::types::{BuildSource, PlatformId, ProcessKind, Runtime};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Normalizer {
    platform: PlatformId,
    candidates: Vec<PlatformId>,
    /// `platform` was picked by an override among tied candidates.
    chosen: bool,
    runtime: Runtime,
    runtime_version: Option<String>,
    monorepo: Option<MonorepoLayout>,
}

impl Normalizer {
    /// `candidates` are the platforms tied for first place; an empty list
    /// means `platform` alone.
    pub fn new(platform: PlatformId, candidates: Vec<PlatformId>) -> Self {
        let candidates = if candidates.is_empty() {
            vec![platform]
        } else {
            candidates
        };
        Self {
            platform,
            candidates,
            chosen: false,
            runtime: Runtime::Unknown,
            runtime_version: None,
            monorepo: None,
        }
    }

    pub fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_runtime_version(mut self, version: Option<String>) -> Self {
        self.runtime_version = version;
        self
    }

    pub fn with_monorepo(mut self, layout: Option<MonorepoLayout>) -> Self {
        self.monorepo = layout;
        self
    }

    /// Settle a tied detection: only `platform`'s files declare processes,
    /// and its hints and conventions come first.
    pub fn with_choice(mut self, platform: PlatformId) -> Self {
        self.platform = platform;
        self.chosen = true;
        self
    }

    /// Whether files of `platform` may declare processes and schedules.
    fn declares_processes(&self, platform: Option<PlatformId>) -> bool {
        match platform {
            None | Some(PlatformId::Dockerfile) => true,
            Some(p) if self.chosen => p == self.platform,
            Some(p) => self.candidates.contains(&p),
        }
    }

    fn merge_rank(&self, fragment: &PartialIr) -> u8 {
        if fragment.platform == Some(self.platform) {
            0
        } else if self.declares_processes(fragment.platform) {
            1
        } else {
            2
        }
    }

    pub fn normalize(&self, fragments: Vec<PartialIr>) -> Result<ArchitectureModel> {
        self.merge(fragments).map_err(|e| self.tie_hint(e))
    }

    /// Conflicts between tied platforms can be settled with an override.
    fn tie_hint(&self, err: ReplatError) -> ReplatError {
        match err {
            ReplatError::Normalization { message, sources } if !self.chosen && self.candidates.len() > 1 => {
                let ids: Vec<&str> = self.candidates.iter().map(|p| p.as_str()).collect();
                ReplatError::Normalization {
                    message: format!(
                        "{message}; detection is tied, so choose one with 'platform: <{}>' in an overrides file",
                        ids.join("|")
                    ),
                    sources,
                }
            }
            other => other,
        }
    }

    fn merge(&self, mut fragments: Vec<PartialIr>) -> Result<ArchitectureModel> {
        fragments.sort_by_key(|f| self.merge_rank(f));
        let mut processes: Vec<ProcessComponent> = Vec::new();
        let mut dependencies: Vec<DependencyRef> = Vec::new();
        let mut env: BTreeMap<String, EnvVarDecl> = BTreeMap::new();
        let mut schedules: BTreeMap<String, ScheduleSpec> = BTreeMap::new();
        let mut dockerfiles: Vec<(String, DockerfileMeta)> = Vec::new();
        let mut region_hint = None;
        let mut app_name_hint = None;
        let mut sources = Vec::with_capacity(fragments.len());
        let mut set_aside = Vec::new();

        for mut fragment in fragments {
            sources.push(fragment.source.clone());
            region_hint = region_hint.or(fragment.region_hint.take());
            app_name_hint = app_name_hint.or(fragment.app_name_hint.take());
            if let Some(meta) = fragment.dockerfile.take() {
                dockerfiles.push((fragment.source.clone(), meta));
            }
            if !self.declares_processes(fragment.platform) {
                let names = fragment
                    .processes
                    .drain(..)
                    .map(|p| p.name)
                    .chain(fragment.schedules.drain(..).map(|s| format!("schedule {}", s.name)));
                for name in names {
                    tracing::info!(source = %fragment.source, name = %name, "set aside: platform is not the source of truth");
                    set_aside.push(format!("{name} ({})", fragment.source));
                }
            }
            for incoming in fragment.processes {
                match processes.iter_mut().find(|p| p.name == incoming.name) {
                    Some(existing) => merge_process(existing, incoming)?,
                    None => processes.push(incoming),
                }
            }
            for incoming in fragment.dependencies {
                match dependencies
                    .iter_mut()
                    .find(|d| d.category == incoming.category && d.engine_hint == incoming.engine_hint)
                {
                    Some(existing) => merge_dependency(existing, incoming),
                    None => dependencies.push(incoming),
                }
            }
            for incoming in fragment.env_vars {
                match env.get_mut(&incoming.key) {
                    Some(existing) => merge_env(existing, incoming),
                    None => {
                        env.insert(incoming.key.clone(), incoming);
                    }
                }
            }
            for incoming in fragment.schedules {
                match schedules.get(&incoming.name) {
                    Some(existing) if existing.cron_expression != incoming.cron_expression => {
                        return Err(conflict(
                            format!(
                                "schedule '{}' runs at '{}' in one source and '{}' in another",
                                incoming.name, existing.cron_expression, incoming.cron_expression
                            ),
                            &existing.origin,
                            &incoming.origin,
                        ));
                    }
                    Some(_) => {}
                    None => {
                        schedules.insert(incoming.name.clone(), incoming);
                    }
                }
            }
        }

        // Connection variables of every dependency must reach the env template.
        for dep in &dependencies {
            for key in &dep.required_env_vars {
                let entry = env.entry(key.clone()).or_insert_with(|| {
                    let mut decl = EnvVarDecl::new(key.as_str(), dep.origin.clone());
                    decl.note = Some(format!(
                        "connection variable for {}/{} '{}'",
                        dep.category, dep.engine_hint, dep.source_name
                    ));
                    decl
                });
                entry.is_secret_hint = true;
            }
        }

        if processes.is_empty() {
            if let Some(process) = synthesize_web(&dockerfiles) {
                tracing::debug!(source = %process.origin, "no process declared, using Dockerfile as web");
                processes.push(process);
            }
        }
        for process in &mut processes {
            self.refine(process, &dockerfiles);
        }
        check_web_units(&processes)?;

        processes.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));
        dependencies.sort_by(|a, b| (a.category, &a.engine_hint).cmp(&(b.category, &b.engine_hint)));

        let model = ArchitectureModel {
            source_platform: self.platform,
            platform_candidates: self.candidates.clone(),
            runtime: self.runtime,
            runtime_version: self.runtime_version.clone(),
            monorepo: self.monorepo.clone(),
            region_hint,
            app_name_hint,
            processes,
            dependencies,
            env_vars: env.into_values().collect(),
            schedules: schedules.into_values().collect(),
            sources,
            set_aside,
        };
        tracing::info!(
            platform = %model.source_platform,
            processes = model.processes.len(),
            dependencies = model.dependencies.len(),
            env = model.env_vars.len(),
            schedules = model.schedules.len(),
            "normalized architecture"
        );
        Ok(model)
    }

    /// Settle how the component is built and, for web processes, its port.
    fn refine(&self, process: &mut ProcessComponent, dockerfiles: &[(String, DockerfileMeta)]) {
        let local = dockerfiles
            .iter()
            .find(|(_, meta)| meta.source_dir == process.source_dir);

        if let Some(image) = &process.image {
            process.build = if images::is_pullable(image) {
                BuildSource::Image
            } else {
                BuildSource::ForeignImage
            };
        } else if process.dockerfile_path.is_some() {
            process.build = BuildSource::Dockerfile;
        } else if let Some((path, _)) = local {
            process.build = BuildSource::Dockerfile;
            process.dockerfile_path = Some(path.clone());
        }

        if process.kind == ProcessKind::Web && process.port.is_none() {
            let platform = process.origin.platform.unwrap_or(self.platform);
            let from_dockerfile = match process.build {
                BuildSource::Dockerfile => {
                    let path = process.dockerfile_path.as_deref();
                    dockerfiles
                        .iter()
                        .find(|(p, _)| Some(p.as_str()) == path)
                        .or(local)
                        .and_then(|(_, meta)| meta.expose)
                }
                _ => None,
            };
            process.port = Some(
                from_dockerfile
                    .or_else(|| self.runtime.default_port())
                    .unwrap_or_else(|| platform.default_web_port()),
            );
        }
    }
}

/// `normalize(platform, fragments)` for callers without detection details.
pub fn normalize(platform: PlatformId, fragments: Vec<PartialIr>) -> Result<ArchitectureModel> {
    Normalizer::new(platform, Vec::new()).normalize(fragments)
}

// ---------------------------------------------------------------------------
// Merge rules
// ---------------------------------------------------------------------------

fn conflict(message: String, a: &Origin, b: &Origin) -> ReplatError {
    let mut sources = vec![a.path.clone()];
    if b.path != a.path {
        sources.push(b.path.clone());
    }
    ReplatError::Normalization { message, sources }
}

fn merge_process(existing: &mut ProcessComponent, incoming: ProcessComponent) -> Result<()> {
    let name = &incoming.name;
    if existing.kind != incoming.kind {
        return Err(conflict(
            format!(
                "process '{name}' is a {} process in one source and a {} process in another",
                existing.kind, incoming.kind
            ),
            &existing.origin,
            &incoming.origin,
        ));
    }
    if !existing.command.is_empty() && !incoming.command.is_empty() && existing.command != incoming.command {
        return Err(conflict(
            format!(
                "process '{name}' has conflicting commands: '{}' vs '{}'",
                existing.command, incoming.command
            ),
            &existing.origin,
            &incoming.origin,
        ));
    }
    if let (Some(a), Some(b)) = (existing.port, incoming.port) {
        if a != b {
            return Err(conflict(
                format!("process '{name}' listens on port {a} in one source and {b} in another"),
                &existing.origin,
                &incoming.origin,
            ));
        }
    }

    if existing.command.is_empty() {
        existing.command = incoming.command;
    }
    existing.port = existing.port.or(incoming.port);
    existing.health_check_path = existing.health_check_path.take().or(incoming.health_check_path);
    existing.instances = existing.instances.or(incoming.instances);
    existing.build_command = existing.build_command.take().or(incoming.build_command);
    existing.output_dir = existing.output_dir.take().or(incoming.output_dir);
    let existing_unbuilt =
        existing.build == BuildSource::Buildpack && existing.image.is_none() && existing.dockerfile_path.is_none();
    if existing_unbuilt && incoming.build != BuildSource::Buildpack {
        existing.build = incoming.build;
        existing.source_dir = incoming.source_dir;
        existing.image = incoming.image;
        existing.dockerfile_path = incoming.dockerfile_path;
    }
    Ok(())
}

fn merge_dependency(existing: &mut DependencyRef, incoming: DependencyRef) {
    for key in incoming.required_env_vars {
        if !existing.required_env_vars.contains(&key) {
            existing.required_env_vars.push(key);
        }
    }
    existing.version = existing.version.take().or(incoming.version);
}

/// The stricter classification wins: a key secret anywhere is secret.
fn merge_env(existing: &mut EnvVarDecl, incoming: EnvVarDecl) {
    existing.is_secret_hint |= incoming.is_secret_hint;
    existing.has_literal_value |= incoming.has_literal_value;
    existing.note = existing.note.take().or(incoming.note);
}

fn synthesize_web(dockerfiles: &[(String, DockerfileMeta)]) -> Option<ProcessComponent> {
    let (path, meta) = dockerfiles
        .iter()
        .find(|(_, meta)| meta.source_dir == "/")
        .or_else(|| dockerfiles.first())?;
    let mut process = ProcessComponent::new(
        "web",
        ProcessKind::Web,
        Origin::new(path.clone(), Some(PlatformId::Dockerfile)),
    )
    .with_port(meta.expose);
    process.source_dir = meta.source_dir.clone();
    process.build = BuildSource::Dockerfile;
    process.dockerfile_path = Some(path.clone());
    Some(process)
}

/// At most one web process per deployable unit.
fn check_web_units(processes: &[ProcessComponent]) -> Result<()> {
    let mut units: BTreeMap<String, &ProcessComponent> = BTreeMap::new();
    for process in processes.iter().filter(|p| p.kind == ProcessKind::Web) {
        if let Some(first) = units.insert(process.unit_key(), process) {
            return Err(conflict(
                format!(
                    "web processes '{}' and '{}' both serve the same deployable unit ({})",
                    first.name,
                    process.name,
                    process.unit_key()
                ),
                &first.origin,
                &process.origin,
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

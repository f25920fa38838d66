//! Format parsers. One module per source format; each turns raw file
//! content into a [`PartialIr`] fragment. Parsers share no state, so the
//! fragments of one repository can be produced concurrently.

pub mod aws;
pub mod compose;
pub mod dockerfile;
pub mod envfile;
pub mod fly;
pub mod heroku;
pub mod images;
pub mod procfile;
pub mod railway;
pub mod render;

use crate::error::{ReplatError, Result};
use crate::model::{DependencyRef, EnvVarDecl, Origin, ProcessComponent, ScheduleSpec};
use crate::source::{RepoScan, SourceFile};
use crate::types::{PlatformId, SourceFormat};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// PartialIr
// ---------------------------------------------------------------------------

/// `EXPOSE`/`CMD` metadata from one Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileMeta {
    pub source_dir: String,
    pub expose: Option<u16>,
    pub command: Option<String>,
}

/// IR fragment produced by a single parser from a single file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartialIr {
    pub source: String,
    /// Platform the source file is evidence for.
    pub platform: Option<PlatformId>,
    pub processes: Vec<ProcessComponent>,
    pub dependencies: Vec<DependencyRef>,
    pub env_vars: Vec<EnvVarDecl>,
    pub schedules: Vec<ScheduleSpec>,
    pub dockerfile: Option<DockerfileMeta>,
    pub region_hint: Option<String>,
    pub app_name_hint: Option<String>,
}

impl PartialIr {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ParseContext
// ---------------------------------------------------------------------------

/// Identity of the file being parsed; used to tag elements and errors.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub path: String,
    pub format: SourceFormat,
}

impl ParseContext {
    pub fn new(path: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn origin(&self) -> Origin {
        Origin::new(self.path.clone(), self.format.platform())
    }

    pub fn fragment(&self) -> PartialIr {
        PartialIr {
            platform: self.format.platform(),
            ..PartialIr::new(self.path.clone())
        }
    }

    pub fn error(&self, line: Option<usize>, message: impl Into<String>) -> ReplatError {
        ReplatError::parse(self.path.clone(), line, message)
    }

    pub fn require_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(self.error(None, "file is empty"));
        }
        Ok(())
    }

    pub fn yaml<T: serde::de::DeserializeOwned>(&self, content: &str) -> Result<T> {
        self.require_content(content)?;
        serde_yaml::from_str(content).map_err(|e| {
            let line = e.location().map(|l| l.line());
            self.error(line, format!("invalid YAML: {e}"))
        })
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self, content: &str) -> Result<T> {
        self.require_content(content)?;
        serde_json::from_str(content).map_err(|e| {
            let line = (e.line() > 0).then_some(e.line());
            self.error(line, format!("invalid JSON: {e}"))
        })
    }

    pub fn toml<T: serde::de::DeserializeOwned>(&self, content: &str) -> Result<T> {
        self.require_content(content)?;
        toml::from_str(content).map_err(|e| {
            let line = e
                .span()
                .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1);
            self.error(line, format!("invalid TOML: {}", e.message()))
        })
    }

    /// Env var declared by this file, with the name-based secret heuristic applied.
    pub fn env(&self, key: &str, has_literal_value: bool) -> EnvVarDecl {
        let mut decl = EnvVarDecl::new(key, self.origin());
        decl.has_literal_value = has_literal_value;
        decl.is_secret_hint = looks_secret(key);
        decl
    }

    /// Env var declared through a secret construct of the source platform.
    pub fn secret_env(&self, key: &str, note: impl Into<String>) -> EnvVarDecl {
        let mut decl = EnvVarDecl::new(key, self.origin());
        decl.is_secret_hint = true;
        decl.note = Some(note.into());
        decl
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub type ParseFn = fn(&ParseContext, &str) -> Result<PartialIr>;

impl SourceFormat {
    pub fn parser(self) -> ParseFn {
        match self {
            SourceFormat::Procfile => procfile::parse,
            SourceFormat::AppJson => heroku::parse_app_json,
            SourceFormat::HerokuYml => heroku::parse_heroku_yml,
            SourceFormat::RenderYaml => render::parse,
            SourceFormat::RailwayJson => railway::parse_json,
            SourceFormat::RailwayToml => railway::parse_toml,
            SourceFormat::FlyToml => fly::parse,
            SourceFormat::Compose => compose::parse,
            SourceFormat::EcsTaskDefinition => aws::parse_task_definition,
            SourceFormat::AppRunnerYaml => aws::parse_apprunner,
            SourceFormat::Dockerrun => aws::parse_dockerrun,
            SourceFormat::Dockerfile => dockerfile::parse,
            SourceFormat::EnvTemplate => envfile::parse,
        }
    }
}

pub fn parse_source(file: &SourceFile, content: &str) -> Result<PartialIr> {
    let ctx = ParseContext::new(file.path.clone(), file.format);
    let fragment = (file.format.parser())(&ctx, content)?;
    tracing::debug!(
        path = %file.path,
        format = %file.format,
        processes = fragment.processes.len(),
        dependencies = fragment.dependencies.len(),
        env = fragment.env_vars.len(),
        "parsed source file"
    );
    Ok(fragment)
}

fn read_and_parse(scan: &RepoScan, file: &SourceFile) -> Result<PartialIr> {
    let content = scan.read(file)?;
    parse_source(file, &content)
}

/// Parse every file, in input order. With `parallel`, files are parsed on
/// a pool sized to the file count; the output is identical either way and
/// the first error in input order wins.
pub fn parse_all(scan: &RepoScan, files: &[SourceFile], parallel: bool) -> Result<Vec<PartialIr>> {
    let results: Vec<Result<PartialIr>> = if parallel && files.len() > 1 {
        let threads = files.len().min(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        );
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| {
                files
                    .par_iter()
                    .map(|f| read_and_parse(scan, f))
                    .collect()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "parser pool unavailable, parsing sequentially");
                files.iter().map(|f| read_and_parse(scan, f)).collect()
            }
        }
    } else {
        files.iter().map(|f| read_and_parse(scan, f)).collect()
    };
    results.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

static SECRET_RE: OnceLock<Regex> = OnceLock::new();

fn secret_re() -> &'static Regex {
    SECRET_RE.get_or_init(|| {
        Regex::new(
            r"(?i)(SECRET|PASSWORD|PASSWD|TOKEN|CREDENTIAL|PRIVATE|API_?KEY|ACCESS_?KEY|(^|_)KEY$|DATABASE_URL|_DSN$)",
        )
        .unwrap()
    })
}

/// Name-based secret heuristic.
pub fn looks_secret(key: &str) -> bool {
    secret_re().is_match(key)
}

/// A command written either as one shell line or as an argv list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    pub fn render(&self) -> String {
        match self {
            CommandSpec::Line(line) => line.trim().to_string(),
            CommandSpec::Argv(argv) => argv
                .iter()
                .map(|arg| {
                    if arg.is_empty() || arg.contains(char::is_whitespace) {
                        format!("'{}'", arg.replace('\'', r"'\''"))
                    } else {
                        arg.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Parse a port number written as a string or integer-like text.
pub fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|p| *p > 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

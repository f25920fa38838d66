//! Heroku manifests: `app.json` and `heroku.yml`.
//!
//! Add-ons are resolved through [`ADDONS`]; an add-on we do not know is kept
//! as an `other` dependency so it still reaches the report.

use super::procfile::kind_for;
use super::{CommandSpec, ParseContext, PartialIr};
use crate::error::Result;
use crate::model::{DependencyRef, ProcessComponent};
use crate::paths;
use crate::types::{BuildSource, DependencyCategory, ProcessKind};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Name given to the `scripts.postdeploy` hook. It runs after a deploy
/// rather than before one.
pub const POSTDEPLOY_PROCESS: &str = "postdeploy";

// ---------------------------------------------------------------------------
// Add-on table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Addon {
    /// Add-on service name, the part of a plan before `:`.
    pub service: &'static str,
    pub category: DependencyCategory,
    pub engine: &'static str,
    pub env: &'static [&'static str],
}

const fn addon(
    service: &'static str,
    category: DependencyCategory,
    engine: &'static str,
    env: &'static [&'static str],
) -> Addon {
    Addon {
        service,
        category,
        engine,
        env,
    }
}

use DependencyCategory::{Cache, Database, Email, Other, Queue, Search, Storage};

pub const ADDONS: &[Addon] = &[
    addon("heroku-postgresql", Database, "postgres", &["DATABASE_URL"]),
    addon("jawsdb", Database, "mysql", &["JAWSDB_URL"]),
    addon("jawsdb-maria", Database, "mysql", &["JAWSDB_MARIA_URL"]),
    addon("cleardb", Database, "mysql", &["CLEARDB_DATABASE_URL"]),
    addon("mongolab", Database, "mongodb", &["MONGODB_URI"]),
    addon("heroku-redis", Cache, "redis", &["REDIS_URL"]),
    addon("rediscloud", Cache, "redis", &["REDISCLOUD_URL"]),
    addon("redistogo", Cache, "redis", &["REDISTOGO_URL"]),
    addon(
        "memcachier",
        Cache,
        "memcached",
        &["MEMCACHIER_SERVERS", "MEMCACHIER_USERNAME", "MEMCACHIER_PASSWORD"],
    ),
    addon("cloudamqp", Queue, "rabbitmq", &["CLOUDAMQP_URL"]),
    addon(
        "heroku-kafka",
        Queue,
        "kafka",
        &["KAFKA_URL", "KAFKA_CLIENT_CERT", "KAFKA_CLIENT_CERT_KEY", "KAFKA_TRUSTED_CERT"],
    ),
    addon("bonsai", Search, "elasticsearch", &["BONSAI_URL"]),
    addon("searchbox", Search, "elasticsearch", &["SEARCHBOX_URL"]),
    addon("sendgrid", Email, "sendgrid", &["SENDGRID_API_KEY"]),
    addon("mailgun", Email, "mailgun", &["MAILGUN_API_KEY", "MAILGUN_DOMAIN"]),
    addon("postmark", Email, "postmark", &["POSTMARK_API_TOKEN"]),
    addon(
        "bucketeer",
        Storage,
        "s3",
        &["BUCKETEER_AWS_ACCESS_KEY_ID", "BUCKETEER_AWS_SECRET_ACCESS_KEY", "BUCKETEER_BUCKET_NAME"],
    ),
    addon(
        "cloudcube",
        Storage,
        "s3",
        &["CLOUDCUBE_ACCESS_KEY_ID", "CLOUDCUBE_SECRET_ACCESS_KEY", "CLOUDCUBE_URL"],
    ),
    addon("scheduler", Other, "heroku-scheduler", &[]),
];

pub fn lookup_addon(service: &str) -> Option<&'static Addon> {
    ADDONS.iter().find(|a| a.service == service)
}

/// Resolve `plan` (e.g. `heroku-postgresql:essential-0`) to a dependency.
/// `alias` renames the add-on's primary config var (`as: CACHE` → `CACHE_URL`).
fn addon_dependency(
    ctx: &ParseContext,
    plan: &str,
    alias: Option<&str>,
    version: Option<String>,
) -> DependencyRef {
    let service = plan.split(':').next().unwrap_or(plan).trim();
    let (category, engine, mut env) = match lookup_addon(service) {
        Some(a) => (
            a.category,
            a.engine.to_string(),
            a.env.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
        ),
        None => (Other, service.to_string(), Vec::new()),
    };
    if let Some(alias) = alias.filter(|a| !a.trim().is_empty()) {
        let primary = format!("{}_URL", alias.trim().to_ascii_uppercase());
        match env.first_mut() {
            Some(first) => *first = primary,
            None => env.push(primary),
        }
    }
    DependencyRef {
        category,
        engine_hint: engine,
        source_name: plan.trim().to_string(),
        required_env_vars: env,
        version,
        origin: ctx.origin(),
    }
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppJson {
    name: Option<String>,
    env: BTreeMap<String, AppEnv>,
    addons: Vec<AppAddon>,
    formation: BTreeMap<String, Formation>,
    scripts: Scripts,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AppEnv {
    Literal(String),
    Spec {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        generator: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AppAddon {
    Plan(String),
    Spec {
        plan: String,
        #[serde(default, rename = "as")]
        alias: Option<String>,
        #[serde(default)]
        options: BTreeMap<String, serde_json::Value>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Formation {
    quantity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Scripts {
    postdeploy: Option<String>,
}

pub fn parse_app_json(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let app: AppJson = ctx.json(content)?;
    let mut fragment = ctx.fragment();
    fragment.app_name_hint = app.name;

    for (key, spec) in &app.env {
        let decl = match spec {
            AppEnv::Literal(v) => ctx.env(key, !v.is_empty()),
            AppEnv::Spec {
                generator: Some(generator),
                ..
            } if generator == "secret" => ctx.secret_env(key, "generated secret in app.json"),
            AppEnv::Spec {
                value, description, ..
            } => {
                let mut decl = ctx.env(key, value.as_deref().is_some_and(|v| !v.is_empty()));
                decl.note = description.clone();
                decl
            }
        };
        fragment.env_vars.push(decl);
    }

    for entry in &app.addons {
        let dep = match entry {
            AppAddon::Plan(plan) => addon_dependency(ctx, plan, None, None),
            AppAddon::Spec {
                plan,
                alias,
                options,
            } => {
                let version = options.get("version").map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                addon_dependency(ctx, plan, alias.as_deref(), version)
            }
        };
        fragment.dependencies.push(dep);
    }

    for (name, formation) in &app.formation {
        let mut process = ProcessComponent::new(name.as_str(), kind_for(name), ctx.origin());
        process.instances = formation.quantity;
        fragment.processes.push(process);
    }

    if let Some(script) = app.scripts.postdeploy.as_deref().filter(|s| !s.trim().is_empty()) {
        fragment.processes.push(
            ProcessComponent::new(POSTDEPLOY_PROCESS, ProcessKind::Release, ctx.origin())
                .with_command(script),
        );
    }

    Ok(fragment)
}

// ---------------------------------------------------------------------------
// heroku.yml
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HerokuYml {
    setup: Setup,
    build: Build,
    release: Option<Release>,
    run: BTreeMap<String, RunSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Setup {
    addons: Vec<SetupAddon>,
    config: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct SetupAddon {
    plan: String,
    #[serde(default, rename = "as")]
    alias: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Build {
    docker: BTreeMap<String, String>,
    config: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct Release {
    command: CommandSpec,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunSpec {
    Command(CommandSpec),
    Full {
        command: CommandSpec,
        #[serde(default)]
        image: Option<String>,
    },
}

/// heroku.yml list commands are shell words, not an exec vector.
fn shell_line(command: &CommandSpec) -> String {
    match command {
        CommandSpec::Line(line) => line.trim().to_string(),
        CommandSpec::Argv(words) => words.join(" "),
    }
}

pub fn parse_heroku_yml(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let manifest: HerokuYml = ctx.yaml(content)?;
    let mut fragment = ctx.fragment();

    for addon in &manifest.setup.addons {
        fragment
            .dependencies
            .push(addon_dependency(ctx, &addon.plan, addon.alias.as_deref(), None));
    }
    for key in manifest.setup.config.keys().chain(manifest.build.config.keys()) {
        fragment.env_vars.push(ctx.env(key, true));
    }

    let docker = &manifest.build.docker;
    let with_build = |mut process: ProcessComponent, image: Option<&str>| -> Result<ProcessComponent> {
        let target = image.unwrap_or(process.name.as_str());
        if let Some(dockerfile) = docker.get(target) {
            let dockerfile = dockerfile.trim_start_matches("./").to_string();
            process.source_dir = paths::source_dir_of(&dockerfile);
            process.dockerfile_path = Some(dockerfile);
            process.build = BuildSource::Dockerfile;
        } else if let Some(image) = image {
            return Err(ctx.error(
                None,
                format!(
                    "process '{}' uses image '{image}' which is not listed under build.docker",
                    process.name
                ),
            ));
        }
        Ok(process)
    };

    for (name, run) in &manifest.run {
        let (command, image) = match run {
            RunSpec::Command(cmd) => (cmd, None),
            RunSpec::Full { command, image } => (command, image.as_deref()),
        };
        let process = ProcessComponent::new(name.as_str(), kind_for(name), ctx.origin())
            .with_command(shell_line(command));
        fragment.processes.push(with_build(process, image)?);
    }

    // Dockerfiles with no run entry use their own CMD.
    for name in docker.keys().filter(|n| !manifest.run.contains_key(*n)) {
        let process = ProcessComponent::new(name.as_str(), kind_for(name), ctx.origin());
        fragment.processes.push(with_build(process, None)?);
    }

    if let Some(release) = &manifest.release {
        let process = ProcessComponent::new("release", ProcessKind::Release, ctx.origin())
            .with_command(shell_line(&release.command));
        let image = release.image.as_deref().or(Some("web")).filter(|i| docker.contains_key(*i));
        fragment.processes.push(with_build(process, image)?);
    }

    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFormat;

    fn app_ctx() -> ParseContext {
        ParseContext::new("app.json", SourceFormat::AppJson)
    }

    fn yml_ctx() -> ParseContext {
        ParseContext::new("heroku.yml", SourceFormat::HerokuYml)
    }

    #[test]
    fn app_json_env_addons_formation() {
        let json = r#"{
          "name": "Shop Front",
          "env": {
            "SECRET_TOKEN": {"generator": "secret"},
            "WEB_CONCURRENCY": {"value": "2", "description": "gunicorn workers"},
            "NODE_ENV": "production",
            "EMPTY": ""
          },
          "addons": ["heroku-postgresql:essential-0", {"plan": "heroku-redis:mini", "as": "CACHE"}, "papertrail"],
          "formation": {"web": {"quantity": 2}},
          "scripts": {"postdeploy": "bin/seed"}
        }"#;
        let ir = parse_app_json(&app_ctx(), json).unwrap();
        assert_eq!(ir.app_name_hint.as_deref(), Some("Shop Front"));

        let secret = ir.env_vars.iter().find(|e| e.key == "SECRET_TOKEN").unwrap();
        assert!(secret.is_secret_hint);
        assert!(!secret.has_literal_value);
        let conc = ir.env_vars.iter().find(|e| e.key == "WEB_CONCURRENCY").unwrap();
        assert!(conc.has_literal_value);
        assert_eq!(conc.note.as_deref(), Some("gunicorn workers"));
        assert!(!ir.env_vars.iter().find(|e| e.key == "EMPTY").unwrap().has_literal_value);

        assert_eq!(ir.dependencies.len(), 3);
        assert_eq!(ir.dependencies[0].engine_hint, "postgres");
        assert_eq!(ir.dependencies[0].required_env_vars, vec!["DATABASE_URL"]);
        assert_eq!(ir.dependencies[1].required_env_vars, vec!["CACHE_URL"]);
        assert_eq!(ir.dependencies[2].category, DependencyCategory::Other);
        assert_eq!(ir.dependencies[2].engine_hint, "papertrail");

        let web = ir.processes.iter().find(|p| p.name == "web").unwrap();
        assert_eq!(web.instances, Some(2));
        assert!(web.command.is_empty());
        let post = ir.processes.iter().find(|p| p.name == POSTDEPLOY_PROCESS).unwrap();
        assert_eq!(post.kind, ProcessKind::Release);
        assert_eq!(post.command, "bin/seed");
    }

    #[test]
    fn addon_table_lookup() {
        assert_eq!(lookup_addon("cloudamqp").unwrap().engine, "rabbitmq");
        assert_eq!(lookup_addon("scheduler").unwrap().category, DependencyCategory::Other);
        assert!(lookup_addon("heroku-postgres").is_none());
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(parse_app_json(&app_ctx(), "{\"env\": [}").is_err());
    }

    #[test]
    fn heroku_yml_docker_build() {
        let yaml = r#"
setup:
  addons:
    - plan: heroku-postgresql
  config:
    S3_BUCKET: my-bucket
build:
  docker:
    web: Dockerfile
    worker: worker/Dockerfile
release:
  command:
    - ./deployment-tasks.sh
  image: worker
run:
  web: bundle exec puma -C config/puma.rb
  asset-syncer:
    command:
      - python asset-syncer.py
    image: worker
"#;
        let ir = parse_heroku_yml(&yml_ctx(), yaml).unwrap();
        assert_eq!(ir.dependencies[0].engine_hint, "postgres");
        assert!(ir.env_vars[0].has_literal_value);

        let web = ir.processes.iter().find(|p| p.name == "web").unwrap();
        assert_eq!(web.build, BuildSource::Dockerfile);
        assert_eq!(web.source_dir, "/");
        assert_eq!(web.kind, ProcessKind::Web);

        let syncer = ir.processes.iter().find(|p| p.name == "asset-syncer").unwrap();
        assert_eq!(syncer.source_dir, "/worker");
        assert_eq!(syncer.kind, ProcessKind::Worker);
        assert_eq!(syncer.command, "python asset-syncer.py");

        let worker = ir.processes.iter().find(|p| p.name == "worker").unwrap();
        assert!(worker.command.is_empty());
        assert_eq!(worker.dockerfile_path.as_deref(), Some("worker/Dockerfile"));

        let release = ir.processes.iter().find(|p| p.name == "release").unwrap();
        assert_eq!(release.kind, ProcessKind::Release);
        assert_eq!(release.source_dir, "/worker");
    }

    #[test]
    fn heroku_yml_unknown_image_is_an_error() {
        let yaml = "run:\n  web:\n    command: [\"serve\"]\n    image: nope\n";
        assert!(parse_heroku_yml(&yml_ctx(), yaml).is_err());
    }
}

#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn replat() -> Command {
    Command::cargo_bin("replat").unwrap()
}

fn repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let path = dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    dir
}

fn read_yaml(path: std::path::PathBuf) -> serde_yaml::Value {
    serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// replat migrate
// ---------------------------------------------------------------------------

#[test]
fn procfile_web_and_worker() {
    let dir = repo(&[
        ("Procfile", "web: gunicorn app:app\nworker: celery -A tasks worker\n"),
        ("requirements.txt", "flask\ncelery\n"),
    ]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .args(["--name", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source platform: Heroku"))
        .stdout(predicate::str::contains("0 need a decision"));

    let spec = read_yaml(dir.path().join(".do/app.yaml"));
    assert_eq!(spec["name"].as_str(), Some("shop-test"));
    let services = spec["services"].as_sequence().unwrap();
    let workers = spec["workers"].as_sequence().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(workers.len(), 1);
    assert_eq!(services[0]["name"].as_str(), Some("web"));
    assert_eq!(services[0]["run_command"].as_str(), Some("gunicorn app:app"));
    assert_eq!(workers[0]["run_command"].as_str(), Some("celery -A tasks worker"));
}

#[test]
fn compose_redis_becomes_managed_cache() {
    let dir = repo(&[(
        "docker-compose.yml",
        "services:\n  web:\n    build: .\n    ports: ['8000:8000']\n    environment:\n      REDIS_URL: redis://redis:6379\n  redis:\n    image: redis:7-alpine\n",
    )]);
    replat().arg("migrate").arg(dir.path()).assert().success();

    let spec = read_yaml(dir.path().join(".do/app.yaml"));
    let services = spec["services"].as_sequence().unwrap();
    assert_eq!(services.len(), 1, "redis must not become a component");
    let databases = spec["databases"].as_sequence().unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0]["engine"].as_str(), Some("VALKEY"));

    let report = std::fs::read_to_string(dir.path().join(".do/MIGRATION.md")).unwrap();
    assert!(report.contains("`dependency/cache/redis` → databases[] engine VALKEY"));
}

#[test]
fn unknown_addon_is_unmappable_and_exits_zero() {
    let dir = repo(&[
        ("Procfile", "web: node server.js\n"),
        ("package.json", "{}\n"),
        ("app.json", r#"{"name": "shop", "addons": ["heroku-postgresql", "papertrail"]}"#),
    ]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 unmappable"));

    let report = std::fs::read_to_string(dir.path().join(".do/MIGRATION.md")).unwrap();
    let unmappable = &report[report.find("## Unmappable").unwrap()..];
    assert!(unmappable.contains("### `dependency/other/papertrail`"));
    assert!(unmappable.contains("Workaround: "));

    let spec = std::fs::read_to_string(dir.path().join(".do/app.yaml")).unwrap();
    assert!(spec.contains("#   [unmappable] dependency/other/papertrail:"));
}

#[test]
fn conflicting_web_commands_fail() {
    let dir = repo(&[
        ("Procfile", "web: gunicorn app:app\n"),
        (
            "render.yaml",
            "services:\n  - type: web\n    name: web\n    runtime: python\n    startCommand: uvicorn main:app\n",
        ),
    ]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Procfile"))
        .stderr(predicate::str::contains("render.yaml"));
    assert!(!dir.path().join(".do").exists());
}

#[test]
fn override_resolves_needs_decision() {
    let dir = repo(&[
        ("Procfile", "web: bundle exec puma\n"),
        ("Gemfile", "source 'https://rubygems.org'\n"),
        ("app.json", r#"{"name": "shop", "addons": ["cloudamqp"]}"#),
    ]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 need a decision"));
    let report = std::fs::read_to_string(dir.path().join(".do/MIGRATION.md")).unwrap();
    assert!(report.contains("dependency/queue/rabbitmq: external_rabbitmq"));

    let overrides = dir.path().join("decisions.yaml");
    std::fs::write(&overrides, "decisions:\n  dependency/queue/rabbitmq: managed_kafka\n").unwrap();
    replat()
        .arg("migrate")
        .arg(dir.path())
        .arg("--overrides")
        .arg(&overrides)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 need a decision"));

    let spec = read_yaml(dir.path().join(".do/app.yaml"));
    let databases = spec["databases"].as_sequence().unwrap();
    assert!(databases.iter().any(|d| d["engine"].as_str() == Some("KAFKA")));
    let envs = spec["envs"].as_sequence().unwrap();
    let amqp = envs.iter().find(|e| e["key"].as_str() == Some("CLOUDAMQP_URL")).unwrap();
    assert_eq!(amqp["value"].as_str(), Some("${kafka.DATABASE_URL}"));
}

#[test]
fn platform_override_settles_tied_detection() {
    let dir = repo(&[
        ("Procfile", "web: gunicorn app:app\n"),
        (
            "render.yaml",
            "services:\n  - type: web\n    name: web\n    runtime: python\n    startCommand: uvicorn main:app\n",
        ),
    ]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("'platform: <heroku|render>'"));

    let overrides = dir.path().join("decisions.yaml");
    std::fs::write(&overrides, "decisions:\n  platform: render\n").unwrap();
    replat()
        .arg("migrate")
        .arg(dir.path())
        .arg("--overrides")
        .arg(&overrides)
        .assert()
        .success()
        .stdout(predicate::str::contains("Source platform: Render"));

    let spec = read_yaml(dir.path().join(".do/app.yaml"));
    assert_eq!(spec["services"][0]["run_command"].as_str(), Some("uvicorn main:app"));
    let report = std::fs::read_to_string(dir.path().join(".do/MIGRATION.md")).unwrap();
    assert!(report.contains("(override: `render`)"));
    assert!(report.contains("web (Procfile)"));
}

#[test]
fn local_dev_compose_file_does_not_conflict() {
    let dir = repo(&[
        ("Procfile", "web: gunicorn app:app\n"),
        ("requirements.txt", "flask\n"),
        (
            "docker-compose.yml",
            "services:\n  app:\n    build: .\n    ports: ['8000:8000']\n  db:\n    image: postgres:16\n",
        ),
    ]);
    replat().arg("migrate").arg(dir.path()).assert().success();

    let spec = read_yaml(dir.path().join(".do/app.yaml"));
    let services = spec["services"].as_sequence().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["run_command"].as_str(), Some("gunicorn app:app"));
    assert_eq!(spec["databases"][0]["engine"].as_str(), Some("PG"));
}

#[test]
fn override_with_unknown_option_fails() {
    let dir = repo(&[
        ("Procfile", "web: bundle exec puma\n"),
        ("app.json", r#"{"addons": ["cloudamqp"]}"#),
    ]);
    let overrides = dir.path().join("decisions.yaml");
    std::fs::write(&overrides, "decisions:\n  dependency/queue/rabbitmq: carrier_pigeon\n").unwrap();
    replat()
        .arg("migrate")
        .arg(dir.path())
        .arg("--overrides")
        .arg(&overrides)
        .assert()
        .failure()
        .stderr(predicate::str::contains("carrier_pigeon"));
}

#[test]
fn malformed_procfile_names_line() {
    let dir = repo(&[("Procfile", "web: gunicorn app:app\nthis line is wrong\n")]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Procfile:2"));
}

#[test]
fn unreadable_procfile_names_the_file() {
    let dir = repo(&[]);
    std::fs::write(dir.path().join("Procfile"), b"web: caf\xe9 start\n").unwrap();
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Procfile: cannot read file"));
}

#[test]
fn production_flags_and_json_summary() {
    let dir = repo(&[
        ("Procfile", "web: gunicorn app:app\n"),
        ("requirements.txt", "flask\n"),
    ]);
    let out = TempDir::new().unwrap();
    let output = replat()
        .arg("migrate")
        .arg(dir.path())
        .arg("--out")
        .arg(out.path())
        .args(["--name", "shop", "--env", "production", "--region", "fra"])
        .args(["--repo-url", "https://github.com/acme/shop.git", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["app_name"].as_str(), Some("shop-production"));
    assert_eq!(summary["region"].as_str(), Some("fra"));

    let spec = read_yaml(out.path().join("app.yaml"));
    let web = &spec["services"][0];
    assert_eq!(web["git"]["repo_clone_url"].as_str(), Some("https://github.com/acme/shop.git"));
    assert_eq!(web["autoscaling"]["max_instance_count"].as_u64(), Some(5));
    assert!(out.path().join("env-template.yaml").exists());

    let template = read_yaml(out.path().join("deploy.template.yaml"));
    let web = &template["spec"]["services"][0];
    assert_eq!(web["name"].as_str(), Some("web"));
    assert!(web["autoscaling"].is_null());
}

#[test]
fn invalid_region_in_config_fails() {
    let dir = repo(&[
        ("Procfile", "web: gunicorn app:app\n"),
        ("replat.yaml", "region: us-east\n"),
    ]);
    replat()
        .arg("migrate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown region 'us-east'"));
}

// ---------------------------------------------------------------------------
// replat detect / analyze / rules
// ---------------------------------------------------------------------------

#[test]
fn detect_lists_candidates() {
    let dir = repo(&[
        ("fly.toml", "app = \"shop\"\nprimary_region = \"iad\"\n"),
        ("Dockerfile", "FROM python:3.12\nEXPOSE 8080\n"),
    ]);
    replat()
        .arg("detect")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("fly"))
        .stdout(predicate::str::contains("high"));
}

#[test]
fn detect_json_flags_ambiguity() {
    let dir = repo(&[
        ("render.yaml", "services: []\n"),
        ("fly.toml", "app = \"shop\"\n"),
    ]);
    let output = replat().arg("detect").arg(dir.path()).arg("--json").output().unwrap();
    assert!(output.status.success());
    let detection: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(detection["leaders"].as_sequence().unwrap().len(), 2);
}

#[test]
fn analyze_prints_processes() {
    let dir = repo(&[("Procfile", "web: gunicorn app:app\nworker: celery -A tasks worker\n")]);
    replat()
        .arg("analyze")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("web"))
        .stdout(predicate::str::contains("worker"));
}

#[test]
fn analyze_prints_runtime_version() {
    let dir = repo(&[
        ("Procfile", "web: node server.js\n"),
        ("package.json", r#"{"engines": {"node": "20.x"}}"#),
    ]);
    replat()
        .arg("analyze")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Runtime: nodejs 20.x"));
}

#[test]
fn rules_lists_builtin_table() {
    replat()
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("rabbitmq"))
        .stdout(predicate::str::contains("needs_decision"));
}

#[test]
fn missing_repo_fails() {
    replat()
        .args(["migrate", "/nonexistent/replat-test-repo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/replat-test-repo"));
}

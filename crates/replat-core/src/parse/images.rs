//! Image-name → dependency inference.
//!
//! A container whose image is a well-known datastore is a dependency of the
//! application, not one of its processes. The table below is the complete
//! rule set; anything not listed stays a process.

use super::ParseContext;
use crate::model::DependencyRef;
use crate::types::DependencyCategory;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatastoreImage {
    /// Prefix matched against the last path segment of the image repository.
    pub prefix: &'static str,
    pub category: DependencyCategory,
    pub engine: &'static str,
}

const fn image(prefix: &'static str, category: DependencyCategory, engine: &'static str) -> DatastoreImage {
    DatastoreImage {
        prefix,
        category,
        engine,
    }
}

pub const DATASTORE_IMAGES: &[DatastoreImage] = &[
    image("postgres", DependencyCategory::Database, "postgres"),
    image("postgis", DependencyCategory::Database, "postgres"),
    image("timescaledb", DependencyCategory::Database, "postgres"),
    image("mysql", DependencyCategory::Database, "mysql"),
    image("mariadb", DependencyCategory::Database, "mysql"),
    image("mongo", DependencyCategory::Database, "mongodb"),
    image("redis", DependencyCategory::Cache, "redis"),
    image("keydb", DependencyCategory::Cache, "redis"),
    image("valkey", DependencyCategory::Cache, "valkey"),
    image("memcached", DependencyCategory::Cache, "memcached"),
    image("rabbitmq", DependencyCategory::Queue, "rabbitmq"),
    image("kafka", DependencyCategory::Queue, "kafka"),
    image("cp-kafka", DependencyCategory::Queue, "kafka"),
    image("elasticsearch", DependencyCategory::Search, "elasticsearch"),
    image("opensearch", DependencyCategory::Search, "opensearch"),
    image("minio", DependencyCategory::Storage, "s3"),
    image("mailhog", DependencyCategory::Email, "smtp"),
    image("mailpit", DependencyCategory::Email, "smtp"),
];

/// Compose service names that denote infrastructure whatever image or build
/// they use. Generic names get the engine `custom`, which no rule maps, so
/// the report asks about them instead of guessing an engine.
pub const INFRA_SERVICE_NAMES: &[(&str, DependencyCategory, &str)] = &[
    ("db", DependencyCategory::Database, "custom"),
    ("database", DependencyCategory::Database, "custom"),
    ("postgres", DependencyCategory::Database, "postgres"),
    ("postgresql", DependencyCategory::Database, "postgres"),
    ("mysql", DependencyCategory::Database, "mysql"),
    ("mariadb", DependencyCategory::Database, "mysql"),
    ("mongo", DependencyCategory::Database, "mongodb"),
    ("mongodb", DependencyCategory::Database, "mongodb"),
    ("redis", DependencyCategory::Cache, "redis"),
    ("cache", DependencyCategory::Cache, "custom"),
    ("memcached", DependencyCategory::Cache, "memcached"),
    ("rabbitmq", DependencyCategory::Queue, "rabbitmq"),
    ("kafka", DependencyCategory::Queue, "kafka"),
    ("elasticsearch", DependencyCategory::Search, "elasticsearch"),
    ("opensearch", DependencyCategory::Search, "opensearch"),
    ("minio", DependencyCategory::Storage, "s3"),
    ("localstack", DependencyCategory::Other, "localstack"),
];

/// Tools that share a datastore prefix but are not datastores.
const NOT_DATASTORES: &[&str] = &["-express", "-commander", "-exporter", "-insight", "-ui", "admin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMatch {
    pub category: DependencyCategory,
    pub engine: &'static str,
    pub version: Option<String>,
}

/// Split `registry/ns/repo:tag@digest` into (repository path, tag).
pub fn split_image(image: &str) -> (&str, Option<&str>) {
    let without_digest = image.split('@').next().unwrap_or(image);
    // A ':' after the last '/' separates the tag; earlier ones are registry ports.
    let last_slash = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);
    match without_digest[last_slash..].rfind(':') {
        Some(i) => {
            let at = last_slash + i;
            (&without_digest[..at], Some(&without_digest[at + 1..]))
        }
        None => (without_digest, None),
    }
}

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)*)").unwrap())
}

pub fn classify_image(image_ref: &str) -> Option<ImageMatch> {
    let (repo, tag) = split_image(image_ref.trim());
    let name = repo.rsplit('/').next().unwrap_or(repo).to_ascii_lowercase();
    if NOT_DATASTORES.iter().any(|s| name.contains(s)) {
        return None;
    }
    let hit = DATASTORE_IMAGES.iter().find(|d| name.starts_with(d.prefix))?;
    let version = tag
        .and_then(|t| version_re().captures(t))
        .map(|c| c[1].to_string());
    Some(ImageMatch {
        category: hit.category,
        engine: hit.engine,
        version,
    })
}

/// Dependency for a container named `source_name`, when its image is a datastore.
pub fn dependency_for(ctx: &ParseContext, source_name: &str, image_ref: &str) -> Option<DependencyRef> {
    let hit = classify_image(image_ref)?;
    Some(DependencyRef {
        category: hit.category,
        engine_hint: hit.engine.to_string(),
        source_name: source_name.to_string(),
        required_env_vars: conventional_env(hit.engine).iter().map(|k| k.to_string()).collect(),
        version: hit.version,
        origin: ctx.origin(),
    })
}

/// Dependency for a container whose service name marks it as
/// infrastructure, when its image alone did not.
pub fn dependency_for_service_name(
    ctx: &ParseContext,
    source_name: &str,
    image_ref: Option<&str>,
) -> Option<DependencyRef> {
    let lower = source_name.to_ascii_lowercase();
    let (_, category, engine) = INFRA_SERVICE_NAMES.iter().find(|(name, _, _)| *name == lower)?;
    let version = image_ref
        .and_then(|image| split_image(image.trim()).1)
        .and_then(|tag| version_re().captures(tag))
        .map(|c| c[1].to_string());
    Some(DependencyRef {
        category: *category,
        engine_hint: engine.to_string(),
        source_name: source_name.to_string(),
        required_env_vars: conventional_env(engine).iter().map(|k| k.to_string()).collect(),
        version,
        origin: ctx.origin(),
    })
}

/// Connection variables an application conventionally reads for `engine`.
pub fn conventional_env(engine: &str) -> &'static [&'static str] {
    match engine {
        "postgres" => &["DATABASE_URL"],
        "mysql" => &["MYSQL_URL"],
        "mongodb" => &["MONGODB_URI"],
        "redis" | "valkey" => &["REDIS_URL"],
        "memcached" => &["MEMCACHED_SERVERS"],
        "rabbitmq" => &["AMQP_URL"],
        "kafka" => &["KAFKA_URL"],
        "elasticsearch" => &["ELASTICSEARCH_URL"],
        "opensearch" => &["OPENSEARCH_URL"],
        "s3" => &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "S3_BUCKET"],
        "smtp" => &["SMTP_URL"],
        _ => &[],
    }
}

/// Registries App Platform can pull from directly.
pub fn is_pullable(image_ref: &str) -> bool {
    let (repo, _) = split_image(image_ref);
    match repo.split_once('/') {
        Some((host, _)) if host.contains('.') || host.contains(':') || host == "localhost" => {
            matches!(host, "docker.io" | "registry.digitalocean.com" | "ghcr.io")
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datastores_become_dependencies() {
        let m = classify_image("postgres:15-alpine").unwrap();
        assert_eq!(m.category, DependencyCategory::Database);
        assert_eq!(m.engine, "postgres");
        assert_eq!(m.version.as_deref(), Some("15"));

        let m = classify_image("bitnami/redis:7.2.4").unwrap();
        assert_eq!(m.category, DependencyCategory::Cache);
        assert_eq!(m.version.as_deref(), Some("7.2.4"));

        let m = classify_image("confluentinc/cp-kafka:7.6.0").unwrap();
        assert_eq!(m.engine, "kafka");

        let m = classify_image("minio/minio").unwrap();
        assert_eq!(m.category, DependencyCategory::Storage);
        assert_eq!(m.version, None);
    }

    #[test]
    fn admin_tools_are_not_datastores() {
        assert_eq!(classify_image("mongo-express:latest"), None);
        assert_eq!(classify_image("rediscommander/redis-commander"), None);
        assert_eq!(classify_image("nginx:1.27"), None);
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        assert_eq!(split_image("localhost:5000/app"), ("localhost:5000/app", None));
        assert_eq!(split_image("localhost:5000/app:v2"), ("localhost:5000/app", Some("v2")));
        assert_eq!(split_image("redis@sha256:abc"), ("redis", None));
    }

    #[test]
    fn pullable_registries() {
        assert!(is_pullable("nginx:1.27"));
        assert!(is_pullable("library/nginx"));
        assert!(is_pullable("ghcr.io/acme/api:1"));
        assert!(!is_pullable("123456789.dkr.ecr.us-east-1.amazonaws.com/api:latest"));
        assert!(!is_pullable("quay.io/acme/api"));
    }

    #[test]
    fn infrastructure_names_become_dependencies() {
        let ctx = ParseContext::new("docker-compose.yml", crate::types::SourceFormat::Compose);
        let dep = dependency_for_service_name(&ctx, "db", Some("acme/pg-custom:16")).unwrap();
        assert_eq!(dep.category, DependencyCategory::Database);
        assert_eq!(dep.engine_hint, "custom");
        assert_eq!(dep.version.as_deref(), Some("16"));

        let dep = dependency_for_service_name(&ctx, "Redis", None).unwrap();
        assert_eq!(dep.engine_hint, "redis");
        assert_eq!(dep.required_env_vars, vec!["REDIS_URL"]);

        assert_eq!(dependency_for_service_name(&ctx, "api", Some("postgres:16")), None);
    }

    #[test]
    fn conventional_env_names() {
        assert_eq!(conventional_env("postgres"), &["DATABASE_URL"]);
        assert!(conventional_env("unknown").is_empty());
    }
}

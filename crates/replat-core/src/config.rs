use crate::appspec::REGIONS;
use crate::error::{ReplatError, Result};
use crate::paths;
use crate::types::Environment;
use crate::validate::is_valid_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest name App Platform accepts for apps and components.
pub const MAX_NAME_LEN: usize = 32;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// InstanceSizes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSizes {
    pub service: String,
    pub worker: String,
    pub job: String,
}

impl InstanceSizes {
    fn test() -> Self {
        Self {
            service: "apps-s-1vcpu-1gb".to_string(),
            worker: "apps-s-1vcpu-0.5gb".to_string(),
            job: "apps-s-1vcpu-0.5gb".to_string(),
        }
    }

    fn production() -> Self {
        Self {
            service: "apps-d-1vcpu-2gb".to_string(),
            worker: "apps-d-1vcpu-1gb".to_string(),
            job: "apps-s-1vcpu-1gb".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSizeConfig {
    #[serde(default = "InstanceSizes::test")]
    pub test: InstanceSizes,
    #[serde(default = "InstanceSizes::production")]
    pub production: InstanceSizes,
}

impl Default for InstanceSizeConfig {
    fn default() -> Self {
        Self {
            test: InstanceSizes::test(),
            production: InstanceSizes::production(),
        }
    }
}

// ---------------------------------------------------------------------------
// MigrationConfig
// ---------------------------------------------------------------------------

/// Settings for one migration run, read from `replat.yaml` at the
/// repository root. Every field has a default, so the file is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    /// App Platform region slug; derived from the source when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub instance_sizes: InstanceSizeConfig,
    /// Extra rule file overlaid on the built-in table, relative to the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_parallel() -> bool {
    true
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            environment: Environment::default(),
            region: None,
            repo_url: None,
            branch: default_branch(),
            instance_sizes: InstanceSizeConfig::default(),
            rules_path: None,
            parallel: default_parallel(),
        }
    }
}

impl MigrationConfig {
    /// `replat.yaml` from the repository root, or defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| ReplatError::read(path.display().to_string(), e))?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data).map_err(|e| {
            let line = e.location().map(|l| l.line());
            ReplatError::parse(path.display().to_string(), line, format!("invalid config: {e}"))
        })
    }

    pub fn sizes(&self) -> &InstanceSizes {
        match self.environment {
            Environment::Test => &self.instance_sizes.test,
            Environment::Production => &self.instance_sizes.production,
        }
    }

    /// App name: configured, then hinted by the source, then the repository
    /// directory name. Always a valid App Platform name.
    pub fn resolve_app_name(&self, root: &Path, hint: Option<&str>) -> String {
        let dir_name = root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
        let raw = self
            .app_name
            .as_deref()
            .or(hint)
            .or(dir_name.as_deref())
            .unwrap_or("app");
        slugify(raw, MAX_NAME_LEN)
    }

    /// Rule overlay path, resolved against the repository root.
    pub fn rules_path_in(&self, root: &Path) -> Option<PathBuf> {
        self.rules_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Some(name) = &self.app_name {
            if !is_valid_name(name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "app_name '{name}' is not a valid App Platform name; '{}' will be used",
                        slugify(name, MAX_NAME_LEN)
                    ),
                });
            }
        }

        if let Some(region) = &self.region {
            if !REGIONS.contains(&region.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("unknown region '{region}' (expected one of {})", REGIONS.join(", ")),
                });
            }
        }

        if self.repo_url.is_some() && self.branch.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "repo_url is set but branch is empty".to_string(),
            });
        }

        for (env, sizes) in [("test", &self.instance_sizes.test), ("production", &self.instance_sizes.production)] {
            for (component, slug) in [("service", &sizes.service), ("worker", &sizes.worker), ("job", &sizes.job)] {
                if !slug.starts_with("apps-") {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("instance_sizes.{env}.{component} '{slug}' does not look like an App Platform size slug"),
                    });
                }
            }
        }

        warnings
    }
}

/// Lowercase, dash-separated, starting with a letter, at most `max_len` long.
pub fn slugify(raw: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_matches('-').to_string();
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        slug.insert_str(0, "app-");
    }
    slug.truncate(max_len);
    let slug = slug.trim_end_matches('-');
    if slug.len() < 2 {
        "app".to_string()
    } else {
        slug.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_file_absent() {
        let dir = TempDir::new().unwrap();
        let cfg = MigrationConfig::load(dir.path()).unwrap();
        assert_eq!(cfg, MigrationConfig::default());
        assert_eq!(cfg.branch, "main");
        assert!(cfg.parallel);
        assert_eq!(cfg.sizes().service, "apps-s-1vcpu-1gb");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("replat.yaml"),
            "app_name: shop\nenvironment: production\ninstance_sizes:\n  production:\n    service: apps-d-2vcpu-4gb\n    worker: apps-d-1vcpu-1gb\n    job: apps-s-1vcpu-1gb\n",
        )
        .unwrap();
        let cfg = MigrationConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.sizes().service, "apps-d-2vcpu-4gb");
        assert_eq!(cfg.instance_sizes.test, InstanceSizes::test());
        assert_eq!(cfg.branch, "main");
    }

    #[test]
    fn malformed_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replat.yaml");
        std::fs::write(&path, "environment: staging\n").unwrap();
        let err = MigrationConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ReplatError::Parse { .. }));
        assert!(err.to_string().contains("replat.yaml"));
    }

    #[test]
    fn app_name_resolution() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("My_Shop.v2");
        std::fs::create_dir(&root).unwrap();
        let cfg = MigrationConfig::default();
        assert_eq!(cfg.resolve_app_name(&root, None), "my-shop-v2");
        assert_eq!(cfg.resolve_app_name(&root, Some("storefront")), "storefront");
        let named = MigrationConfig {
            app_name: Some("Billing API".into()),
            ..Default::default()
        };
        assert_eq!(named.resolve_app_name(&root, Some("storefront")), "billing-api");
    }

    #[test]
    fn slugify_edge_cases() {
        assert_eq!(slugify("--Hello  World--", 32), "hello-world");
        assert_eq!(slugify("2048", 32), "app-2048");
        assert_eq!(slugify("!", 32), "app");
        assert_eq!(slugify("a-very-long-application-name-exceeding", 32).len(), 32);
        assert_eq!(slugify("abcdefghij-klm", 11), "abcdefghij");
    }

    #[test]
    fn validate_warnings() {
        let cfg = MigrationConfig {
            app_name: Some("Shop!".into()),
            region: Some("us-east".into()),
            ..Default::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert_eq!(warnings[1].level, WarnLevel::Error);
        assert!(MigrationConfig::default().validate().is_empty());
    }
}

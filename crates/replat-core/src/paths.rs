use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Repository constants
// ---------------------------------------------------------------------------

/// Directories never descended into while scanning a repository.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    ".next",
    "dist",
    "build",
    ".cache",
    "target",
];

/// Scan depth limit; indicator files deeper than this are not considered.
pub const MAX_SCAN_DEPTH: usize = 6;

pub const CONFIG_FILE: &str = "replat.yaml";

// ---------------------------------------------------------------------------
// Output artifacts
// ---------------------------------------------------------------------------

pub const OUTPUT_DIR: &str = ".do";
pub const APP_SPEC_FILE: &str = "app.yaml";
pub const ENV_TEMPLATE_FILE: &str = "env-template.yaml";
pub const REPORT_FILE: &str = "MIGRATION.md";
pub const DEPLOY_TEMPLATE_FILE: &str = "deploy.template.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn default_output_dir(root: &Path) -> PathBuf {
    root.join(OUTPUT_DIR)
}

pub fn app_spec_path(out_dir: &Path) -> PathBuf {
    out_dir.join(APP_SPEC_FILE)
}

pub fn env_template_path(out_dir: &Path) -> PathBuf {
    out_dir.join(ENV_TEMPLATE_FILE)
}

pub fn report_path(out_dir: &Path) -> PathBuf {
    out_dir.join(REPORT_FILE)
}

pub fn deploy_template_path(out_dir: &Path) -> PathBuf {
    out_dir.join(DEPLOY_TEMPLATE_FILE)
}

/// Repository-relative path with forward slashes, independent of host OS.
pub fn rel_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory of a repository-relative file, rendered the way component
/// `source_dir` values are written: `/` for the root, `/api` for `api/x`.
pub fn source_dir_of(rel_file: &str) -> String {
    match rel_file.rsplit_once('/') {
        Some((dir, _)) => format!("/{dir}"),
        None => "/".to_string(),
    }
}

/// Normalize a user-written directory (`.`, `./api`, `api/`) to `source_dir` form.
pub fn normalize_source_dir(dir: &str) -> String {
    let trimmed = dir
        .trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

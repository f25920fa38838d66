use crate::error::{ReplatError, Result};
use crate::model::MonorepoLayout;
use crate::paths::{self, MAX_SCAN_DEPTH, SKIP_DIRS};
use crate::types::{Runtime, SourceFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// A configuration file selected for parsing. Lives only until its parser
/// has produced a fragment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceFile {
    /// Repository-relative, forward slashes.
    pub path: String,
    pub format: SourceFormat,
}

// ---------------------------------------------------------------------------
// RepoScan
// ---------------------------------------------------------------------------

const FRONTEND_DIRS: &[&str] = &["frontend", "client", "web", "ui", "packages/frontend", "apps/web"];
const BACKEND_DIRS: &[&str] = &["backend", "server", "api", "packages/backend", "apps/api"];

static PYTHON_VERSION_RE: OnceLock<Regex> = OnceLock::new();
static GO_VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn python_version_re() -> &'static Regex {
    PYTHON_VERSION_RE.get_or_init(|| Regex::new(r#"python\s*=?\s*["']?[=><!~^]*\s*(\d+\.\d+)"#).unwrap())
}

fn go_version_re() -> &'static Regex {
    GO_VERSION_RE.get_or_init(|| Regex::new(r"(?m)^go\s+(\d+\.\d+)").unwrap())
}

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content).map(|c| c[1].to_string())
}

/// File and directory listing of a repository, taken once per run.
#[derive(Debug, Clone)]
pub struct RepoScan {
    root: PathBuf,
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
}

impl RepoScan {
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(ReplatError::RepoNotFound(root.to_path_buf()));
        }
        let mut scan = RepoScan {
            root: root.to_path_buf(),
            files: BTreeSet::new(),
            dirs: BTreeSet::new(),
        };
        scan.walk(root, 0)?;
        tracing::debug!(
            root = %root.display(),
            files = scan.files.len(),
            dirs = scan.dirs.len(),
            "scanned repository"
        );
        Ok(scan)
    }

    fn walk(&mut self, dir: &Path, depth: usize) -> Result<()> {
        if depth > MAX_SCAN_DEPTH {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if SKIP_DIRS.contains(&name.as_str()) {
                    continue;
                }
                self.dirs.insert(paths::rel_path(&self.root, &path));
                self.walk(&path, depth + 1)?;
            } else if file_type.is_file() {
                self.files.insert(paths::rel_path(&self.root, &path));
            }
        }
        Ok(())
    }

    /// Build a scan from an explicit listing; no filesystem access.
    pub fn from_listing<I, S>(root: &Path, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files: BTreeSet<String> = files.into_iter().map(Into::into).collect();
        let mut dirs = BTreeSet::new();
        for f in &files {
            let mut acc = String::new();
            let parts: Vec<&str> = f.split('/').collect();
            for part in &parts[..parts.len().saturating_sub(1)] {
                if !acc.is_empty() {
                    acc.push('/');
                }
                acc.push_str(part);
                dirs.insert(acc.clone());
            }
        }
        RepoScan {
            root: root.to_path_buf(),
            files,
            dirs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_file(&self, rel: &str) -> bool {
        self.files.contains(rel)
    }

    pub fn has_dir(&self, rel: &str) -> bool {
        self.dirs.contains(rel)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Every file the parsers know how to read, sorted by path.
    pub fn source_files(&self) -> Vec<SourceFile> {
        self.files
            .iter()
            .filter_map(|path| {
                SourceFormat::from_path(path).map(|format| SourceFile {
                    path: path.clone(),
                    format,
                })
            })
            .collect()
    }

    pub fn runtime(&self) -> Runtime {
        Runtime::markers()
            .iter()
            .find(|(marker, _)| self.has_file(marker))
            .map(|(_, runtime)| *runtime)
            .unwrap_or_default()
    }

    /// Runtime version pinned by the repository. Files that cannot be read
    /// or do not pin a version are skipped.
    pub fn runtime_version(&self, runtime: Runtime) -> Option<String> {
        let read = |rel: &str| {
            if !self.has_file(rel) {
                return None;
            }
            match std::fs::read_to_string(self.root.join(rel)) {
                Ok(content) => Some(content),
                Err(e) => {
                    tracing::debug!(path = rel, error = %e, "skipping version file");
                    None
                }
            }
        };
        let first_line = |content: String| {
            content
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
        };
        match runtime {
            Runtime::Nodejs => read("package.json")
                .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
                .and_then(|pkg| pkg["engines"]["node"].as_str().map(str::to_string))
                .or_else(|| read(".nvmrc").and_then(first_line))
                .or_else(|| read(".node-version").and_then(first_line)),
            Runtime::Python => read(".python-version")
                .and_then(first_line)
                .or_else(|| read("pyproject.toml").and_then(|c| capture(python_version_re(), &c))),
            Runtime::Go => read("go.mod").and_then(|c| capture(go_version_re(), &c)),
            _ => None,
        }
    }

    /// Frontend and backend directories, when the repository is laid out as
    /// a monorepo.
    pub fn monorepo_layout(&self) -> Option<MonorepoLayout> {
        let find = |dirs: &[&str]| {
            dirs.iter()
                .find(|dir| self.files().any(|f| f.starts_with(&format!("{dir}/"))))
                .map(|dir| format!("/{dir}"))
        };
        let layout = MonorepoLayout {
            frontend: find(FRONTEND_DIRS),
            backend: find(BACKEND_DIRS),
        };
        (layout.frontend.is_some() || layout.backend.is_some()).then_some(layout)
    }

    pub fn read(&self, file: &SourceFile) -> Result<String> {
        std::fs::read_to_string(self.root.join(&file.path)).map_err(|e| ReplatError::read(file.path.clone(), e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, rel: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn scan_skips_vendor_dirs() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "Procfile");
        touch(&dir, "node_modules/pkg/Procfile");
        touch(&dir, "api/Dockerfile");
        let scan = RepoScan::scan(dir.path()).unwrap();
        assert!(scan.has_file("Procfile"));
        assert!(scan.has_file("api/Dockerfile"));
        assert!(!scan.has_file("node_modules/pkg/Procfile"));
        assert!(scan.has_dir("api"));
    }

    #[test]
    fn scan_missing_root_errors() {
        let dir = TempDir::new().unwrap();
        let err = RepoScan::scan(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ReplatError::RepoNotFound(_)));
    }

    #[test]
    fn source_files_are_recognized_and_sorted() {
        let scan = RepoScan::from_listing(
            Path::new("/repo"),
            ["README.md", "docker-compose.yml", "Procfile", "api/Dockerfile"],
        );
        let files = scan.source_files();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["Procfile", "api/Dockerfile", "docker-compose.yml"]);
    }

    #[test]
    fn runtime_from_markers() {
        let scan = RepoScan::from_listing(Path::new("/repo"), ["requirements.txt", "Procfile"]);
        assert_eq!(scan.runtime(), Runtime::Python);
        let scan = RepoScan::from_listing(Path::new("/repo"), ["Procfile"]);
        assert_eq!(scan.runtime(), Runtime::Unknown);
    }

    #[test]
    fn unreadable_file_names_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Procfile"), b"web: caf\xe9 start\n").unwrap();
        let scan = RepoScan::scan(dir.path()).unwrap();
        let file = SourceFile {
            path: "Procfile".into(),
            format: SourceFormat::Procfile,
        };
        let err = scan.read(&file).unwrap_err();
        assert!(matches!(err, ReplatError::Read { ref path, .. } if path == "Procfile"));
        assert!(err.to_string().starts_with("Procfile: cannot read file"));
    }

    #[test]
    fn runtime_version_from_pins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"engines": {"node": "20.x"}}"#).unwrap();
        std::fs::write(dir.path().join(".nvmrc"), "18\n").unwrap();
        let scan = RepoScan::scan(dir.path()).unwrap();
        assert_eq!(scan.runtime_version(Runtime::Nodejs).as_deref(), Some("20.x"));

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".nvmrc"), "v18.19.0\n").unwrap();
        let scan = RepoScan::scan(dir.path()).unwrap();
        assert_eq!(scan.runtime_version(Runtime::Nodejs).as_deref(), Some("v18.19.0"));

        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nname = \"shop\"\nrequires-python = \">=3.11\"\n",
        )
        .unwrap();
        let scan = RepoScan::scan(dir.path()).unwrap();
        assert_eq!(scan.runtime_version(Runtime::Python).as_deref(), Some("3.11"));
        std::fs::write(dir.path().join(".python-version"), "3.12.4\n").unwrap();
        let scan = RepoScan::scan(dir.path()).unwrap();
        assert_eq!(scan.runtime_version(Runtime::Python).as_deref(), Some("3.12.4"));

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/shop\n\ngo 1.22\n").unwrap();
        let scan = RepoScan::scan(dir.path()).unwrap();
        assert_eq!(scan.runtime_version(Runtime::Go).as_deref(), Some("1.22"));
        assert_eq!(scan.runtime_version(Runtime::Ruby), None);
    }

    #[test]
    fn monorepo_layout_from_dirs() {
        let scan = RepoScan::from_listing(
            Path::new("/repo"),
            ["frontend/package.json", "api/main.go", "README.md"],
        );
        let layout = scan.monorepo_layout().unwrap();
        assert_eq!(layout.frontend.as_deref(), Some("/frontend"));
        assert_eq!(layout.backend.as_deref(), Some("/api"));

        let scan = RepoScan::from_listing(Path::new("/repo"), ["Procfile", "app.py"]);
        assert_eq!(scan.monorepo_layout(), None);
    }

    #[test]
    fn listing_derives_dirs() {
        let scan = RepoScan::from_listing(Path::new("/repo"), [".elasticbeanstalk/config.yml"]);
        assert!(scan.has_dir(".elasticbeanstalk"));
    }
}

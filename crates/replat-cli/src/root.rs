use std::path::{Path, PathBuf};

/// Resolve the repository to analyze.
///
/// Priority:
/// 1. The path given on the command line
/// 2. Walk upward from `cwd` looking for `.git/`
/// 3. Fall back to `cwd`
pub fn resolve_repo(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut dir = cwd.clone();
    loop {
        if dir.join(".git").is_dir() {
            return dir;
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }

    cwd
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_repo_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_repo(Some(dir.path())), dir.path());
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplatError {
    #[error("repository not found: {} (pass an existing directory)", .0.display())]
    RepoNotFound(PathBuf),

    #[error("{}: {message} (fix the file and re-run)", location(.path, .line))]
    Parse {
        path: String,
        line: Option<usize>,
        message: String,
    },

    #[error("ambiguous architecture: {message} [sources: {}] (make the sources agree or remove the stale one)", .sources.join(", "))]
    Normalization {
        message: String,
        sources: Vec<String>,
    },

    #[error("internal mapping fault: {0}")]
    MappingFault(String),

    #[error("invalid rule table {source_name}: {message}")]
    RuleTable {
        source_name: String,
        message: String,
    },

    #[error("override for '{element}' names unknown option '{option}' (valid options: {})", .valid.join(", "))]
    InvalidOverride {
        element: String,
        option: String,
        valid: Vec<String>,
    },

    #[error("override names unknown element '{0}' (run 'replat analyze' to list element ids)")]
    UnknownElement(String),

    #[error("invalid element id '{0}': expected platform, process/<name>, dependency/<category>/<engine>, env/<KEY> or schedule/<name>")]
    InvalidElementId(String),

    #[error("generated app spec failed validation:\n  {}", .diagnostics.join("\n  "))]
    SpecValidation { diagnostics: Vec<String> },

    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("invalid environment '{0}': must be 'test' or 'production'")]
    InvalidEnvironment(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("{path}: cannot read file: {source} (check the file is readable UTF-8 text)")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn location(path: &str, line: &Option<usize>) -> String {
    match line {
        Some(n) => format!("{path}:{n}"),
        None => path.to_string(),
    }
}

impl ReplatError {
    pub fn parse(path: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        ReplatError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn read(path: impl Into<String>, source: std::io::Error) -> Self {
        ReplatError::Read {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the repository under analysis rather than
    /// by the engine itself.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ReplatError::MappingFault(_))
    }
}

pub type Result<T> = std::result::Result<T, ReplatError>;

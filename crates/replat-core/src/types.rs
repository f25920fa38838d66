use crate::error::ReplatError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PlatformId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformId {
    Heroku,
    Render,
    Railway,
    Fly,
    DockerCompose,
    AwsEcs,
    AwsApprunner,
    AwsBeanstalk,
    /// Fallback when nothing more specific than a Dockerfile is present.
    Dockerfile,
}

impl PlatformId {
    pub fn all() -> &'static [PlatformId] {
        &[
            PlatformId::Heroku,
            PlatformId::Render,
            PlatformId::Railway,
            PlatformId::Fly,
            PlatformId::DockerCompose,
            PlatformId::AwsEcs,
            PlatformId::AwsApprunner,
            PlatformId::AwsBeanstalk,
            PlatformId::Dockerfile,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlatformId::Heroku => "heroku",
            PlatformId::Render => "render",
            PlatformId::Railway => "railway",
            PlatformId::Fly => "fly",
            PlatformId::DockerCompose => "docker_compose",
            PlatformId::AwsEcs => "aws_ecs",
            PlatformId::AwsApprunner => "aws_apprunner",
            PlatformId::AwsBeanstalk => "aws_beanstalk",
            PlatformId::Dockerfile => "dockerfile",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PlatformId::Heroku => "Heroku",
            PlatformId::Render => "Render",
            PlatformId::Railway => "Railway",
            PlatformId::Fly => "Fly.io",
            PlatformId::DockerCompose => "Docker Compose",
            PlatformId::AwsEcs => "AWS ECS",
            PlatformId::AwsApprunner => "AWS App Runner",
            PlatformId::AwsBeanstalk => "AWS Elastic Beanstalk",
            PlatformId::Dockerfile => "Dockerfile only",
        }
    }

    /// Port a web process listens on when neither the source file nor the
    /// Dockerfile nor the runtime says otherwise.
    pub fn default_web_port(self) -> u16 {
        match self {
            PlatformId::Heroku => 5000,
            PlatformId::Render => 10000,
            PlatformId::AwsEcs | PlatformId::AwsBeanstalk => 80,
            _ => 8080,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformId {
    type Err = ReplatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlatformId::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ReplatError::InvalidPlatform(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// SourceFormat
// ---------------------------------------------------------------------------

/// Every configuration format the source readers recognize. The detector
/// picks the format once per file; later stages never re-infer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Procfile,
    AppJson,
    HerokuYml,
    RenderYaml,
    RailwayJson,
    RailwayToml,
    FlyToml,
    Compose,
    EcsTaskDefinition,
    AppRunnerYaml,
    Dockerrun,
    Dockerfile,
    EnvTemplate,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Procfile => "procfile",
            SourceFormat::AppJson => "app_json",
            SourceFormat::HerokuYml => "heroku_yml",
            SourceFormat::RenderYaml => "render_yaml",
            SourceFormat::RailwayJson => "railway_json",
            SourceFormat::RailwayToml => "railway_toml",
            SourceFormat::FlyToml => "fly_toml",
            SourceFormat::Compose => "compose",
            SourceFormat::EcsTaskDefinition => "ecs_task_definition",
            SourceFormat::AppRunnerYaml => "apprunner_yaml",
            SourceFormat::Dockerrun => "dockerrun",
            SourceFormat::Dockerfile => "dockerfile",
            SourceFormat::EnvTemplate => "env_template",
        }
    }

    /// The platform a file of this format is evidence for. Env templates
    /// are platform-neutral.
    pub fn platform(self) -> Option<PlatformId> {
        match self {
            SourceFormat::Procfile | SourceFormat::AppJson | SourceFormat::HerokuYml => {
                Some(PlatformId::Heroku)
            }
            SourceFormat::RenderYaml => Some(PlatformId::Render),
            SourceFormat::RailwayJson | SourceFormat::RailwayToml => Some(PlatformId::Railway),
            SourceFormat::FlyToml => Some(PlatformId::Fly),
            SourceFormat::Compose => Some(PlatformId::DockerCompose),
            SourceFormat::EcsTaskDefinition => Some(PlatformId::AwsEcs),
            SourceFormat::AppRunnerYaml => Some(PlatformId::AwsApprunner),
            SourceFormat::Dockerrun => Some(PlatformId::AwsBeanstalk),
            SourceFormat::Dockerfile => Some(PlatformId::Dockerfile),
            SourceFormat::EnvTemplate => None,
        }
    }

    /// Resolve a repository-relative path to its format, if it is one we read.
    pub fn from_path(rel_path: &str) -> Option<SourceFormat> {
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        let at_root = !rel_path.contains('/');
        match file_name {
            "Dockerfile" => Some(SourceFormat::Dockerfile),
            "task-definition.json" | "ecs-task-definition.json" => {
                Some(SourceFormat::EcsTaskDefinition)
            }
            _ if !at_root => None,
            "Procfile" => Some(SourceFormat::Procfile),
            "app.json" => Some(SourceFormat::AppJson),
            "heroku.yml" => Some(SourceFormat::HerokuYml),
            "render.yaml" | "render.yml" => Some(SourceFormat::RenderYaml),
            "railway.json" => Some(SourceFormat::RailwayJson),
            "railway.toml" => Some(SourceFormat::RailwayToml),
            "fly.toml" => Some(SourceFormat::FlyToml),
            "docker-compose.yml" | "docker-compose.yaml" | "compose.yml" | "compose.yaml" => {
                Some(SourceFormat::Compose)
            }
            "apprunner.yaml" | "apprunner.yml" => Some(SourceFormat::AppRunnerYaml),
            "Dockerrun.aws.json" => Some(SourceFormat::Dockerrun),
            ".env.example" | ".env.sample" | ".env.template" | "env.example" => {
                Some(SourceFormat::EnvTemplate)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProcessKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    Web,
    Worker,
    Release,
    Scheduled,
    Static,
}

impl ProcessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessKind::Web => "web",
            ProcessKind::Worker => "worker",
            ProcessKind::Release => "release",
            ProcessKind::Scheduled => "scheduled",
            ProcessKind::Static => "static",
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DependencyCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCategory {
    Database,
    Cache,
    Queue,
    Search,
    Storage,
    Email,
    /// Add-ons we recognize as attached but cannot categorize.
    Other,
}

impl DependencyCategory {
    pub fn all() -> &'static [DependencyCategory] {
        &[
            DependencyCategory::Database,
            DependencyCategory::Cache,
            DependencyCategory::Queue,
            DependencyCategory::Search,
            DependencyCategory::Storage,
            DependencyCategory::Email,
            DependencyCategory::Other,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyCategory::Database => "database",
            DependencyCategory::Cache => "cache",
            DependencyCategory::Queue => "queue",
            DependencyCategory::Search => "search",
            DependencyCategory::Storage => "storage",
            DependencyCategory::Email => "email",
            DependencyCategory::Other => "other",
        }
    }
}

impl fmt::Display for DependencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DependencyCategory {
    type Err = ReplatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DependencyCategory::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ReplatError::InvalidCategory(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Mapped,
    NeedsDecision,
    Unmappable,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Mapped => "mapped",
            Classification::NeedsDecision => "needs_decision",
            Classification::Unmappable => "unmappable",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BuildSource
// ---------------------------------------------------------------------------

/// How a process component gets its runnable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSource {
    Dockerfile,
    Buildpack,
    /// Prebuilt image on a registry the target can pull from.
    Image,
    /// Prebuilt image on a registry the target cannot pull from (ECR, quay, ...).
    ForeignImage,
}

impl BuildSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildSource::Dockerfile => "dockerfile",
            BuildSource::Buildpack => "buildpack",
            BuildSource::Image => "image",
            BuildSource::ForeignImage => "foreign_image",
        }
    }
}

impl fmt::Display for BuildSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    Nodejs,
    Python,
    Go,
    Ruby,
    Php,
    Java,
    Elixir,
    #[default]
    Unknown,
}

impl Runtime {
    /// Marker files checked in order; the first hit wins.
    pub fn markers() -> &'static [(&'static str, Runtime)] {
        &[
            ("package.json", Runtime::Nodejs),
            ("requirements.txt", Runtime::Python),
            ("Pipfile", Runtime::Python),
            ("pyproject.toml", Runtime::Python),
            ("setup.py", Runtime::Python),
            ("go.mod", Runtime::Go),
            ("Gemfile", Runtime::Ruby),
            ("composer.json", Runtime::Php),
            ("pom.xml", Runtime::Java),
            ("build.gradle", Runtime::Java),
            ("build.gradle.kts", Runtime::Java),
            ("mix.exs", Runtime::Elixir),
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Nodejs => "nodejs",
            Runtime::Python => "python",
            Runtime::Go => "go",
            Runtime::Ruby => "ruby",
            Runtime::Php => "php",
            Runtime::Java => "java",
            Runtime::Elixir => "elixir",
            Runtime::Unknown => "unknown",
        }
    }

    pub fn default_port(self) -> Option<u16> {
        match self {
            Runtime::Nodejs | Runtime::Ruby => Some(3000),
            Runtime::Python => Some(8000),
            Runtime::Go | Runtime::Php | Runtime::Java | Runtime::Elixir => Some(8080),
            Runtime::Unknown => None,
        }
    }

    /// App Platform buildpack slug, when one exists for this runtime.
    pub fn environment_slug(self) -> Option<&'static str> {
        match self {
            Runtime::Nodejs => Some("node-js"),
            Runtime::Python => Some("python"),
            Runtime::Go => Some("go"),
            Runtime::Ruby => Some("ruby"),
            Runtime::Php => Some("php"),
            Runtime::Java => Some("java"),
            Runtime::Elixir | Runtime::Unknown => None,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = ReplatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ReplatError::InvalidEnvironment(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

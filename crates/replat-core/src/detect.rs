//! Platform detection from indicator files.
//!
//! Each platform owns a set of weighted indicators. Confidence is the sum
//! of the weights of the indicators present. The ranking never comes back
//! empty: a repository with no indicators at all yields the Dockerfile-only
//! platform at confidence 0.

use crate::error::Result;
use crate::source::{RepoScan, SourceFile};
use crate::types::PlatformId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Indicator table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMatch {
    /// File at the repository root.
    RootFile(&'static str),
    /// File with this name in any scanned directory.
    AnyDepthFile(&'static str),
    /// Directory at the repository root.
    RootDir(&'static str),
}

impl IndicatorMatch {
    pub fn label(self) -> &'static str {
        match self {
            IndicatorMatch::RootFile(n)
            | IndicatorMatch::AnyDepthFile(n)
            | IndicatorMatch::RootDir(n) => n,
        }
    }

    fn find(self, scan: &RepoScan) -> Vec<String> {
        match self {
            IndicatorMatch::RootFile(name) => {
                if scan.has_file(name) {
                    vec![name.to_string()]
                } else {
                    Vec::new()
                }
            }
            IndicatorMatch::AnyDepthFile(name) => scan
                .files()
                .filter(|f| f.rsplit('/').next() == Some(name))
                .map(str::to_string)
                .collect(),
            IndicatorMatch::RootDir(name) => {
                if scan.has_dir(name) {
                    vec![format!("{name}/")]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub matcher: IndicatorMatch,
    /// 3 = exclusive to the platform, 2 = shared format, 1 = generic.
    pub weight: u32,
}

const fn ind(matcher: IndicatorMatch, weight: u32) -> Indicator {
    Indicator { matcher, weight }
}

#[derive(Debug, Clone)]
pub struct PlatformIndicators {
    pub platform: PlatformId,
    pub indicators: Vec<Indicator>,
}

/// Priority-ordered indicator table. Table order breaks nothing by itself;
/// it only orders candidates of differing confidence deterministically.
pub fn default_table() -> Vec<PlatformIndicators> {
    use IndicatorMatch::*;
    let entry = |platform, indicators: &[Indicator]| PlatformIndicators {
        platform,
        indicators: indicators.to_vec(),
    };
    vec![
        entry(
            PlatformId::Heroku,
            &[
                ind(RootFile("Procfile"), 3),
                ind(RootFile("heroku.yml"), 3),
                ind(RootFile("app.json"), 2),
            ],
        ),
        entry(
            PlatformId::Render,
            &[ind(RootFile("render.yaml"), 3), ind(RootFile("render.yml"), 3)],
        ),
        entry(
            PlatformId::Railway,
            &[ind(RootFile("railway.json"), 3), ind(RootFile("railway.toml"), 3)],
        ),
        entry(PlatformId::Fly, &[ind(RootFile("fly.toml"), 3)]),
        entry(
            PlatformId::DockerCompose,
            &[
                ind(RootFile("docker-compose.yml"), 2),
                ind(RootFile("docker-compose.yaml"), 2),
                ind(RootFile("compose.yml"), 2),
                ind(RootFile("compose.yaml"), 2),
            ],
        ),
        entry(
            PlatformId::AwsEcs,
            &[
                ind(AnyDepthFile("task-definition.json"), 3),
                ind(AnyDepthFile("ecs-task-definition.json"), 3),
            ],
        ),
        entry(
            PlatformId::AwsApprunner,
            &[ind(RootFile("apprunner.yaml"), 3), ind(RootFile("apprunner.yml"), 3)],
        ),
        entry(
            PlatformId::AwsBeanstalk,
            &[
                ind(RootFile("Dockerrun.aws.json"), 3),
                ind(RootDir(".elasticbeanstalk"), 3),
            ],
        ),
        entry(PlatformId::Dockerfile, &[ind(RootFile("Dockerfile"), 1)]),
    ]
}

// ---------------------------------------------------------------------------
// Detection result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0 => ConfidenceLevel::None,
            1 => ConfidenceLevel::Low,
            2 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::None => "none",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub platform: PlatformId,
    pub confidence: u32,
    pub level: ConfidenceLevel,
    /// Indicator labels that matched (e.g. `Procfile`, `.elasticbeanstalk`).
    pub indicators: Vec<String>,
    /// Repository paths that matched.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Ranked, never empty.
    pub candidates: Vec<Candidate>,
    /// Platforms tied for first place after the superset rule. One entry
    /// when the detection is unambiguous.
    pub leaders: Vec<PlatformId>,
}

impl Detection {
    pub fn primary(&self) -> &Candidate {
        &self.candidates[0]
    }

    pub fn is_ambiguous(&self) -> bool {
        self.leaders.len() > 1
    }

    pub fn rank_of(&self, platform: PlatformId) -> usize {
        self.candidates
            .iter()
            .position(|c| c.platform == platform)
            .unwrap_or(self.candidates.len())
    }

    /// Files to parse, ordered by the rank of the platform they are
    /// evidence for, then by path. Platform-neutral files go last.
    pub fn source_files(&self, scan: &RepoScan) -> Vec<SourceFile> {
        let mut files = scan.source_files();
        files.sort_by_key(|f| {
            let rank = f
                .format
                .platform()
                .map(|p| self.rank_of(p))
                .unwrap_or(usize::MAX);
            (rank, f.path.clone())
        });
        files
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

pub struct Detector {
    table: Vec<PlatformIndicators>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::with_table(default_table())
    }
}

impl Detector {
    pub fn with_table(table: Vec<PlatformIndicators>) -> Self {
        Self { table }
    }

    pub fn detect(&self, scan: &RepoScan) -> Detection {
        let mut candidates: Vec<(usize, Candidate)> = Vec::new();
        for (order, entry) in self.table.iter().enumerate() {
            let mut confidence = 0;
            let mut indicators = Vec::new();
            let mut files = Vec::new();
            for indicator in &entry.indicators {
                let found = indicator.matcher.find(scan);
                if !found.is_empty() {
                    confidence += indicator.weight;
                    indicators.push(indicator.matcher.label().to_string());
                    files.extend(found);
                }
            }
            if !indicators.is_empty() {
                candidates.push((
                    order,
                    Candidate {
                        platform: entry.platform,
                        confidence,
                        level: ConfidenceLevel::from_score(confidence),
                        indicators,
                        files,
                    },
                ));
            }
        }

        if candidates.is_empty() {
            tracing::debug!("no platform indicators found, falling back to dockerfile");
            return Detection {
                candidates: vec![Candidate {
                    platform: PlatformId::Dockerfile,
                    confidence: 0,
                    level: ConfidenceLevel::None,
                    indicators: Vec::new(),
                    files: Vec::new(),
                }],
                leaders: vec![PlatformId::Dockerfile],
            };
        }

        candidates.sort_by(|(oa, a), (ob, b)| b.confidence.cmp(&a.confidence).then(oa.cmp(ob)));
        let candidates: Vec<Candidate> = candidates.into_iter().map(|(_, c)| c).collect();
        let leaders = leaders(&candidates);
        let mut ranked = candidates;
        // Superset winners move ahead of the tied candidates they beat.
        ranked.sort_by_key(|c| {
            let lead = leaders.iter().position(|p| *p == c.platform);
            (std::cmp::Reverse(c.confidence), lead.is_none(), lead)
        });

        tracing::debug!(
            primary = %ranked[0].platform,
            confidence = ranked[0].confidence,
            ambiguous = leaders.len() > 1,
            "platform detected"
        );
        Detection {
            candidates: ranked,
            leaders,
        }
    }
}

/// Top tie group, minus every candidate whose indicator set is a strict
/// subset of another tied candidate's.
fn leaders(ranked: &[Candidate]) -> Vec<PlatformId> {
    let top = ranked[0].confidence;
    let tied: Vec<&Candidate> = ranked.iter().filter(|c| c.confidence == top).collect();
    let sets: Vec<BTreeSet<&str>> = tied
        .iter()
        .map(|c| c.indicators.iter().map(String::as_str).collect())
        .collect();
    tied.iter()
        .enumerate()
        .filter(|(i, _)| {
            !sets
                .iter()
                .enumerate()
                .any(|(j, other)| j != *i && sets[*i].is_subset(other) && sets[*i] != *other)
        })
        .map(|(_, c)| c.platform)
        .collect()
}

/// Scan `root` and detect its platform.
pub fn detect_repo(root: &Path) -> Result<(RepoScan, Detection)> {
    let scan = RepoScan::scan(root)?;
    let detection = Detector::default().detect(&scan);
    Ok((scan, detection))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(files: &[&str]) -> RepoScan {
        RepoScan::from_listing(Path::new("/repo"), files.iter().copied())
    }

    #[test]
    fn procfile_only_is_heroku_high() {
        let d = Detector::default().detect(&scan(&["Procfile", "app.py"]));
        assert_eq!(d.primary().platform, PlatformId::Heroku);
        assert_eq!(d.primary().level, ConfidenceLevel::High);
        assert!(!d.is_ambiguous());
    }

    #[test]
    fn empty_repo_falls_back_to_dockerfile_zero() {
        let d = Detector::default().detect(&scan(&["README.md"]));
        assert_eq!(d.candidates.len(), 1);
        assert_eq!(d.primary().platform, PlatformId::Dockerfile);
        assert_eq!(d.primary().confidence, 0);
        assert_eq!(d.leaders, vec![PlatformId::Dockerfile]);
    }

    #[test]
    fn dockerfile_only_is_never_empty() {
        let d = Detector::default().detect(&scan(&["Dockerfile"]));
        assert_eq!(d.primary().platform, PlatformId::Dockerfile);
        assert_eq!(d.primary().confidence, 1);
    }

    #[test]
    fn weights_accumulate() {
        let d = Detector::default().detect(&scan(&["Procfile", "app.json", "Dockerfile"]));
        assert_eq!(d.primary().platform, PlatformId::Heroku);
        assert_eq!(d.primary().confidence, 5);
        assert_eq!(d.candidates[1].platform, PlatformId::Dockerfile);
    }

    #[test]
    fn equal_exclusive_indicators_are_ambiguous() {
        let d = Detector::default().detect(&scan(&["render.yaml", "fly.toml"]));
        assert!(d.is_ambiguous());
        assert_eq!(d.leaders, vec![PlatformId::Render, PlatformId::Fly]);
    }

    #[test]
    fn strict_superset_wins_tie() {
        use IndicatorMatch::*;
        let table = vec![
            PlatformIndicators {
                platform: PlatformId::Render,
                indicators: vec![ind(RootFile("Procfile"), 2)],
            },
            PlatformIndicators {
                platform: PlatformId::Heroku,
                indicators: vec![ind(RootFile("Procfile"), 2), ind(RootFile("Dockerfile"), 0)],
            },
        ];
        let d = Detector::with_table(table).detect(&scan(&["Procfile", "Dockerfile"]));
        assert!(!d.is_ambiguous());
        assert_eq!(d.leaders, vec![PlatformId::Heroku]);
        assert_eq!(d.primary().platform, PlatformId::Heroku);
    }

    #[test]
    fn ecs_task_definition_found_at_depth() {
        let d = Detector::default().detect(&scan(&["deploy/ecs/task-definition.json"]));
        assert_eq!(d.primary().platform, PlatformId::AwsEcs);
        assert_eq!(d.primary().files, vec!["deploy/ecs/task-definition.json"]);
    }

    #[test]
    fn beanstalk_dir_indicator() {
        let d = Detector::default().detect(&scan(&[".elasticbeanstalk/config.yml"]));
        assert_eq!(d.primary().platform, PlatformId::AwsBeanstalk);
        assert_eq!(d.primary().files, vec![".elasticbeanstalk/"]);
    }

    #[test]
    fn source_files_follow_rank() {
        let s = scan(&["Dockerfile", "docker-compose.yml", "Procfile", ".env.example"]);
        let d = Detector::default().detect(&s);
        let files: Vec<String> = d.source_files(&s).into_iter().map(|f| f.path).collect();
        assert_eq!(files, vec!["Procfile", "docker-compose.yml", "Dockerfile", ".env.example"]);
    }
}

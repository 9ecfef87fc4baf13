//! Adaptive threshold profiles.
//!
//! Before Phase 1 the engine inspects the repository's package manifests
//! to pick a `(language, domain)` profile. Profiles only move the level
//! thresholds; they never change engine behavior. The choice and reason
//! are logged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::models::RiskLevel;

/// Level boundaries for one metric: value ≥ boundary ⇒ at least that
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Thresholds {
    pub fn level_for(&self, value: f64) -> RiskLevel {
        if value >= self.critical {
            RiskLevel::Critical
        } else if value >= self.high {
            RiskLevel::High
        } else if value >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdProfile {
    /// "rust", "go", "javascript", "python", "java" or "*".
    pub language: &'static str,
    /// "web", "cli", or "*".
    pub domain: &'static str,
    /// On the raw structural-neighbor count.
    pub coupling: Thresholds,
    /// On the maximum co-change frequency.
    pub co_change: Thresholds,
    /// On the incident count in the rolling window.
    pub incidents: Thresholds,
}

const DEFAULT_PROFILE: ThresholdProfile = ThresholdProfile {
    language: "*",
    domain: "*",
    coupling: Thresholds {
        medium: 10.0,
        high: 20.0,
        critical: 40.0,
    },
    co_change: Thresholds {
        medium: 0.3,
        high: 0.6,
        critical: 0.85,
    },
    incidents: Thresholds {
        medium: 2.0,
        high: 5.0,
        critical: 10.0,
    },
};

/// Web services accumulate incidents faster, so the incident bar sits
/// higher; heavily-imported hub modules are normal in JS bundles.
const PROFILES: &[ThresholdProfile] = &[
    ThresholdProfile {
        language: "javascript",
        domain: "web",
        coupling: Thresholds {
            medium: 15.0,
            high: 30.0,
            critical: 60.0,
        },
        co_change: Thresholds {
            medium: 0.3,
            high: 0.6,
            critical: 0.85,
        },
        incidents: Thresholds {
            medium: 3.0,
            high: 7.0,
            critical: 14.0,
        },
    },
    ThresholdProfile {
        language: "go",
        domain: "web",
        coupling: Thresholds {
            medium: 10.0,
            high: 20.0,
            critical: 40.0,
        },
        co_change: Thresholds {
            medium: 0.3,
            high: 0.6,
            critical: 0.85,
        },
        incidents: Thresholds {
            medium: 3.0,
            high: 6.0,
            critical: 12.0,
        },
    },
    ThresholdProfile {
        language: "rust",
        domain: "*",
        coupling: Thresholds {
            medium: 12.0,
            high: 24.0,
            critical: 48.0,
        },
        co_change: Thresholds {
            medium: 0.3,
            high: 0.6,
            critical: 0.85,
        },
        incidents: Thresholds {
            medium: 2.0,
            high: 5.0,
            critical: 10.0,
        },
    },
    ThresholdProfile {
        language: "python",
        domain: "cli",
        coupling: Thresholds {
            medium: 8.0,
            high: 16.0,
            critical: 32.0,
        },
        co_change: Thresholds {
            medium: 0.3,
            high: 0.6,
            critical: 0.85,
        },
        incidents: Thresholds {
            medium: 2.0,
            high: 5.0,
            critical: 10.0,
        },
    },
];

/// Detect the repository's primary language from its package manifests.
pub fn detect_language(repo_path: &Path) -> &'static str {
    let manifests: [(&str, &str); 7] = [
        ("Cargo.toml", "rust"),
        ("go.mod", "go"),
        ("package.json", "javascript"),
        ("pyproject.toml", "python"),
        ("requirements.txt", "python"),
        ("pom.xml", "java"),
        ("build.gradle", "java"),
    ];

    for (file, language) in manifests {
        if repo_path.join(file).exists() {
            return language;
        }
    }
    "unknown"
}

/// Sniff the domain from framework names in the manifests.
pub fn detect_domain(repo_path: &Path) -> &'static str {
    const WEB_FRAMEWORKS: &[&str] = &[
        "axum", "actix-web", "rocket", "gin-gonic", "echo", "express", "fastify", "next",
        "django", "flask", "fastapi", "rails", "spring-boot",
    ];
    const CLI_FRAMEWORKS: &[&str] = &["clap", "cobra", "commander", "argparse", "picocli"];

    let mut manifest_text = String::new();
    for file in ["Cargo.toml", "go.mod", "package.json", "pyproject.toml", "requirements.txt"] {
        if let Ok(content) = std::fs::read_to_string(repo_path.join(file)) {
            manifest_text.push_str(&content);
            manifest_text.push('\n');
        }
    }

    if WEB_FRAMEWORKS.iter().any(|f| manifest_text.contains(f)) {
        "web"
    } else if CLI_FRAMEWORKS.iter().any(|f| manifest_text.contains(f)) {
        "cli"
    } else {
        "general"
    }
}

/// Pick the profile for a repository. Most specific match wins:
/// `(language, domain)`, then `(language, *)`, then the default.
pub fn select_profile(repo_path: &Path) -> ThresholdProfile {
    let language = detect_language(repo_path);
    let domain = detect_domain(repo_path);

    let profile = PROFILES
        .iter()
        .find(|p| p.language == language && p.domain == domain)
        .or_else(|| {
            PROFILES
                .iter()
                .find(|p| p.language == language && p.domain == "*")
        })
        .cloned()
        .unwrap_or(DEFAULT_PROFILE);

    info!(
        language,
        domain,
        profile_language = profile.language,
        profile_domain = profile.domain,
        "threshold profile selected"
    );
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries_are_inclusive() {
        let thresholds = Thresholds {
            medium: 10.0,
            high: 20.0,
            critical: 40.0,
        };
        assert_eq!(thresholds.level_for(9.9), RiskLevel::Low);
        assert_eq!(thresholds.level_for(10.0), RiskLevel::Medium);
        assert_eq!(thresholds.level_for(25.0), RiskLevel::High);
        assert_eq!(thresholds.level_for(40.0), RiskLevel::Critical);
    }

    #[test]
    fn test_default_profile_matches_reference_scenario() {
        // coupling 25 → HIGH, co-change 0.7 → HIGH, incidents 4 → MEDIUM
        assert_eq!(DEFAULT_PROFILE.coupling.level_for(25.0), RiskLevel::High);
        assert_eq!(DEFAULT_PROFILE.co_change.level_for(0.7), RiskLevel::High);
        assert_eq!(DEFAULT_PROFILE.incidents.level_for(4.0), RiskLevel::Medium);
    }

    #[test]
    fn test_language_detection_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/app\n").unwrap();
        assert_eq!(detect_language(dir.path()), "go");
    }

    #[test]
    fn test_domain_detection_sniffs_frameworks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("go.mod"),
            "module app\nrequire github.com/gin-gonic/gin v1.9.0\n",
        )
        .unwrap();
        assert_eq!(detect_domain(dir.path()), "web");
    }

    #[test]
    fn test_unknown_language_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let profile = select_profile(dir.path());
        assert_eq!(profile.language, "*");
    }
}

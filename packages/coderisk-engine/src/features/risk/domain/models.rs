//! Risk evaluation models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::features::identity::PathResolution;
use crate::features::llm::{LlmError, LlmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> LlmResult<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(LlmError::InvalidResponse(format!(
                "unknown risk level: {}",
                other
            ))),
        }
    }

    pub fn needs_escalation(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// One Tier-1 metric outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Raw metric value (neighbor count, max frequency, incident count).
    pub value: f64,
    /// Normalized score in [0, 1] where the metric defines one.
    pub score: f64,
    pub level: RiskLevel,
}

/// Phase-1 result for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier1Result {
    pub canonical_path: String,
    pub coupling: MetricResult,
    pub co_change: MetricResult,
    pub incidents: MetricResult,
    /// Pairs with co-change frequency above the contribution floor.
    pub co_change_partners: usize,
    pub overall_risk: RiskLevel,
    pub should_escalate: bool,
    pub elapsed_ms: u64,
}

impl Tier1Result {
    /// Evidence lines surfaced when no investigation runs.
    pub fn evidence(&self) -> Vec<String> {
        vec![
            format!(
                "coupling: {} structural neighbors (score {:.2}, {})",
                self.coupling.value as i64,
                self.coupling.score,
                self.coupling.level.as_str()
            ),
            format!(
                "co-change: max frequency {:.2} across {} partners ({})",
                self.co_change.value,
                self.co_change_partners,
                self.co_change.level.as_str()
            ),
            format!(
                "incidents: {} linked in window ({})",
                self.incidents.value as i64,
                self.incidents.level.as_str()
            ),
        ]
    }
}

/// How a final assessment was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Phase1,
    Investigation,
    /// Phase 2 was rate limited; Phase-1 output surfaced.
    DegradedRateLimited,
    /// Phase 2 failed; Phase-1 output surfaced.
    DegradedFailed,
}

/// Final per-file verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub reasoning: String,
    pub source: AssessmentSource,
}

/// One `(tool, args, result, token_cost)` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub tool: String,
    pub args: Value,
    pub result: Value,
    pub token_cost: u32,
}

/// Full Phase-2 evidence trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationTrace {
    pub id: String,
    /// Hash of the diff context, the key a response cache would use.
    pub diff_hash: String,
    pub hops: Vec<TraceEntry>,
    pub total_tokens: u32,
}

/// Per-file outcome of a `check` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRisk {
    pub resolution: PathResolution,
    pub tier1: Tier1Result,
    pub assessment: RiskAssessment,
    pub trace: Option<InvestigationTrace>,
}

/// Whole-command outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub files: Vec<FileRisk>,
}

impl CheckReport {
    pub fn worst_level(&self) -> Option<RiskLevel> {
        self.files.iter().map(|f| f.assessment.risk_level).max()
    }

    /// Exit code contract: 1 only in pre-commit mode with HIGH/CRITICAL.
    pub fn exit_code(&self, pre_commit: bool) -> i32 {
        let blocking = self
            .worst_level()
            .map(|l| l.needs_escalation())
            .unwrap_or(false);
        if pre_commit && blocking {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn test_only_high_and_critical_escalate() {
        assert!(!RiskLevel::Low.needs_escalation());
        assert!(!RiskLevel::Medium.needs_escalation());
        assert!(RiskLevel::High.needs_escalation());
        assert!(RiskLevel::Critical.needs_escalation());
    }

    #[test]
    fn test_exit_code_only_blocks_in_pre_commit() {
        let report = CheckReport {
            files: vec![FileRisk {
                resolution: PathResolution::new_file("core/auth.go"),
                tier1: Tier1Result {
                    canonical_path: "core/auth.go".into(),
                    coupling: MetricResult {
                        value: 25.0,
                        score: 1.0,
                        level: RiskLevel::High,
                    },
                    co_change: MetricResult {
                        value: 0.7,
                        score: 0.7,
                        level: RiskLevel::High,
                    },
                    incidents: MetricResult {
                        value: 4.0,
                        score: 0.4,
                        level: RiskLevel::Medium,
                    },
                    co_change_partners: 3,
                    overall_risk: RiskLevel::High,
                    should_escalate: true,
                    elapsed_ms: 12,
                },
                assessment: RiskAssessment {
                    risk_level: RiskLevel::High,
                    confidence: 0.8,
                    reasoning: "phase-1 metrics".into(),
                    source: AssessmentSource::Phase1,
                },
                trace: None,
            }],
        };

        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 1);
    }
}

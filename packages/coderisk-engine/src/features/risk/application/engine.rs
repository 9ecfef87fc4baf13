//! Risk engine façade: resolve → Phase 1 → escalate → Phase 2.
//!
//! LLM failures never fail the command: rate limits and errors degrade
//! the affected file to its Phase-1 output, tagged with how it degraded.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use coderisk_storage::Repository;

use crate::config::TimeoutConfig;
use crate::features::graph::{GraphStore, ReadQuery};
use crate::features::identity::FileIdentityResolver;
use crate::features::llm::LlmProvider;
use crate::features::risk::domain::{
    select_profile, AssessmentSource, CheckReport, FileRisk, RiskAssessment, Tier1Result,
};
use crate::features::risk::infrastructure::RiskToolbox;
use crate::shared::models::{ErrorKind, Result};

use super::investigator::{InvestigationContext, Investigator};
use super::metrics::MetricsEngine;

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    pub no_ai: bool,
    pub pre_commit: bool,
}

pub struct RiskEngine {
    graph: Arc<dyn GraphStore>,
    llm: Option<Arc<dyn LlmProvider>>,
    timeouts: TimeoutConfig,
}

impl RiskEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        llm: Option<Arc<dyn LlmProvider>>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            graph,
            llm,
            timeouts,
        }
    }

    pub async fn check(
        &self,
        repo: &Repository,
        resolver: &FileIdentityResolver,
        paths: &[String],
        options: CheckOptions,
    ) -> Result<CheckReport> {
        let now = Utc::now();
        let profile = select_profile(Path::new(&repo.absolute_path));
        let metrics = MetricsEngine::new(
            self.graph.clone(),
            profile,
            self.timeouts.metric_query,
        );

        let resolutions = resolver.resolve_batch(paths).await?;
        let link_quality = self.link_quality(repo.id).await;

        let mut files = Vec::with_capacity(resolutions.len());
        for resolution in resolutions {
            let tier1 = metrics
                .tier1(repo.id, &resolution.canonical_path, now)
                .await?;

            let (assessment, trace) = if tier1.should_escalate && !options.no_ai {
                match &self.llm {
                    Some(llm) => {
                        let toolbox = RiskToolbox::new(self.graph.clone(), repo.id, now);
                        let investigator =
                            Investigator::new(llm.as_ref(), toolbox, self.timeouts.investigation);
                        let context = InvestigationContext {
                            resolution: resolution.clone(),
                            tier1: tier1.clone(),
                            diff_summary: None,
                            link_quality,
                        };

                        match investigator.investigate(&context).await {
                            Ok((assessment, trace)) => (assessment, Some(trace)),
                            Err(err) if err.kind == ErrorKind::LlmRateLimited => {
                                warn!(
                                    file = %resolution.canonical_path,
                                    "investigation rate limited, degrading to phase-1 output"
                                );
                                (
                                    phase1_assessment(&tier1, AssessmentSource::DegradedRateLimited),
                                    None,
                                )
                            }
                            Err(err) if err.is_llm() || err.kind == ErrorKind::Cancelled => {
                                warn!(
                                    file = %resolution.canonical_path,
                                    error = %err,
                                    "investigation failed, degrading to phase-1 output"
                                );
                                (phase1_assessment(&tier1, AssessmentSource::DegradedFailed), None)
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    None => (phase1_assessment(&tier1, AssessmentSource::Phase1), None),
                }
            } else {
                (phase1_assessment(&tier1, AssessmentSource::Phase1), None)
            };

            info!(
                file = %resolution.canonical_path,
                level = assessment.risk_level.as_str(),
                escalated = tier1.should_escalate,
                elapsed_ms = tier1.elapsed_ms,
                "file assessed"
            );
            files.push(FileRisk {
                resolution,
                tier1,
                assessment,
                trace,
            });
        }

        Ok(CheckReport { files })
    }

    /// Fraction of closed issues carrying a FIXED_BY link; feeds the
    /// kickoff prompt so the model can discount sparse incident data.
    async fn link_quality(&self, repo_id: i64) -> Option<f64> {
        let rows = self
            .graph
            .read(ReadQuery::LinkQualitySummary { repo_id })
            .await
            .ok()?;
        let row = rows.first()?;
        let closed = row.get("closed_issues").and_then(Value::as_u64)?;
        let fixed = row.get("fixed_links").and_then(Value::as_u64)?;
        if closed == 0 {
            return None;
        }
        Some(fixed as f64 / closed as f64)
    }
}

fn phase1_assessment(tier1: &Tier1Result, source: AssessmentSource) -> RiskAssessment {
    RiskAssessment {
        risk_level: tier1.overall_risk,
        confidence: 0.75,
        reasoning: tier1.evidence().join("; "),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::graph::MemoryGraphStore;
    use crate::features::risk::domain::RiskLevel;
    use coderisk_storage::InMemoryStagingStore;

    fn repo() -> Repository {
        Repository {
            id: 1,
            full_name: "acme/app".into(),
            absolute_path: "/nonexistent".into(),
            default_branch: "main".into(),
        }
    }

    #[tokio::test]
    async fn test_no_ai_check_on_empty_graph_is_low_risk() {
        let staging = Arc::new(InMemoryStagingStore::new());
        let graph = Arc::new(MemoryGraphStore::new());
        let engine = RiskEngine::new(graph, None, TimeoutConfig::default());
        let resolver = FileIdentityResolver::new(staging, 1, None);

        let report = engine
            .check(
                &repo(),
                &resolver,
                &["src/new.rs".to_string()],
                CheckOptions {
                    no_ai: true,
                    pre_commit: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].assessment.risk_level, RiskLevel::Low);
        assert_eq!(report.files[0].assessment.source, AssessmentSource::Phase1);
        assert_eq!(report.exit_code(true), 0);
    }
}

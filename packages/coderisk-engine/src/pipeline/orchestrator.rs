//! Ingest orchestration for one repository.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use coderisk_storage::{Repository, StagingStore};

use crate::config::TimeoutConfig;
use crate::features::atomizer::{AtomizeReport, Atomizer};
use crate::features::graph::{GraphStore, NodeLabel, ReadQuery};
use crate::features::graph_builder::{BuildReport, BuilderConfig, GraphBuilder};
use crate::features::identity::infrastructure::GitExecutor;
use crate::features::identity::FileIdentityResolver;
use crate::features::linking::{LinkReport, Linker};
use crate::features::llm::LlmProvider;
use crate::shared::models::{CoreError, Result};

use super::config::PipelineConfig;

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub build: BuildReport,
    pub links: LinkReport,
    pub atomize: Option<AtomizeReport>,
    /// Post-ingest consistency findings; empty means verified clean.
    pub verify_issues: Vec<String>,
}

pub struct IngestPipeline {
    staging: Arc<dyn StagingStore>,
    graph: Arc<dyn GraphStore>,
    llm: Option<Arc<dyn LlmProvider>>,
    config: PipelineConfig,
    timeouts: TimeoutConfig,
    noreply_host: String,
}

impl IngestPipeline {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        graph: Arc<dyn GraphStore>,
        llm: Option<Arc<dyn LlmProvider>>,
        config: PipelineConfig,
        timeouts: TimeoutConfig,
        noreply_host: impl Into<String>,
    ) -> Self {
        Self {
            staging,
            graph,
            llm,
            config,
            timeouts,
            noreply_host: noreply_host.into(),
        }
    }

    /// Run the full ingest for one repository: build phases, Linker, and
    /// optionally the Atomizer. The caller holds the single-writer role
    /// for this repository's slice of the graph.
    pub async fn run(&self, repo_id: i64, atomize: bool, verify: bool) -> Result<IngestReport> {
        let repo = self
            .staging
            .get_repository(repo_id)
            .await?
            .ok_or_else(|| {
                CoreError::config(format!(
                    "repository {} is not registered in the staging store",
                    repo_id
                ))
            })?;

        let git = match GitExecutor::new(&repo.absolute_path) {
            Ok(git) => Some(git),
            Err(err) => {
                warn!(
                    repo_id,
                    path = %repo.absolute_path,
                    error = %err,
                    "working copy unavailable; rename walk and atomizer disabled"
                );
                None
            }
        };

        let resolver = FileIdentityResolver::new(self.staging.clone(), repo.id, git.clone())
            .with_workers(self.config.workers);
        let builder = GraphBuilder::new(
            self.staging.clone(),
            self.graph.clone(),
            BuilderConfig {
                batch_size: self.config.batch_size,
                workers: self.config.workers,
                noreply_host: self.noreply_host.clone(),
                retry: Default::default(),
            },
        );

        let mut report = IngestReport::default();

        report.build = tokio::time::timeout(
            self.timeouts.ingest_phase,
            builder.build_graph(&repo, &resolver),
        )
        .await??;

        let linker = Linker::new(self.staging.clone(), self.graph.clone());
        report.links =
            tokio::time::timeout(self.timeouts.ingest_phase, linker.run(repo.id)).await??;

        if atomize {
            report.atomize = self.run_atomizer(&repo, git.as_ref()).await?;
        }

        if verify {
            report.verify_issues = self.verify(&repo).await?;
            if report.verify_issues.is_empty() {
                info!(repo_id, "post-ingest verification clean");
            } else {
                for issue in &report.verify_issues {
                    warn!(repo_id, issue = %issue, "post-ingest verification finding");
                }
            }
        }

        Ok(report)
    }

    async fn run_atomizer(
        &self,
        repo: &Repository,
        git: Option<&GitExecutor>,
    ) -> Result<Option<AtomizeReport>> {
        let (Some(llm), Some(git)) = (&self.llm, git) else {
            // Absence of an LLM or working copy downgrades enrichment,
            // never the ingest.
            warn!(
                repo_id = repo.id,
                "atomizer requested but LLM or working copy missing, skipping"
            );
            return Ok(None);
        };

        let atomizer = Atomizer::new(self.staging.clone(), self.graph.clone(), llm.clone());
        Ok(Some(atomizer.run(repo, git).await?))
    }

    /// Cross-check node counts against staging rows.
    async fn verify(&self, repo: &Repository) -> Result<Vec<String>> {
        let stats = self.staging.staging_stats(repo.id).await?;
        let rows = self
            .graph
            .read(ReadQuery::CountsByLabel { repo_id: repo.id })
            .await?;

        let count_for = |label: NodeLabel| -> usize {
            rows.iter()
                .find(|r| r.get("label").and_then(Value::as_str) == Some(label.as_str()))
                .and_then(|r| r.get("count"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize
        };

        let mut issues = Vec::new();
        if count_for(NodeLabel::Commit) != stats.commits_processed {
            issues.push(format!(
                "commit nodes ({}) != processed commit rows ({})",
                count_for(NodeLabel::Commit),
                stats.commits_processed
            ));
        }
        if count_for(NodeLabel::Issue) != stats.issues {
            issues.push(format!(
                "issue nodes ({}) != staged issues ({})",
                count_for(NodeLabel::Issue),
                stats.issues
            ));
        }
        if count_for(NodeLabel::PullRequest) != stats.prs {
            issues.push(format!(
                "PR nodes ({}) != staged PRs ({})",
                count_for(NodeLabel::PullRequest),
                stats.prs
            ));
        }

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::graph::MemoryGraphStore;
    use chrono::{TimeZone, Utc};
    use coderisk_storage::{InMemoryStagingStore, RawCommit};
    use serde_json::json;

    fn repository() -> Repository {
        Repository {
            id: 1,
            full_name: "acme/app".into(),
            absolute_path: "/nonexistent".into(),
            default_branch: "main".into(),
        }
    }

    fn pipeline(staging: Arc<InMemoryStagingStore>, graph: MemoryGraphStore) -> IngestPipeline {
        IngestPipeline::new(
            staging,
            Arc::new(graph),
            None,
            PipelineConfig::default(),
            TimeoutConfig::default(),
            "github.com",
        )
    }

    #[tokio::test]
    async fn test_unknown_repo_is_config_error() {
        let pipeline = pipeline(Arc::new(InMemoryStagingStore::new()), MemoryGraphStore::new());
        let err = pipeline.run(42, false, false).await.unwrap_err();
        assert_eq!(err.kind, crate::shared::models::ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn test_full_run_with_verification_is_clean() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging.upsert_repository(&repository()).await.unwrap();
        staging
            .insert_commits(&[RawCommit {
                id: 0,
                repo_id: 1,
                sha: "a1b2c3".into(),
                message: "init".into(),
                author_name: "x".into(),
                author_email: "x@u.noreply".into(),
                author_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                topological_index: 0,
                raw_json: json!({"files": [
                    {"filename": "main.go", "status": "modified", "additions": 10, "deletions": 2}
                ]}),
                processed: false,
            }])
            .await
            .unwrap();

        let graph = MemoryGraphStore::new();
        let pipeline = pipeline(staging, graph);

        let report = pipeline.run(1, false, true).await.unwrap();
        assert_eq!(report.build.commits_processed, 1);
        assert!(report.verify_issues.is_empty());
    }
}

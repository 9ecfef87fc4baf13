//! Build orchestration: staging rows → graph, phase by phase.
//!
//! Each phase is resumable: it consumes only unprocessed rows and flips
//! `processed` only after the batch's nodes *and* dependent edges have
//! been written, so cancellation leaves a state the next run continues
//! from. MERGE idempotence makes the retry path safe.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use coderisk_storage::{RawCommit, Repository, StagingKind, StagingStore};

use crate::features::graph::{GraphStats, GraphStore};
use crate::features::graph_builder::domain::BuildReport;
use crate::features::graph_builder::infrastructure::converters::{
    convert_closed_by, convert_commit, convert_cross_reference, convert_issue, convert_merged_as,
    convert_pr, ConvertedBatch,
};
use crate::features::identity::{FileIdentityResolver, IdentityMapBuilder};
use crate::shared::models::Result;
use crate::shared::utils::{retry_with_backoff, RetryPolicy};

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Rows per staging fetch / processed-flag batch.
    pub batch_size: usize,
    /// Concurrent batches within a phase.
    pub workers: usize,
    pub noreply_host: String,
    pub retry: RetryPolicy,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            workers: 4,
            noreply_host: "github.com".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct GraphBuilder {
    staging: Arc<dyn StagingStore>,
    graph: Arc<dyn GraphStore>,
    config: BuilderConfig,
}

impl GraphBuilder {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        graph: Arc<dyn GraphStore>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            staging,
            graph,
            config,
        }
    }

    /// Run build phases 1–5 for one repository.
    ///
    /// The caller guarantees single-writer access to the graph for this
    /// repository.
    pub async fn build_graph(
        &self,
        repo: &Repository,
        resolver: &FileIdentityResolver,
    ) -> Result<BuildReport> {
        self.graph.ensure_schema().await?;

        // The identity map must be complete before any File node is keyed,
        // so a commit that touched a since-renamed path lands on the
        // file's canonical identity.
        IdentityMapBuilder::new(self.staging.clone(), repo.id)
            .rebuild()
            .await?;

        let mut report = BuildReport::default();
        report.merge(self.phase_commits(repo, resolver).await?);
        report.merge(self.phase_prs(repo).await?);
        report.merge(self.phase_merged_as(repo).await?);
        report.merge(self.phase_issues(repo).await?);
        report.merge(self.phase_timeline(repo).await?);

        info!(
            repo_id = repo.id,
            nodes = report.stats.nodes,
            edges = report.stats.edges,
            skipped = report.skipped_rows,
            "graph build complete"
        );
        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Phase 1: commits
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn phase_commits(
        &self,
        repo: &Repository,
        resolver: &FileIdentityResolver,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        loop {
            let pending = self
                .staging
                .fetch_unprocessed_commits(repo.id, self.config.batch_size * self.config.workers)
                .await?;
            if pending.is_empty() {
                break;
            }

            let batches: Vec<Vec<RawCommit>> = pending
                .chunks(self.config.batch_size)
                .map(|c| c.to_vec())
                .collect();

            let outcomes: Vec<Result<BuildReport>> = stream::iter(batches)
                .map(|batch| self.commit_batch(repo, resolver, batch))
                .buffer_unordered(self.config.workers)
                .collect()
                .await;

            for outcome in outcomes {
                report.merge(outcome?);
            }
        }

        info!(
            repo_id = repo.id,
            commits = report.commits_processed,
            "phase 1 (commits) done"
        );
        Ok(report)
    }

    /// One commit batch: convert, write, then mark processed.
    async fn commit_batch(
        &self,
        repo: &Repository,
        resolver: &FileIdentityResolver,
        batch: Vec<RawCommit>,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let mut converted = ConvertedBatch::default();
        let mut ids = Vec::with_capacity(batch.len());

        for commit in &batch {
            ids.push(commit.id);
            let changes = match commit.file_changes() {
                Ok(changes) => changes,
                Err(err) => {
                    warn!(sha = %commit.sha, error = %err, "skipping inconsistent commit row");
                    report.skipped_rows += 1;
                    continue;
                }
            };

            let paths: Vec<String> = changes.iter().map(|c| c.filename.clone()).collect();
            let resolutions = resolver.resolve_batch(&paths).await?;
            converted.absorb(convert_commit(commit, &resolutions)?);
            report.commits_processed += 1;
        }

        report.stats.add(self.write_batch(converted).await?);

        // Only after nodes and dependent edges are committed.
        self.staging
            .mark_processed(StagingKind::Commits, &ids)
            .await?;

        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Phase 2: PRs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn phase_prs(&self, repo: &Repository) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        loop {
            let pending = self
                .staging
                .fetch_unprocessed_prs(repo.id, self.config.batch_size)
                .await?;
            if pending.is_empty() {
                break;
            }

            let mut converted = ConvertedBatch::default();
            let mut ids = Vec::with_capacity(pending.len());
            for pr in &pending {
                ids.push(pr.id);
                converted.absorb(convert_pr(pr, &self.config.noreply_host));
                report.prs_processed += 1;
            }

            report.stats.add(self.write_batch(converted).await?);
            self.staging
                .mark_processed(StagingKind::PullRequests, &ids)
                .await?;
        }

        info!(repo_id = repo.id, prs = report.prs_processed, "phase 2 (PRs) done");
        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Phase 3: MERGED_AS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn phase_merged_as(&self, repo: &Repository) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let mut converted = ConvertedBatch::default();

        for pr in self.staging.list_prs(repo.id).await? {
            if !pr.merged {
                continue;
            }
            let Some(sha) = pr.merge_commit_sha.clone() else {
                // merged == true with no merge commit produces no edge.
                continue;
            };

            if self.staging.get_commit_by_sha(repo.id, &sha).await?.is_none() {
                warn!(
                    pr = pr.number,
                    sha = %sha,
                    "merge commit not in staging, skipping MERGED_AS"
                );
                report.skipped_rows += 1;
                continue;
            }

            converted.edges.push(convert_merged_as(&pr, &sha));
        }

        report.stats.add(self.write_batch(converted).await?);
        info!(repo_id = repo.id, "phase 3 (MERGED_AS) done");
        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Phase 4: issues
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn phase_issues(&self, repo: &Repository) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        loop {
            let pending = self
                .staging
                .fetch_unprocessed_issues(repo.id, self.config.batch_size)
                .await?;
            if pending.is_empty() {
                break;
            }

            let mut converted = ConvertedBatch::default();
            let mut ids = Vec::with_capacity(pending.len());
            for issue in &pending {
                ids.push(issue.id);
                converted.nodes.push(convert_issue(issue));
                report.issues_processed += 1;
            }

            report.stats.add(self.write_batch(converted).await?);
            self.staging
                .mark_processed(StagingKind::Issues, &ids)
                .await?;
        }

        info!(
            repo_id = repo.id,
            issues = report.issues_processed,
            "phase 4 (issues) done"
        );
        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Phase 5: timeline edges (before the Linker, by design of the
    // phase order: Linker replacement can never select these kinds)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn phase_timeline(&self, repo: &Repository) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let mut converted = ConvertedBatch::default();

        for event in self.staging.timeline_events(repo.id).await? {
            match event.event_type {
                coderisk_storage::TimelineEventType::CrossReferenced => {
                    let is_pr = matches!(
                        event.source_type.as_deref(),
                        Some("pull_request") | Some("pr")
                    );
                    let Some(number) = event.source_number.filter(|_| is_pr) else {
                        continue;
                    };
                    if self.staging.get_pr(repo.id, number).await?.is_none() {
                        warn!(
                            issue = event.issue_number,
                            pr = number,
                            "cross-referenced PR not in staging, skipping REFERENCES"
                        );
                        report.skipped_rows += 1;
                        continue;
                    }
                    converted.edges.push(convert_cross_reference(&event, number));
                    report.timeline_edges += 1;
                }
                coderisk_storage::TimelineEventType::Closed => {
                    let Some(sha) = event.source_sha.clone() else {
                        continue;
                    };
                    if self.staging.get_commit_by_sha(repo.id, &sha).await?.is_none() {
                        warn!(
                            issue = event.issue_number,
                            sha = %sha,
                            "closing commit not in staging, skipping CLOSED_BY"
                        );
                        report.skipped_rows += 1;
                        continue;
                    }
                    converted.edges.push(convert_closed_by(&event, &sha));
                    report.timeline_edges += 1;
                }
            }
        }

        report.stats.add(self.write_batch(converted).await?);
        info!(
            repo_id = repo.id,
            edges = report.timeline_edges,
            "phase 5 (timeline) done"
        );
        Ok(report)
    }

    /// Write one converted batch with the retry policy applied at the
    /// batch boundary.
    async fn write_batch(&self, batch: ConvertedBatch) -> Result<GraphStats> {
        let nodes = retry_with_backoff(self.config.retry, "merge_nodes", || {
            let graph = self.graph.clone();
            let nodes = batch.nodes.clone();
            async move { graph.merge_nodes(&nodes).await }
        })
        .await?;

        let edges = retry_with_backoff(self.config.retry, "merge_edges", || {
            let graph = self.graph.clone();
            let edges = batch.edges.clone();
            async move { graph.merge_edges(&edges).await }
        })
        .await?;

        Ok(GraphStats { nodes, edges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::graph::{EdgeKind, MemoryGraphStore, NodeLabel, ReadQuery};
    use chrono::{TimeZone, Utc};
    use coderisk_storage::{InMemoryStagingStore, RawCommit};
    use serde_json::json;

    fn repo() -> Repository {
        Repository {
            id: 1,
            full_name: "acme/app".into(),
            absolute_path: "/tmp/app".into(),
            default_branch: "main".into(),
        }
    }

    fn commit(topo: i64, sha: &str, email: &str, files: serde_json::Value) -> RawCommit {
        RawCommit {
            id: 0,
            repo_id: 1,
            sha: sha.to_string(),
            message: format!("commit {}", sha),
            author_name: "x".into(),
            author_email: email.to_string(),
            author_date: Utc.timestamp_opt(1_700_000_000 + topo, 0).unwrap(),
            topological_index: topo,
            raw_json: json!({ "files": files }),
            processed: false,
        }
    }

    async fn build(staging: Arc<InMemoryStagingStore>) -> (MemoryGraphStore, BuildReport) {
        let graph = MemoryGraphStore::new();
        let builder = GraphBuilder::new(
            staging.clone(),
            Arc::new(graph.clone()),
            BuilderConfig::default(),
        );
        let resolver = FileIdentityResolver::new(staging, 1, None);
        let report = builder.build_graph(&repo(), &resolver).await.unwrap();
        (graph, report)
    }

    #[tokio::test]
    async fn test_minimal_build_produces_expected_graph() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[commit(
                0,
                "a1b2c3",
                "x@u.noreply",
                json!([{"filename": "main.go", "status": "modified", "additions": 10, "deletions": 2}]),
            )])
            .await
            .unwrap();

        let (graph, report) = build(staging).await;

        assert_eq!(report.commits_processed, 1);
        assert!(graph.get_node("1:commit:a1b2c3").is_some());
        assert!(graph.get_node("1:developer:x@u.noreply").is_some());
        assert!(graph.get_node("1:file:main.go").is_some());
        assert!(graph
            .get_edge(EdgeKind::Authored, "1:developer:x@u.noreply", "1:commit:a1b2c3")
            .is_some());

        let modified = graph
            .get_edge(EdgeKind::Modified, "1:commit:a1b2c3", "1:file:main.go")
            .unwrap();
        assert_eq!(modified.props["additions"], json!(10));
        assert_eq!(modified.props["deletions"], json!(2));
    }

    #[tokio::test]
    async fn test_email_normalization_reuses_developer_node() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[
                commit(0, "c1", "x@users.noreply.github.com", json!([])),
                commit(1, "c2", "12345+x@users.noreply.github.com", json!([])),
            ])
            .await
            .unwrap();

        let (graph, _) = build(staging).await;

        let developers = graph
            .read(ReadQuery::NodesByLabel {
                repo_id: 1,
                label: NodeLabel::Developer,
            })
            .await
            .unwrap();
        assert_eq!(developers.len(), 1);
        assert_eq!(
            developers[0]["id"],
            json!("1:developer:x@users.noreply.github.com")
        );
    }

    #[tokio::test]
    async fn test_rename_chain_keys_single_file_node() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[
                commit(0, "c1", "x@e.com", json!([{"filename": "a.go", "status": "added", "additions": 3}])),
                commit(
                    1,
                    "c2",
                    "x@e.com",
                    json!([{"filename": "b.go", "status": "renamed", "previous_filename": "a.go"}]),
                ),
                commit(2, "c3", "x@e.com", json!([{"filename": "b.go", "status": "modified", "additions": 1}])),
            ])
            .await
            .unwrap();

        let (graph, _) = build(staging).await;

        let files = graph
            .read(ReadQuery::NodesByLabel {
                repo_id: 1,
                label: NodeLabel::File,
            })
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["id"], json!("1:file:b.go"));

        let c1_edge = graph
            .get_edge(EdgeKind::Modified, "1:commit:c1", "1:file:b.go")
            .unwrap();
        assert_eq!(c1_edge.props["path_at_commit"], json!("a.go"));
        assert_eq!(c1_edge.props["is_renamed"], json!(true));

        let c3_edge = graph
            .get_edge(EdgeKind::Modified, "1:commit:c3", "1:file:b.go")
            .unwrap();
        assert_eq!(c3_edge.props["path_at_commit"], json!("b.go"));
        assert_eq!(c3_edge.props["is_renamed"], json!(false));
    }

    #[tokio::test]
    async fn test_build_is_resumable_and_idempotent() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[commit(
                0,
                "a1b2c3",
                "x@e.com",
                json!([{"filename": "main.go", "status": "modified", "additions": 1}]),
            )])
            .await
            .unwrap();

        let graph = MemoryGraphStore::new();
        let builder = GraphBuilder::new(
            staging.clone(),
            Arc::new(graph.clone()),
            BuilderConfig::default(),
        );
        let resolver = FileIdentityResolver::new(staging.clone(), 1, None);

        builder.build_graph(&repo(), &resolver).await.unwrap();
        let nodes_after_first = graph.node_count();
        let edges_after_first = graph.edge_count();

        let report = builder.build_graph(&repo(), &resolver).await.unwrap();
        assert_eq!(report.commits_processed, 0); // all rows already processed
        assert_eq!(graph.node_count(), nodes_after_first);
        assert_eq!(graph.edge_count(), edges_after_first);
    }
}

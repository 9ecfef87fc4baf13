//! Atomizer run loop.
//!
//! A single consumer walks commits in topological-index order; ordering
//! is what lets RENAMED_FROM chains build incrementally. Every failure
//! mode on an individual commit (diff unavailable, LLM error, schema
//! violation) is logged and skipped.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use coderisk_storage::{CodeBlockRow, Repository, StagingStore};

use crate::features::atomizer::domain::{AtomizeReport, AtomizedCommit, BlockOperation};
use crate::features::atomizer::infrastructure::{build_atomize_request, parse_atomized};
use crate::features::graph::{EdgeKind, GraphEdge, GraphNode, GraphStore, NodeLabel, NodeRef};
use crate::features::identity::infrastructure::GitExecutor;
use crate::features::llm::LlmProvider;
use crate::shared::models::Result;

pub struct Atomizer {
    staging: Arc<dyn StagingStore>,
    graph: Arc<dyn GraphStore>,
    llm: Arc<dyn LlmProvider>,
}

impl Atomizer {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        graph: Arc<dyn GraphStore>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            staging,
            graph,
            llm,
        }
    }

    pub async fn run(&self, repo: &Repository, git: &GitExecutor) -> Result<AtomizeReport> {
        let mut report = AtomizeReport::default();

        for commit in self.staging.list_commits(repo.id).await? {
            // Already atomized in a previous run.
            if !self
                .staging
                .code_blocks_for_commit(repo.id, &commit.sha)
                .await?
                .is_empty()
            {
                debug!(sha = %commit.sha, "already atomized, skipping");
                continue;
            }

            let diff = match git.show_patch(&commit.sha).await {
                Ok(diff) => diff,
                Err(err) => {
                    warn!(sha = %commit.sha, error = %err, "diff unavailable, skipping commit");
                    report.commits_skipped += 1;
                    continue;
                }
            };

            let request = build_atomize_request(&commit.sha, &commit.message, &diff);
            let atomized = match self.llm.complete(&request).await {
                Ok(response) => match response.content.as_deref().map(parse_atomized) {
                    Some(Ok(atomized)) => atomized,
                    Some(Err(err)) => {
                        warn!(sha = %commit.sha, error = %err, "unusable atomization, skipping");
                        report.commits_skipped += 1;
                        continue;
                    }
                    None => {
                        warn!(sha = %commit.sha, "empty atomization response, skipping");
                        report.commits_skipped += 1;
                        continue;
                    }
                },
                Err(err) => {
                    warn!(sha = %commit.sha, error = %err, "LLM call failed, skipping commit");
                    report.commits_skipped += 1;
                    continue;
                }
            };

            let (blocks, edges) = self.persist(repo.id, &commit.sha, &atomized).await?;
            report.blocks_written += blocks;
            report.edges_written += edges;
            report.commits_processed += 1;
        }

        info!(
            repo_id = repo.id,
            processed = report.commits_processed,
            skipped = report.commits_skipped,
            blocks = report.blocks_written,
            "atomizer run complete"
        );
        Ok(report)
    }

    async fn persist(
        &self,
        repo_id: i64,
        sha: &str,
        atomized: &AtomizedCommit,
    ) -> Result<(usize, usize)> {
        let rows: Vec<CodeBlockRow> = atomized
            .blocks
            .iter()
            .map(|block| CodeBlockRow {
                id: 0,
                repo_id,
                commit_sha: sha.to_string(),
                file_path: block.file_path.clone(),
                name: block.name.clone(),
                kind: block.kind.clone(),
                operation: block.operation.as_str().to_string(),
                start_line: block.start_line,
                end_line: block.end_line,
            })
            .collect();
        self.staging.insert_code_blocks(&rows).await?;

        let mut nodes = Vec::new();
        for block in &atomized.blocks {
            if block.operation == BlockOperation::Removed {
                continue;
            }
            nodes.push(
                GraphNode::new(repo_id, NodeLabel::CodeBlock, block_key(&block.file_path, &block.name))
                    .prop("file_path", json!(block.file_path))
                    .prop("name", json!(block.name))
                    .prop("kind", json!(block.kind))
                    .prop("last_commit", json!(sha)),
            );
        }

        let mut edges = Vec::new();
        for rename in &atomized.renames {
            edges.push(GraphEdge::new(
                repo_id,
                EdgeKind::RenamedFrom,
                NodeRef::new(
                    NodeLabel::CodeBlock,
                    block_key(&rename.to_file, &rename.to_name),
                ),
                NodeRef::new(
                    NodeLabel::CodeBlock,
                    block_key(&rename.from_file, &rename.from_name),
                ),
            ));
        }
        for import in &atomized.imports {
            edges.push(GraphEdge::new(
                repo_id,
                EdgeKind::ImportsFrom,
                NodeRef::new(
                    NodeLabel::CodeBlock,
                    block_key(&import.from_file, &import.from_name),
                ),
                NodeRef::new(
                    NodeLabel::CodeBlock,
                    block_key(&import.to_file, &import.to_name),
                ),
            ));
        }

        self.graph.merge_nodes(&nodes).await?;
        let edge_count = self.graph.merge_edges(&edges).await?;
        Ok((rows.len(), edge_count))
    }
}

fn block_key(file_path: &str, name: &str) -> String {
    format!("{}:{}", file_path, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_key_is_file_scoped() {
        assert_eq!(block_key("auth.go", "Login"), "auth.go:Login");
    }
}

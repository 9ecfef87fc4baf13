//! Staging row → node/edge conversion.
//!
//! Pure functions; all I/O (path resolution, existence checks) happens in
//! the builder before conversion. Developer emails are normalized here so
//! no caller can forget.

use serde_json::json;

use coderisk_storage::{RawCommit, RawIssue, RawPullRequest, TimelineEvent};

use crate::features::graph::{EdgeKind, GraphEdge, GraphNode, NodeLabel, NodeRef};
use crate::features::identity::PathResolution;
use crate::shared::models::Result;
use crate::shared::utils::normalize_email;

/// Node/edge batch for one staging row.
#[derive(Debug, Default)]
pub struct ConvertedBatch {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ConvertedBatch {
    pub fn absorb(&mut self, other: ConvertedBatch) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

/// Commit → Commit + Developer + AUTHORED + (File + MODIFIED) per entry.
///
/// `resolutions` must hold one entry per file change, in order.
pub fn convert_commit(
    commit: &RawCommit,
    resolutions: &[PathResolution],
) -> Result<ConvertedBatch> {
    let changes = commit.file_changes()?;
    debug_assert_eq!(changes.len(), resolutions.len());

    let committed_at = commit.author_date.timestamp();
    let email = normalize_email(&commit.author_email);
    let additions: i64 = changes.iter().map(|c| c.additions).sum();
    let deletions: i64 = changes.iter().map(|c| c.deletions).sum();
    let on_default_branch = commit
        .raw_json
        .get("on_default_branch")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(true);

    let mut batch = ConvertedBatch::default();

    let commit_node = GraphNode::new(commit.repo_id, NodeLabel::Commit, &commit.sha)
        .prop("sha", json!(commit.sha))
        .prop("message", json!(commit.message))
        .prop("author_email", json!(email))
        .prop("committed_at", json!(committed_at))
        .prop("additions", json!(additions))
        .prop("deletions", json!(deletions))
        .prop("on_default_branch", json!(on_default_branch));
    let commit_ref = commit_node.node_ref();

    let developer_node = GraphNode::new(commit.repo_id, NodeLabel::Developer, &email)
        .prop("email", json!(email))
        .prop("name", json!(commit.author_name))
        .prop("last_active", json!(committed_at));
    let developer_ref = developer_node.node_ref();

    batch.nodes.push(commit_node);
    batch.nodes.push(developer_node);
    batch.edges.push(GraphEdge::new(
        commit.repo_id,
        EdgeKind::Authored,
        developer_ref,
        commit_ref.clone(),
    ));

    for (change, resolution) in changes.iter().zip(resolutions.iter()) {
        let canonical = &resolution.canonical_path;
        let is_renamed = &change.filename != canonical;

        let file_node = GraphNode::new(commit.repo_id, NodeLabel::File, canonical)
            .prop("canonical_path", json!(canonical))
            .prop("path_at_commit", json!(change.filename))
            .prop("is_renamed", json!(is_renamed));
        let file_ref = file_node.node_ref();
        batch.nodes.push(file_node);

        batch.edges.push(
            GraphEdge::new(
                commit.repo_id,
                EdgeKind::Modified,
                commit_ref.clone(),
                file_ref,
            )
            .prop("additions", json!(change.additions))
            .prop("deletions", json!(change.deletions))
            .prop("status", json!(change.status.as_str()))
            .prop("path_at_commit", json!(change.filename))
            .prop("is_renamed", json!(is_renamed)),
        );
    }

    Ok(batch)
}

/// PR → PR + Developer + CREATED.
///
/// Returns `None` for the developer parts when no author email can be
/// derived even from the login.
pub fn convert_pr(pr: &RawPullRequest, noreply_host: &str) -> ConvertedBatch {
    let mut batch = ConvertedBatch::default();

    let author_email = pr.author_email(noreply_host).map(|e| normalize_email(&e));

    let mut pr_node = GraphNode::new(pr.repo_id, NodeLabel::PullRequest, pr.number.to_string())
        .prop("number", json!(pr.number))
        .prop("title", json!(pr.title))
        .prop("body", json!(pr.body))
        .prop("state", json!(pr.state))
        .prop("base_branch", json!(pr.base_branch()))
        .prop("head_branch", json!(pr.head_branch()))
        .prop("created_at", json!(pr.created_at.timestamp()))
        .prop("merged_at", json!(pr.merged_at.map(|t| t.timestamp())))
        .prop("merge_commit_sha", json!(pr.merge_commit_sha));
    if let Some(email) = &author_email {
        pr_node = pr_node.prop("author_email", json!(email));
    }
    let pr_ref = pr_node.node_ref();
    batch.nodes.push(pr_node);

    if let Some(email) = author_email {
        let developer = GraphNode::new(pr.repo_id, NodeLabel::Developer, &email)
            .prop("email", json!(email));
        let developer_ref = developer.node_ref();
        batch.nodes.push(developer);
        batch.edges.push(GraphEdge::new(
            pr.repo_id,
            EdgeKind::Created,
            developer_ref,
            pr_ref,
        ));
    }

    batch
}

/// PR → MERGED_AS, once the merge commit is known to exist in staging.
pub fn convert_merged_as(pr: &RawPullRequest, merge_commit_sha: &str) -> GraphEdge {
    GraphEdge::new(
        pr.repo_id,
        EdgeKind::MergedAs,
        NodeRef::new(NodeLabel::PullRequest, pr.number.to_string()),
        NodeRef::new(NodeLabel::Commit, merge_commit_sha),
    )
}

/// Issue → Issue node.
pub fn convert_issue(issue: &RawIssue) -> GraphNode {
    GraphNode::new(issue.repo_id, NodeLabel::Issue, issue.number.to_string())
        .prop("number", json!(issue.number))
        .prop("title", json!(issue.title))
        .prop("body", json!(issue.body))
        .prop("state", json!(issue.state))
        .prop("labels", json!(issue.labels))
        .prop("created_at", json!(issue.created_at.timestamp()))
        .prop("closed_at", json!(issue.closed_at.map(|t| t.timestamp())))
}

/// `cross-referenced` event → REFERENCES at confidence 1.0.
pub fn convert_cross_reference(event: &TimelineEvent, pr_number: i64) -> GraphEdge {
    GraphEdge::new(
        event.repo_id,
        EdgeKind::References,
        NodeRef::new(NodeLabel::Issue, event.issue_number.to_string()),
        NodeRef::new(NodeLabel::PullRequest, pr_number.to_string()),
    )
    .prop("confidence", json!(1.0))
    .prop("source", json!("timeline"))
}

/// `closed` event with a source sha → CLOSED_BY at confidence 1.0.
pub fn convert_closed_by(event: &TimelineEvent, source_sha: &str) -> GraphEdge {
    GraphEdge::new(
        event.repo_id,
        EdgeKind::ClosedBy,
        NodeRef::new(NodeLabel::Issue, event.issue_number.to_string()),
        NodeRef::new(NodeLabel::Commit, source_sha),
    )
    .prop("confidence", json!(1.0))
    .prop("source", json!("timeline"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::identity::ResolutionMethod;
    use chrono::{TimeZone, Utc};

    fn resolution(input: &str, canonical: &str) -> PathResolution {
        PathResolution {
            input_path: input.to_string(),
            canonical_path: canonical.to_string(),
            historical_paths: vec![canonical.to_string()],
            confidence: 1.0,
            method: ResolutionMethod::Exact,
        }
    }

    #[test]
    fn test_commit_conversion_normalizes_author() {
        let commit = RawCommit {
            id: 1,
            repo_id: 1,
            sha: "a1b2c3".into(),
            message: "fix".into(),
            author_name: "X".into(),
            author_email: "12345+x@users.noreply.github.com".into(),
            author_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            topological_index: 0,
            raw_json: serde_json::json!({
                "files": [{"filename": "main.go", "status": "modified", "additions": 10, "deletions": 2}]
            }),
            processed: false,
        };

        let batch = convert_commit(&commit, &[resolution("main.go", "main.go")]).unwrap();

        let developer = batch
            .nodes
            .iter()
            .find(|n| n.label == NodeLabel::Developer)
            .unwrap();
        assert_eq!(developer.key, "x@users.noreply.github.com");

        let modified = batch
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Modified)
            .unwrap();
        assert_eq!(modified.props["additions"], json!(10));
        assert_eq!(modified.props["deletions"], json!(2));
        assert_eq!(modified.props["is_renamed"], json!(false));
    }

    #[test]
    fn test_commit_with_zero_files_has_no_modified_edges() {
        let commit = RawCommit {
            id: 1,
            repo_id: 1,
            sha: "empty".into(),
            message: "merge".into(),
            author_name: "x".into(),
            author_email: "x@example.com".into(),
            author_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            topological_index: 0,
            raw_json: serde_json::json!({}),
            processed: false,
        };

        let batch = convert_commit(&commit, &[]).unwrap();

        assert_eq!(batch.nodes.len(), 2); // Commit + Developer
        assert_eq!(batch.edges.len(), 1); // AUTHORED only
        assert_eq!(batch.edges[0].kind, EdgeKind::Authored);
    }

    #[test]
    fn test_renamed_path_marks_edge() {
        let commit = RawCommit {
            id: 1,
            repo_id: 1,
            sha: "c1".into(),
            message: "create".into(),
            author_name: "x".into(),
            author_email: "x@example.com".into(),
            author_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            topological_index: 0,
            raw_json: serde_json::json!({
                "files": [{"filename": "a.go", "status": "added", "additions": 5}]
            }),
            processed: false,
        };

        // Identity map already knows a.go was later renamed to b.go.
        let batch = convert_commit(&commit, &[resolution("a.go", "b.go")]).unwrap();

        let file = batch.nodes.iter().find(|n| n.label == NodeLabel::File).unwrap();
        assert_eq!(file.key, "b.go");

        let modified = batch.edges.iter().find(|e| e.kind == EdgeKind::Modified).unwrap();
        assert_eq!(modified.to_id(), "1:file:b.go");
        assert_eq!(modified.props["path_at_commit"], json!("a.go"));
        assert_eq!(modified.props["is_renamed"], json!(true));
    }

    #[test]
    fn test_issue_node_carries_integer_number() {
        let issue = RawIssue {
            id: 1,
            repo_id: 1,
            number: 7,
            title: "crash".into(),
            body: None,
            state: "closed".into(),
            labels: vec!["bug".into()],
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            closed_at: Some(Utc.timestamp_opt(1_700_050_000, 0).unwrap()),
            raw_json: serde_json::json!({}),
            processed: false,
        };

        let node = convert_issue(&issue);
        assert_eq!(node.props["number"], json!(7));
        assert!(node.props["number"].is_i64());
        assert_eq!(node.props["closed_at"], json!(1_700_050_000));
    }
}

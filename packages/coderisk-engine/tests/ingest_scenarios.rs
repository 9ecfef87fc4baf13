//! End-to-end ingest scenarios against the in-memory adapters.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use coderisk_engine::config::TimeoutConfig;
use coderisk_engine::features::graph::{
    EdgeKind, GraphStore, MemoryGraphStore, NodeLabel, ReadQuery,
};
use coderisk_engine::pipeline::{IngestPipeline, PipelineConfig};
use coderisk_storage::{
    InMemoryStagingStore, RawCommit, RawIssue, RawPullRequest, Repository, StagingStore,
    TimelineEvent, TimelineEventType,
};

fn repository() -> Repository {
    Repository {
        id: 1,
        full_name: "acme/app".into(),
        absolute_path: "/nonexistent".into(),
        default_branch: "main".into(),
    }
}

fn commit(topo: i64, sha: &str, email: &str, files: serde_json::Value) -> RawCommit {
    RawCommit {
        id: 0,
        repo_id: 1,
        sha: sha.into(),
        message: format!("commit {}", sha),
        author_name: "x".into(),
        author_email: email.into(),
        author_date: Utc.timestamp_opt(1_700_000_000 + topo * 60, 0).unwrap(),
        topological_index: topo,
        raw_json: json!({ "files": files }),
        processed: false,
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

/// Scenario 1: one commit produces Commit + Developer + File + AUTHORED +
/// MODIFIED with the payload's line counts.
#[tokio::test]
async fn minimal_build() {
    let staging = Arc::new(InMemoryStagingStore::new());
    staging.upsert_repository(&repository()).await.unwrap();
    staging
        .insert_commits(&[commit(
            0,
            "a1b2c3",
            "x@u.noreply",
            json!([{"filename": "main.go", "status": "modified", "additions": 10, "deletions": 2}]),
        )])
        .await
        .unwrap();

    let graph = MemoryGraphStore::new();
    pipeline(staging, graph.clone()).run(1, false, false).await.unwrap();

    assert!(graph.get_node("1:commit:a1b2c3").is_some());
    let developer = graph.get_node("1:developer:x@u.noreply").unwrap();
    assert_eq!(developer.props["email"], json!("x@u.noreply"));

    let file = graph.get_node("1:file:main.go").unwrap();
    assert_eq!(file.props["canonical_path"], json!("main.go"));

    assert!(graph
        .get_edge(EdgeKind::Authored, "1:developer:x@u.noreply", "1:commit:a1b2c3")
        .is_some());
    let modified = graph
        .get_edge(EdgeKind::Modified, "1:commit:a1b2c3", "1:file:main.go")
        .unwrap();
    assert_eq!(modified.props["additions"], json!(10));
    assert_eq!(modified.props["deletions"], json!(2));
}

/// Scenario 2: a numeric-prefixed noreply author lands on the same
/// Developer node; the node count does not grow.
#[tokio::test]
async fn email_normalization_folds_developers() {
    let staging = Arc::new(InMemoryStagingStore::new());
    staging.upsert_repository(&repository()).await.unwrap();
    staging
        .insert_commits(&[
            commit(0, "c1", "x@users.noreply.github.com", json!([])),
            commit(1, "c2", "12345+x@users.noreply.github.com", json!([])),
        ])
        .await
        .unwrap();

    let graph = MemoryGraphStore::new();
    pipeline(staging, graph.clone()).run(1, false, false).await.unwrap();

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

/// Scenario 3: a rename chain collapses to one File node keyed on the
/// canonical path, with per-commit path/rename markers on the edges.
#[tokio::test]
async fn rename_chain_builds_single_identity() {
    let staging = Arc::new(InMemoryStagingStore::new());
    staging.upsert_repository(&repository()).await.unwrap();
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

    let graph = MemoryGraphStore::new();
    pipeline(staging.clone(), graph.clone()).run(1, false, false).await.unwrap();

    let identity = staging.get_file_identity(1, "b.go").await.unwrap().unwrap();
    assert_eq!(identity.canonical_path, "b.go");
    assert_eq!(identity.historical_paths, vec!["a.go", "b.go"]);

    let files = graph
        .read(ReadQuery::NodesByLabel {
            repo_id: 1,
            label: NodeLabel::File,
        })
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], json!("1:file:b.go"));

    let c1 = graph
        .get_edge(EdgeKind::Modified, "1:commit:c1", "1:file:b.go")
        .unwrap();
    assert_eq!(c1.props["path_at_commit"], json!("a.go"));
    assert_eq!(c1.props["is_renamed"], json!(true));

    let c3 = graph
        .get_edge(EdgeKind::Modified, "1:commit:c3", "1:file:b.go")
        .unwrap();
    assert_eq!(c3.props["path_at_commit"], json!("b.go"));
    assert_eq!(c3.props["is_renamed"], json!(false));
}

/// Scenario 4: timeline-derived REFERENCES / CLOSED_BY at confidence 1.0
/// survive a full re-ingest (including the Linker) unchanged.
#[tokio::test]
async fn timeline_links_survive_reingest() {
    let staging = Arc::new(InMemoryStagingStore::new());
    staging.upsert_repository(&repository()).await.unwrap();
    staging
        .insert_commits(&[commit(0, "deadbeef", "x@e.com", json!([]))])
        .await
        .unwrap();
    staging
        .insert_prs(&[RawPullRequest {
            id: 0,
            repo_id: 1,
            number: 9,
            title: "a fix".into(),
            body: None,
            state: "closed".into(),
            merged: true,
            merged_at: Some(Utc.timestamp_opt(1_700_000_500, 0).unwrap()),
            merge_commit_sha: Some("deadbeef".into()),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            raw_json: json!({"user": {"login": "x"}}),
            processed: false,
        }])
        .await
        .unwrap();
    staging
        .insert_issues(&[RawIssue {
            id: 0,
            repo_id: 1,
            number: 7,
            title: "crash".into(),
            body: None,
            state: "closed".into(),
            labels: vec![],
            created_at: Utc.timestamp_opt(1_699_000_000, 0).unwrap(),
            closed_at: Some(Utc.timestamp_opt(1_700_090_000, 0).unwrap()),
            raw_json: json!({}),
            processed: false,
        }])
        .await
        .unwrap();
    staging
        .insert_timeline_events(&[
            TimelineEvent {
                id: 0,
                repo_id: 1,
                issue_number: 7,
                event_type: TimelineEventType::CrossReferenced,
                source_type: Some("pull_request".into()),
                source_number: Some(9),
                source_sha: None,
                actor: Some("x".into()),
                at: Utc.timestamp_opt(1_700_000_600, 0).unwrap(),
            },
            TimelineEvent {
                id: 0,
                repo_id: 1,
                issue_number: 7,
                event_type: TimelineEventType::Closed,
                source_type: None,
                source_number: None,
                source_sha: Some("deadbeef".into()),
                actor: Some("x".into()),
                at: Utc.timestamp_opt(1_700_090_000, 0).unwrap(),
            },
        ])
        .await
        .unwrap();

    let graph = MemoryGraphStore::new();
    let pipeline = pipeline(staging, graph.clone());

    pipeline.run(1, false, false).await.unwrap();

    let references = graph
        .get_edge(EdgeKind::References, "1:issue:7", "1:pr:9")
        .unwrap();
    assert_eq!(references.props["confidence"], json!(1.0));
    assert_eq!(references.props["source"], json!("timeline"));

    let closed_by = graph
        .get_edge(EdgeKind::ClosedBy, "1:issue:7", "1:commit:deadbeef")
        .unwrap();
    assert_eq!(closed_by.props["confidence"], json!(1.0));

    // Second ingest: same graph state, edge properties untouched.
    pipeline.run(1, false, false).await.unwrap();

    let references_after = graph
        .get_edge(EdgeKind::References, "1:issue:7", "1:pr:9")
        .unwrap();
    assert_eq!(references, references_after);
    let closed_by_after = graph
        .get_edge(EdgeKind::ClosedBy, "1:issue:7", "1:commit:deadbeef")
        .unwrap();
    assert_eq!(closed_by, closed_by_after);
}

/// Running ingest twice produces the same final node/edge counts as
/// running it once.
#[tokio::test]
async fn reingest_is_idempotent() {
    let staging = Arc::new(InMemoryStagingStore::new());
    staging.upsert_repository(&repository()).await.unwrap();
    staging
        .insert_commits(&[
            commit(0, "c1", "a@e.com", json!([{"filename": "x.rs", "status": "added", "additions": 5}])),
            commit(1, "c2", "b@e.com", json!([{"filename": "y.rs", "status": "added", "additions": 7}])),
        ])
        .await
        .unwrap();

    let graph = MemoryGraphStore::new();
    let pipeline = pipeline(staging, graph.clone());

    pipeline.run(1, false, true).await.unwrap();
    let nodes = graph.node_count();
    let edges = graph.edge_count();

    let report = pipeline.run(1, false, true).await.unwrap();
    assert_eq!(graph.node_count(), nodes);
    assert_eq!(graph.edge_count(), edges);
    assert!(report.verify_issues.is_empty());
}

/// A merged PR with no merge commit produces a PR node but no MERGED_AS.
#[tokio::test]
async fn merged_pr_without_sha_has_no_merged_as_edge() {
    let staging = Arc::new(InMemoryStagingStore::new());
    staging.upsert_repository(&repository()).await.unwrap();
    staging
        .insert_prs(&[RawPullRequest {
            id: 0,
            repo_id: 1,
            number: 3,
            title: "dangling merge".into(),
            body: None,
            state: "closed".into(),
            merged: true,
            merged_at: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            merge_commit_sha: None,
            created_at: Utc.timestamp_opt(1_699_990_000, 0).unwrap(),
            raw_json: json!({"user": {"login": "x"}}),
            processed: false,
        }])
        .await
        .unwrap();

    let graph = MemoryGraphStore::new();
    pipeline(staging, graph.clone()).run(1, false, false).await.unwrap();

    assert!(graph.get_node("1:pr:3").is_some());
    let merged_as = graph
        .read(ReadQuery::EdgesOfKind {
            repo_id: 1,
            kind: EdgeKind::MergedAs,
        })
        .await
        .unwrap();
    assert!(merged_as.is_empty());
}

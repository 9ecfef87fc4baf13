//! Risk-engine scenarios: Phase-1 escalation and Phase-2 degradation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;

use coderisk_engine::config::TimeoutConfig;
use coderisk_engine::features::graph::{
    EdgeKind, GraphEdge, GraphNode, GraphStore, MemoryGraphStore, NodeLabel, NodeRef,
};
use coderisk_engine::features::identity::FileIdentityResolver;
use coderisk_engine::features::llm::{
    ChatRequest, ChatResponse, LlmError, LlmProvider, LlmResult,
};
use coderisk_engine::features::risk::{AssessmentSource, CheckOptions, RiskEngine, RiskLevel};
use coderisk_storage::{InMemoryStagingStore, Repository};

fn repository() -> Repository {
    Repository {
        id: 1,
        full_name: "acme/app".into(),
        absolute_path: "/nonexistent".into(),
        default_branch: "main".into(),
    }
}

/// Graph where `core/auth.go` has 25 structural neighbors, a 0.7 max
/// co-change frequency, and 4 incidents in the window.
async fn hot_file_graph() -> MemoryGraphStore {
    let graph = MemoryGraphStore::new();
    let now = Utc::now().timestamp();

    let mut nodes = vec![GraphNode::new(1, NodeLabel::File, "core/auth.go")
        .prop("canonical_path", json!("core/auth.go"))];
    let mut edges = Vec::new();

    for i in 0..25 {
        let path = format!("dep{}.go", i);
        nodes.push(GraphNode::new(1, NodeLabel::File, &path).prop("canonical_path", json!(path)));
        edges.push(GraphEdge::new(
            1,
            EdgeKind::Imports,
            NodeRef::new(NodeLabel::File, format!("dep{}.go", i)),
            NodeRef::new(NodeLabel::File, "core/auth.go"),
        ));
    }

    nodes.push(
        GraphNode::new(1, NodeLabel::File, "core/session.go")
            .prop("canonical_path", json!("core/session.go")),
    );
    for i in 0..10 {
        let sha = format!("c{}", i);
        nodes.push(
            GraphNode::new(1, NodeLabel::Commit, &sha)
                .prop("committed_at", json!(now - 3_600 * (i as i64 + 1)))
                .prop("on_default_branch", json!(true)),
        );
        edges.push(GraphEdge::new(
            1,
            EdgeKind::Modified,
            NodeRef::new(NodeLabel::Commit, &sha),
            NodeRef::new(NodeLabel::File, "core/auth.go"),
        ));
        if i < 7 {
            edges.push(GraphEdge::new(
                1,
                EdgeKind::Modified,
                NodeRef::new(NodeLabel::Commit, &sha),
                NodeRef::new(NodeLabel::File, "core/session.go"),
            ));
        }
    }

    for i in 0..4 {
        let number = (100 + i).to_string();
        nodes.push(
            GraphNode::new(1, NodeLabel::Issue, &number)
                .prop("number", json!(100 + i))
                .prop("title", json!(format!("incident {}", i)))
                .prop("state", json!("closed"))
                .prop("closed_at", json!(now - 86_400 * (i as i64 + 1))),
        );
        edges.push(GraphEdge::new(
            1,
            EdgeKind::ClosedBy,
            NodeRef::new(NodeLabel::Issue, &number),
            NodeRef::new(NodeLabel::Commit, format!("c{}", i)),
        ));
    }

    graph.merge_nodes(&nodes).await.unwrap();
    graph.merge_edges(&edges).await.unwrap();
    graph
}

/// Scenario 6: with the LLM disabled the command returns HIGH with
/// metric evidence, exit 0 normally and 1 in pre-commit mode.
#[tokio::test]
async fn escalation_without_llm_reports_phase1_high() {
    let graph = Arc::new(hot_file_graph().await);
    let staging = Arc::new(InMemoryStagingStore::new());
    let resolver = FileIdentityResolver::new(staging, 1, None);
    let engine = RiskEngine::new(graph, None, TimeoutConfig::default());

    let report = engine
        .check(
            &repository(),
            &resolver,
            &["core/auth.go".to_string()],
            CheckOptions {
                no_ai: true,
                pre_commit: false,
            },
        )
        .await
        .unwrap();

    let file = &report.files[0];
    assert_eq!(file.tier1.coupling.value, 25.0);
    assert_eq!(file.tier1.coupling.score, 1.0);
    assert!((file.tier1.co_change.value - 0.7).abs() < 1e-9);
    assert_eq!(file.tier1.incidents.value, 4.0);
    assert_eq!(file.tier1.overall_risk, RiskLevel::High);
    assert!(file.tier1.should_escalate);

    assert_eq!(file.assessment.risk_level, RiskLevel::High);
    assert_eq!(file.assessment.source, AssessmentSource::Phase1);
    let evidence = file.tier1.evidence();
    assert_eq!(evidence.len(), 3);
    assert!(evidence[0].contains("25"));

    assert_eq!(report.exit_code(false), 0);
    assert_eq!(report.exit_code(true), 1);
}

struct RateLimitedProvider;

#[async_trait]
impl LlmProvider for RateLimitedProvider {
    async fn complete(&self, _request: &ChatRequest) -> LlmResult<ChatResponse> {
        Err(LlmError::RateLimited("HTTP 429".into()))
    }

    fn name(&self) -> &str {
        "rate-limited"
    }
}

/// A rate-limited Phase 2 degrades to Phase-1 output and the command
/// still succeeds.
#[tokio::test]
async fn rate_limited_investigation_degrades_gracefully() {
    let graph = Arc::new(hot_file_graph().await);
    let staging = Arc::new(InMemoryStagingStore::new());
    let resolver = FileIdentityResolver::new(staging, 1, None);
    let engine = RiskEngine::new(
        graph,
        Some(Arc::new(RateLimitedProvider)),
        TimeoutConfig::default(),
    );

    let report = engine
        .check(
            &repository(),
            &resolver,
            &["core/auth.go".to_string()],
            CheckOptions::default(),
        )
        .await
        .unwrap();

    let file = &report.files[0];
    assert_eq!(file.assessment.source, AssessmentSource::DegradedRateLimited);
    assert_eq!(file.assessment.risk_level, RiskLevel::High);
    assert!(file.trace.is_none());
}

struct VerdictProvider;

#[async_trait]
impl LlmProvider for VerdictProvider {
    async fn complete(&self, _request: &ChatRequest) -> LlmResult<ChatResponse> {
        Ok(ChatResponse {
            content: Some(
                "{\"risk_level\": \"CRITICAL\", \"confidence\": 0.9, \
                 \"reasoning\": \"auth hub with incident history\"}"
                    .into(),
            ),
            tool_call: None,
            tokens_used: 64,
        })
    }

    fn name(&self) -> &str {
        "verdict"
    }
}

/// A working Phase 2 overrides the Phase-1 level and carries its trace.
#[tokio::test]
async fn investigation_verdict_wins_over_phase1() {
    let graph = Arc::new(hot_file_graph().await);
    let staging = Arc::new(InMemoryStagingStore::new());
    let resolver = FileIdentityResolver::new(staging, 1, None);
    let engine = RiskEngine::new(
        graph,
        Some(Arc::new(VerdictProvider)),
        TimeoutConfig::default(),
    );

    let report = engine
        .check(
            &repository(),
            &resolver,
            &["core/auth.go".to_string()],
            CheckOptions::default(),
        )
        .await
        .unwrap();

    let file = &report.files[0];
    assert_eq!(file.assessment.risk_level, RiskLevel::Critical);
    assert_eq!(file.assessment.source, AssessmentSource::Investigation);
    assert_eq!(file.assessment.confidence, 0.9);
    assert!(file.trace.is_some());
}

//! In-memory graph store (for testing).
//!
//! HashMap-based implementation evaluating the fixed read set natively.
//! NOT for production use.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use crate::features::graph::domain::{
    EdgeFilter, EdgeKind, GraphEdge, GraphNode, GraphStore, NodeLabel, ReadQuery, Row,
};
use crate::shared::models::{composite_id, Result};

type EdgeKey = (EdgeKind, String, String);

#[derive(Default)]
struct GraphData {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<EdgeKey, GraphEdge>,
}

#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    data: Arc<RwLock<GraphData>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.data.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.data.read().edges.len()
    }

    /// Fetch a node by composite ID (test helper).
    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        self.data.read().nodes.get(id).cloned()
    }

    /// Fetch an edge by `(kind, from_id, to_id)` (test helper).
    pub fn get_edge(&self, kind: EdgeKind, from_id: &str, to_id: &str) -> Option<GraphEdge> {
        self.data
            .read()
            .edges
            .get(&(kind, from_id.to_string(), to_id.to_string()))
            .cloned()
    }
}

fn prop_i64(node: &GraphNode, name: &str) -> Option<i64> {
    node.props.get(name).and_then(Value::as_i64)
}

fn prop_str<'a>(node: &'a GraphNode, name: &str) -> Option<&'a str> {
    node.props.get(name).and_then(Value::as_str)
}

fn prop_bool(node: &GraphNode, name: &str) -> Option<bool> {
    node.props.get(name).and_then(Value::as_bool)
}

impl GraphData {
    fn file_id(&self, repo_id: i64, canonical_path: &str) -> String {
        composite_id(repo_id, NodeLabel::File.type_tag(), canonical_path)
    }

    /// Neighbor IDs over IMPORTS/CALLS, both directions.
    fn structural_neighbors(&self, file_id: &str) -> HashSet<String> {
        let mut neighbors = HashSet::new();
        for ((kind, from, to), _) in self.edges.iter() {
            if !matches!(kind, EdgeKind::Imports | EdgeKind::Calls) {
                continue;
            }
            if from == file_id {
                neighbors.insert(to.clone());
            } else if to == file_id {
                neighbors.insert(from.clone());
            }
        }
        neighbors
    }

    /// IDs of commits that modified any of the given file IDs, optionally
    /// restricted to the default branch and a time window.
    fn commits_modifying(
        &self,
        file_ids: &HashSet<String>,
        since_epoch: Option<i64>,
        default_branch_only: bool,
    ) -> HashSet<String> {
        let mut commits = HashSet::new();
        for ((kind, from, to), _) in self.edges.iter() {
            if *kind != EdgeKind::Modified || !file_ids.contains(to) {
                continue;
            }
            let Some(commit) = self.nodes.get(from) else {
                continue;
            };
            if default_branch_only && !prop_bool(commit, "on_default_branch").unwrap_or(true) {
                continue;
            }
            if let Some(since) = since_epoch {
                if prop_i64(commit, "committed_at").unwrap_or(i64::MIN) < since {
                    continue;
                }
            }
            commits.insert(from.clone());
        }
        commits
    }

    /// Closed issues linked to the given commit set via CLOSED_BY /
    /// FIXED_BY directly, or REFERENCES / FIXED_BY through a merged PR.
    fn incidents(&self, repo_id: i64, commit_ids: &HashSet<String>, since_epoch: i64) -> Vec<Row> {
        let merged_prs: HashSet<String> = self
            .edges
            .iter()
            .filter(|((kind, _, to), _)| *kind == EdgeKind::MergedAs && commit_ids.contains(to))
            .map(|((_, from, _), _)| from.clone())
            .collect();

        let mut rows = Vec::new();
        for node in self.nodes.values() {
            if node.repo_id != repo_id || node.label != NodeLabel::Issue {
                continue;
            }
            if prop_str(node, "state") != Some("closed") {
                continue;
            }
            let closed_at = prop_i64(node, "closed_at").unwrap_or(i64::MIN);
            if closed_at < since_epoch {
                continue;
            }

            let issue_id = node.id();
            let linked = self.edges.iter().any(|((kind, from, to), _)| {
                if from != &issue_id {
                    return false;
                }
                match kind {
                    EdgeKind::ClosedBy | EdgeKind::FixedBy if commit_ids.contains(to) => true,
                    EdgeKind::References | EdgeKind::FixedBy if merged_prs.contains(to) => true,
                    _ => false,
                }
            });

            if linked {
                let mut row = Map::new();
                row.insert(
                    "issue_number".into(),
                    json!(node.key.parse::<i64>().unwrap_or_default()),
                );
                row.insert(
                    "title".into(),
                    node.props.get("title").cloned().unwrap_or(Value::Null),
                );
                row.insert("closed_at".into(), json!(closed_at));
                rows.push(row);
            }
        }
        rows.sort_by_key(|r| r.get("issue_number").and_then(Value::as_i64));
        rows
    }

    fn file_ids(&self, repo_id: i64, paths: &[String]) -> HashSet<String> {
        paths.iter().map(|p| self.file_id(repo_id, p)).collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize> {
        let mut data = self.data.write();
        let mut created = 0;
        for node in nodes {
            let id = node.id();
            match data.nodes.get_mut(&id) {
                Some(existing) => {
                    for (name, value) in node.props.iter() {
                        existing.props.insert(name.clone(), value.clone());
                    }
                }
                None => {
                    data.nodes.insert(id, node.clone());
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
        let mut data = self.data.write();
        let mut created = 0;
        for edge in edges {
            let key = (edge.kind, edge.from_id(), edge.to_id());
            match data.edges.get_mut(&key) {
                Some(existing) => {
                    for (name, value) in edge.props.iter() {
                        existing.props.insert(name.clone(), value.clone());
                    }
                }
                None => {
                    data.edges.insert(key, edge.clone());
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    async fn delete_edges(&self, filter: &EdgeFilter) -> Result<usize> {
        let mut data = self.data.write();
        let before = data.edges.len();
        data.edges
            .retain(|_, edge| !(edge.repo_id == filter.repo_id && filter.kinds.contains(&edge.kind)));
        Ok(before - data.edges.len())
    }

    async fn read(&self, query: ReadQuery) -> Result<Vec<Row>> {
        let data = self.data.read();
        let rows = match query {
            ReadQuery::StructuralCoupling {
                repo_id,
                canonical_path,
            } => {
                let file_id = data.file_id(repo_id, &canonical_path);
                let count = data.structural_neighbors(&file_id).len();
                vec![Map::from_iter([("count".to_string(), json!(count))])]
            }

            ReadQuery::CoChangeRows {
                repo_id,
                canonical_path,
                since_epoch,
            } => {
                let file_id = data.file_id(repo_id, &canonical_path);
                let file_ids = HashSet::from([file_id.clone()]);
                let commits = data.commits_modifying(&file_ids, Some(since_epoch), true);
                let total = commits.len();

                let mut together: HashMap<String, usize> = HashMap::new();
                for ((kind, from, to), _) in data.edges.iter() {
                    if *kind == EdgeKind::Modified && commits.contains(from) && to != &file_id {
                        if let Some(other) = data.nodes.get(to) {
                            if other.label == NodeLabel::File {
                                *together.entry(other.key.clone()).or_default() += 1;
                            }
                        }
                    }
                }

                let mut rows: Vec<Row> = together
                    .into_iter()
                    .map(|(other_path, count)| {
                        Map::from_iter([
                            ("other_path".to_string(), json!(other_path)),
                            ("together".to_string(), json!(count)),
                            ("total".to_string(), json!(total)),
                        ])
                    })
                    .collect();
                rows.sort_by_key(|r| {
                    r.get("other_path")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                });
                rows
            }

            ReadQuery::IncidentRows {
                repo_id,
                canonical_paths,
                since_epoch,
            } => {
                let file_ids = data.file_ids(repo_id, &canonical_paths);
                let commits = data.commits_modifying(&file_ids, None, false);
                data.incidents(repo_id, &commits, since_epoch)
            }

            ReadQuery::OwnershipRows {
                repo_id,
                canonical_paths,
            } => {
                let file_ids = data.file_ids(repo_id, &canonical_paths);
                let commits = data.commits_modifying(&file_ids, None, false);

                struct Owned {
                    commits: usize,
                    first_at: i64,
                    last_at: i64,
                }
                let mut owners: HashMap<String, Owned> = HashMap::new();
                for ((kind, from, to), _) in data.edges.iter() {
                    if *kind != EdgeKind::Authored || !commits.contains(to) {
                        continue;
                    }
                    let Some(developer) = data.nodes.get(from) else {
                        continue;
                    };
                    let at = data
                        .nodes
                        .get(to)
                        .and_then(|c| prop_i64(c, "committed_at"))
                        .unwrap_or_default();
                    let entry = owners.entry(developer.key.clone()).or_insert(Owned {
                        commits: 0,
                        first_at: at,
                        last_at: at,
                    });
                    entry.commits += 1;
                    entry.first_at = entry.first_at.min(at);
                    entry.last_at = entry.last_at.max(at);
                }

                let mut rows: Vec<Row> = owners
                    .into_iter()
                    .map(|(developer, owned)| {
                        Map::from_iter([
                            ("developer".to_string(), json!(developer)),
                            ("commits".to_string(), json!(owned.commits)),
                            ("first_at".to_string(), json!(owned.first_at)),
                            ("last_at".to_string(), json!(owned.last_at)),
                        ])
                    })
                    .collect();
                rows.sort_by_key(|r| {
                    std::cmp::Reverse(r.get("commits").and_then(Value::as_u64).unwrap_or_default())
                });
                rows
            }

            ReadQuery::BlastRadius {
                repo_id,
                canonical_path,
                since_epoch,
            } => {
                let file_id = data.file_id(repo_id, &canonical_path);
                let dependents: Vec<String> = data
                    .edges
                    .iter()
                    .filter(|((kind, _, to), _)| {
                        matches!(kind, EdgeKind::Imports | EdgeKind::Calls) && to == &file_id
                    })
                    .filter_map(|((_, from, _), _)| {
                        data.nodes
                            .get(from)
                            .filter(|n| n.label == NodeLabel::File)
                            .map(|n| n.key.clone())
                    })
                    .collect();

                let mut rows = Vec::new();
                for dependent in dependents {
                    let ids = data.file_ids(repo_id, std::slice::from_ref(&dependent));
                    let commits = data.commits_modifying(&ids, None, false);
                    let incidents = data.incidents(repo_id, &commits, since_epoch).len();
                    rows.push(Map::from_iter([
                        ("dependent_path".to_string(), json!(dependent)),
                        ("incident_count".to_string(), json!(incidents)),
                    ]));
                }
                rows.sort_by_key(|r| {
                    r.get("dependent_path")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                });
                rows
            }

            ReadQuery::EdgesOfKind { repo_id, kind } => {
                let mut rows: Vec<Row> = data
                    .edges
                    .values()
                    .filter(|e| e.repo_id == repo_id && e.kind == kind)
                    .map(|e| {
                        Map::from_iter([
                            ("from_id".to_string(), json!(e.from_id())),
                            ("to_id".to_string(), json!(e.to_id())),
                            ("props".to_string(), Value::Object(e.props.clone())),
                        ])
                    })
                    .collect();
                rows.sort_by_key(|r| {
                    (
                        r.get("from_id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        r.get("to_id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    )
                });
                rows
            }

            ReadQuery::NodesByLabel { repo_id, label } => {
                let mut rows: Vec<Row> = data
                    .nodes
                    .values()
                    .filter(|n| n.repo_id == repo_id && n.label == label)
                    .map(|n| {
                        Map::from_iter([
                            ("id".to_string(), json!(n.id())),
                            ("props".to_string(), Value::Object(n.props.clone())),
                        ])
                    })
                    .collect();
                rows.sort_by_key(|r| {
                    r.get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                });
                rows
            }

            ReadQuery::CountsByLabel { repo_id } => NodeLabel::ALL
                .iter()
                .map(|label| {
                    let count = data
                        .nodes
                        .values()
                        .filter(|n| n.repo_id == repo_id && n.label == *label)
                        .count();
                    Map::from_iter([
                        ("label".to_string(), json!(label.as_str())),
                        ("count".to_string(), json!(count)),
                    ])
                })
                .collect(),

            ReadQuery::LinkQualitySummary { repo_id } => {
                let closed_issues = data
                    .nodes
                    .values()
                    .filter(|n| {
                        n.repo_id == repo_id
                            && n.label == NodeLabel::Issue
                            && prop_str(n, "state") == Some("closed")
                    })
                    .count();
                let fixed_links: HashSet<&String> = data
                    .edges
                    .iter()
                    .filter(|((kind, _, _), edge)| {
                        *kind == EdgeKind::FixedBy && edge.repo_id == repo_id
                    })
                    .map(|((_, from, _), _)| from)
                    .collect();

                vec![Map::from_iter([
                    ("closed_issues".to_string(), json!(closed_issues)),
                    ("fixed_links".to_string(), json!(fixed_links.len())),
                ])]
            }
        };

        Ok(rows)
    }

    async fn delete_repo(&self, repo_id: i64) -> Result<()> {
        let mut data = self.data.write();
        data.nodes.retain(|_, n| n.repo_id != repo_id);
        data.edges.retain(|_, e| e.repo_id != repo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::graph::domain::NodeRef;

    fn file(repo: i64, path: &str) -> GraphNode {
        GraphNode::new(repo, NodeLabel::File, path).prop("canonical_path", json!(path))
    }

    fn commit(repo: i64, sha: &str, at: i64) -> GraphNode {
        GraphNode::new(repo, NodeLabel::Commit, sha)
            .prop("committed_at", json!(at))
            .prop("on_default_branch", json!(true))
    }

    fn modified(repo: i64, sha: &str, path: &str) -> GraphEdge {
        GraphEdge::new(
            repo,
            EdgeKind::Modified,
            NodeRef::new(NodeLabel::Commit, sha),
            NodeRef::new(NodeLabel::File, path),
        )
    }

    #[tokio::test]
    async fn test_merge_nodes_is_idempotent() {
        let store = MemoryGraphStore::new();
        let created = store.merge_nodes(&[file(1, "a.rs")]).await.unwrap();
        assert_eq!(created, 1);

        let created = store.merge_nodes(&[file(1, "a.rs")]).await.unwrap();
        assert_eq!(created, 0);
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn test_merge_edges_updates_props_in_place() {
        let store = MemoryGraphStore::new();
        store
            .merge_nodes(&[file(1, "a.rs"), commit(1, "c1", 100)])
            .await
            .unwrap();

        let edge = modified(1, "c1", "a.rs").prop("additions", json!(5));
        store.merge_edges(&[edge]).await.unwrap();

        let edge = modified(1, "c1", "a.rs").prop("additions", json!(9));
        let created = store.merge_edges(&[edge]).await.unwrap();
        assert_eq!(created, 0);

        let stored = store
            .get_edge(EdgeKind::Modified, "1:commit:c1", "1:file:a.rs")
            .unwrap();
        assert_eq!(stored.props["additions"], json!(9));
    }

    #[tokio::test]
    async fn test_structural_coupling_counts_both_directions() {
        let store = MemoryGraphStore::new();
        store
            .merge_nodes(&[file(1, "core.rs"), file(1, "a.rs"), file(1, "b.rs")])
            .await
            .unwrap();
        store
            .merge_edges(&[
                GraphEdge::new(
                    1,
                    EdgeKind::Imports,
                    NodeRef::new(NodeLabel::File, "a.rs"),
                    NodeRef::new(NodeLabel::File, "core.rs"),
                ),
                GraphEdge::new(
                    1,
                    EdgeKind::Calls,
                    NodeRef::new(NodeLabel::File, "core.rs"),
                    NodeRef::new(NodeLabel::File, "b.rs"),
                ),
            ])
            .await
            .unwrap();

        let rows = store
            .read(ReadQuery::StructuralCoupling {
                repo_id: 1,
                canonical_path: "core.rs".into(),
            })
            .await
            .unwrap();
        assert_eq!(rows[0]["count"], json!(2));
    }

    #[tokio::test]
    async fn test_co_change_rows_share_commit_totals() {
        let store = MemoryGraphStore::new();
        store
            .merge_nodes(&[
                file(1, "a.rs"),
                file(1, "b.rs"),
                commit(1, "c1", 100),
                commit(1, "c2", 200),
            ])
            .await
            .unwrap();
        store
            .merge_edges(&[
                modified(1, "c1", "a.rs"),
                modified(1, "c1", "b.rs"),
                modified(1, "c2", "a.rs"),
            ])
            .await
            .unwrap();

        let rows = store
            .read(ReadQuery::CoChangeRows {
                repo_id: 1,
                canonical_path: "a.rs".into(),
                since_epoch: 0,
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["other_path"], json!("b.rs"));
        assert_eq!(rows[0]["together"], json!(1));
        assert_eq!(rows[0]["total"], json!(2));
    }

    #[tokio::test]
    async fn test_delete_edges_only_touches_selected_kinds() {
        let store = MemoryGraphStore::new();
        store
            .merge_nodes(&[
                GraphNode::new(1, NodeLabel::Issue, "7").prop("state", json!("closed")),
                GraphNode::new(1, NodeLabel::PullRequest, "9"),
            ])
            .await
            .unwrap();
        store
            .merge_edges(&[
                GraphEdge::new(
                    1,
                    EdgeKind::References,
                    NodeRef::new(NodeLabel::Issue, "7"),
                    NodeRef::new(NodeLabel::PullRequest, "9"),
                ),
                GraphEdge::new(
                    1,
                    EdgeKind::FixedBy,
                    NodeRef::new(NodeLabel::Issue, "7"),
                    NodeRef::new(NodeLabel::PullRequest, "9"),
                ),
            ])
            .await
            .unwrap();

        let removed = store
            .delete_edges(&EdgeFilter {
                repo_id: 1,
                kinds: vec![EdgeKind::FixedBy, EdgeKind::AssociatedWith],
            })
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store
            .get_edge(EdgeKind::References, "1:issue:7", "1:pr:9")
            .is_some());
    }
}

//! Graph node and edge models.
//!
//! Nodes are keyed by composite ID `"<repo_id>:<type>:<identifier>"` so
//! multiple repositories coexist in one database. Properties travel as
//! JSON maps; timestamps are integer Unix seconds (UTC). PR and Issue
//! nodes additionally carry their `number` as an integer property because
//! the underlying store distinguishes integer and string types during
//! MATCH.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::models::composite_id;

/// Cypher store flavor. The wire protocol is shared; only schema DDL
/// differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFlavor {
    Neo4j,
    Memgraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    File,
    Developer,
    Commit,
    PullRequest,
    Issue,
    CodeBlock,
}

impl NodeLabel {
    /// Cypher label.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::File => "File",
            NodeLabel::Developer => "Developer",
            NodeLabel::Commit => "Commit",
            NodeLabel::PullRequest => "PullRequest",
            NodeLabel::Issue => "Issue",
            NodeLabel::CodeBlock => "CodeBlock",
        }
    }

    /// Type tag used inside composite IDs.
    pub fn type_tag(&self) -> &'static str {
        match self {
            NodeLabel::File => "file",
            NodeLabel::Developer => "developer",
            NodeLabel::Commit => "commit",
            NodeLabel::PullRequest => "pr",
            NodeLabel::Issue => "issue",
            NodeLabel::CodeBlock => "codeblock",
        }
    }

    pub const ALL: [NodeLabel; 6] = [
        NodeLabel::File,
        NodeLabel::Developer,
        NodeLabel::Commit,
        NodeLabel::PullRequest,
        NodeLabel::Issue,
        NodeLabel::CodeBlock,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Developer → Commit
    Authored,
    /// Commit → File, carries `{additions, deletions, status}`
    Modified,
    /// Developer → PR
    Created,
    /// PR → Commit
    MergedAs,
    /// Issue → PR, 100%-confidence timeline derivation
    References,
    /// Issue → Commit, 100%-confidence timeline derivation
    ClosedBy,
    /// Issue → PR or Commit, multi-signal ground truth
    FixedBy,
    /// Issue → PR or Commit, fallback classification
    AssociatedWith,
    /// CodeBlock → CodeBlock
    RenamedFrom,
    /// CodeBlock → CodeBlock
    ImportsFrom,
    /// File → File, maintained by the structural layer
    Imports,
    /// File → File, maintained by the structural layer
    Calls,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Authored => "AUTHORED",
            EdgeKind::Modified => "MODIFIED",
            EdgeKind::Created => "CREATED",
            EdgeKind::MergedAs => "MERGED_AS",
            EdgeKind::References => "REFERENCES",
            EdgeKind::ClosedBy => "CLOSED_BY",
            EdgeKind::FixedBy => "FIXED_BY",
            EdgeKind::AssociatedWith => "ASSOCIATED_WITH",
            EdgeKind::RenamedFrom => "RENAMED_FROM",
            EdgeKind::ImportsFrom => "IMPORTS_FROM",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::Calls => "CALLS",
        }
    }
}

/// Reference to a node by label and identifier (repo scope comes from the
/// surrounding edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }

    pub fn id(&self, repo_id: i64) -> String {
        composite_id(repo_id, self.label.type_tag(), &self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub repo_id: i64,
    pub label: NodeLabel,
    /// Identifier within `(repo_id, label)`: canonical path, normalized
    /// email, sha, or number rendered as text.
    pub key: String,
    pub props: Map<String, Value>,
}

impl GraphNode {
    pub fn new(repo_id: i64, label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            repo_id,
            label,
            key: key.into(),
            props: Map::new(),
        }
    }

    pub fn prop(mut self, name: &str, value: Value) -> Self {
        self.props.insert(name.to_string(), value);
        self
    }

    pub fn id(&self) -> String {
        composite_id(self.repo_id, self.label.type_tag(), &self.key)
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.label, self.key.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub repo_id: i64,
    pub kind: EdgeKind,
    pub from: NodeRef,
    pub to: NodeRef,
    pub props: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(repo_id: i64, kind: EdgeKind, from: NodeRef, to: NodeRef) -> Self {
        Self {
            repo_id,
            kind,
            from,
            to,
            props: Map::new(),
        }
    }

    pub fn prop(mut self, name: &str, value: Value) -> Self {
        self.props.insert(name.to_string(), value);
        self
    }

    pub fn from_id(&self) -> String {
        self.from.id(self.repo_id)
    }

    pub fn to_id(&self) -> String {
        self.to.id(self.repo_id)
    }
}

/// Selection of edges for deletion. Only the Linker deletes edges, and
/// only FIXED_BY / ASSOCIATED_WITH; timeline-derived edges are never
/// selected.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFilter {
    pub repo_id: i64,
    pub kinds: Vec<EdgeKind>,
}

/// Mutation counters returned by the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
}

impl GraphStats {
    pub fn add(&mut self, other: GraphStats) {
        self.nodes += other.nodes;
        self.edges += other.edges;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_composite_id() {
        let node = GraphNode::new(7, NodeLabel::File, "src/main.rs");
        assert_eq!(node.id(), "7:file:src/main.rs");

        let issue = GraphNode::new(7, NodeLabel::Issue, "42");
        assert_eq!(issue.id(), "7:issue:42");
    }

    #[test]
    fn test_edge_endpoint_ids() {
        let edge = GraphEdge::new(
            3,
            EdgeKind::Modified,
            NodeRef::new(NodeLabel::Commit, "deadbeef"),
            NodeRef::new(NodeLabel::File, "main.go"),
        )
        .prop("additions", json!(10));

        assert_eq!(edge.from_id(), "3:commit:deadbeef");
        assert_eq!(edge.to_id(), "3:file:main.go");
        assert_eq!(edge.props["additions"], json!(10));
    }
}

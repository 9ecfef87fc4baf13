//! Graph store port (trait interface).
//!
//! The builder, linker, and risk engine speak only this interface; the
//! two Cypher flavors and the in-memory test store implement it.
//!
//! Mutation contract: `merge_nodes`/`merge_edges` are idempotent on the
//! composite ID (nodes) and `(kind, from, to)` triple (edges); re-running
//! a batch is always safe. The store is single-writer per repository —
//! enforced by the caller, not in-process.

use async_trait::async_trait;

use super::models::{EdgeFilter, GraphEdge, GraphNode};
use super::query::{ReadQuery, Row};
use crate::shared::models::Result;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create uniqueness constraints and indexes if missing.
    async fn ensure_schema(&self) -> Result<()>;

    /// MERGE nodes by composite ID, updating properties. Returns the
    /// number of nodes that did not previously exist.
    async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize>;

    /// MERGE edges by `(kind, from, to)`, updating properties. Returns
    /// the number of edges that did not previously exist.
    async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize>;

    /// Delete every edge matching the filter. Returns the count removed.
    async fn delete_edges(&self, filter: &EdgeFilter) -> Result<usize>;

    /// Evaluate one of the fixed read queries.
    async fn read(&self, query: ReadQuery) -> Result<Vec<Row>>;

    /// Repository-scoped teardown: drop every node and edge of `repo_id`.
    async fn delete_repo(&self, repo_id: i64) -> Result<()>;
}

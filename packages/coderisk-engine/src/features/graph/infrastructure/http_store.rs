//! Cypher HTTP transactional adapter.
//!
//! Speaks the transactional-commit endpoint shared by the two supported
//! store flavors. Each call is one transaction; edge batches are capped
//! at 100 rows per transaction to bound transaction size and retry cost.

use ahash::AHashMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use async_trait::async_trait;

use crate::features::graph::domain::{
    EdgeFilter, EdgeKind, GraphEdge, GraphFlavor, GraphNode, GraphStore, NodeLabel, ReadQuery, Row,
};
use crate::shared::models::{CoreError, Result};

use super::cypher::{
    self, delete_edges_statement, delete_repo_statement, merge_edges_statement,
    merge_nodes_statement, read_statement, schema_statements,
};

/// Node rows per bulk MERGE statement.
const NODE_BATCH_SIZE: usize = 500;
/// Edge rows per transaction.
const EDGE_BATCH_SIZE: usize = 100;

pub struct CypherHttpStore {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
    flavor: GraphFlavor,
}

impl CypherHttpStore {
    pub fn new(
        uri: &str,
        user: impl Into<String>,
        password: impl Into<String>,
        database: &str,
        flavor: GraphFlavor,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), database),
            user: user.into(),
            password: password.into(),
            flavor,
        }
    }

    /// Run statements in one transaction; returns per-statement results.
    async fn execute(&self, statements: &[cypher::Statement]) -> Result<Vec<StatementResult>> {
        let body = json!({
            "statements": statements
                .iter()
                .map(|(statement, parameters)| json!({
                    "statement": statement,
                    "parameters": parameters,
                    "includeStats": true,
                }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::store(format!("graph endpoint unreachable: {}", e)))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| CoreError::store(format!("graph response unreadable: {}", e)))?;

        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                let code = first.get("code").and_then(Value::as_str).unwrap_or("");
                let message = first.get("message").and_then(Value::as_str).unwrap_or("");
                // MERGE collisions under concurrent retry are absorbed by
                // the caller; everything else is a store failure.
                return if code.contains("Constraint") {
                    Err(CoreError::conflict(format!("{}: {}", code, message)))
                } else {
                    Err(CoreError::store(format!("{}: {}", code, message)))
                };
            }
        }

        if !status.is_success() {
            return Err(CoreError::store(format!(
                "graph endpoint returned HTTP {}",
                status
            )));
        }

        let results = payload
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results.into_iter().map(StatementResult::from_value).collect())
    }
}

struct StatementResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    nodes_created: usize,
    relationships_created: usize,
    relationships_deleted: usize,
}

impl StatementResult {
    fn from_value(value: Value) -> Self {
        let columns = value
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(|c| c.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let rows = value
            .get("data")
            .and_then(Value::as_array)
            .map(|data| {
                data.iter()
                    .filter_map(|entry| entry.get("row").and_then(Value::as_array).cloned())
                    .collect()
            })
            .unwrap_or_default();

        let stat = |name: &str| {
            value
                .pointer(&format!("/stats/{}", name))
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize
        };

        Self {
            columns,
            rows,
            nodes_created: stat("nodes_created"),
            relationships_created: stat("relationships_created"),
            relationships_deleted: stat("relationships_deleted"),
        }
    }

    fn into_rows(self) -> Vec<Row> {
        self.rows
            .into_iter()
            .map(|row| {
                let mut map = Map::new();
                for (column, value) in self.columns.iter().zip(row.into_iter()) {
                    map.insert(column.clone(), value);
                }
                map
            })
            .collect()
    }
}

#[async_trait]
impl GraphStore for CypherHttpStore {
    async fn ensure_schema(&self) -> Result<()> {
        for statement in schema_statements(self.flavor) {
            self.execute(std::slice::from_ref(&statement)).await?;
        }
        Ok(())
    }

    async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize> {
        // Group by label, UNWIND-style bulk upsert per label.
        let mut by_label: AHashMap<NodeLabel, Vec<&GraphNode>> = AHashMap::new();
        for node in nodes {
            by_label.entry(node.label).or_default().push(node);
        }

        let mut created = 0;
        for (label, group) in by_label {
            for chunk in group.chunks(NODE_BATCH_SIZE) {
                let statement = merge_nodes_statement(label, chunk);
                let results = self.execute(std::slice::from_ref(&statement)).await?;
                created += results.iter().map(|r| r.nodes_created).sum::<usize>();
            }
        }

        debug!(total = nodes.len(), created, "merged node batch");
        Ok(created)
    }

    async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
        let mut by_shape: AHashMap<(EdgeKind, NodeLabel, NodeLabel), Vec<&GraphEdge>> =
            AHashMap::new();
        for edge in edges {
            by_shape
                .entry((edge.kind, edge.from.label, edge.to.label))
                .or_default()
                .push(edge);
        }

        let mut created = 0;
        for ((kind, from_label, to_label), group) in by_shape {
            for chunk in group.chunks(EDGE_BATCH_SIZE) {
                let statement = merge_edges_statement(kind, from_label, to_label, chunk);
                let results = self.execute(std::slice::from_ref(&statement)).await?;
                created += results
                    .iter()
                    .map(|r| r.relationships_created)
                    .sum::<usize>();
            }
        }

        debug!(total = edges.len(), created, "merged edge batch");
        Ok(created)
    }

    async fn delete_edges(&self, filter: &EdgeFilter) -> Result<usize> {
        let statement = delete_edges_statement(filter);
        let results = self.execute(std::slice::from_ref(&statement)).await?;
        Ok(results
            .iter()
            .map(|r| r.relationships_deleted)
            .sum::<usize>())
    }

    async fn read(&self, query: ReadQuery) -> Result<Vec<Row>> {
        let statement = read_statement(&query);
        let mut results = self.execute(std::slice::from_ref(&statement)).await?;

        if results.is_empty() {
            return Ok(Vec::new());
        }
        Ok(results.remove(0).into_rows())
    }

    async fn delete_repo(&self, repo_id: i64) -> Result<()> {
        let statement = delete_repo_statement(repo_id);
        self.execute(std::slice::from_ref(&statement)).await?;
        Ok(())
    }
}

//! Investigation tool set.
//!
//! Four deterministic, read-only tools backed by the graph port. The
//! investigator executes whatever the model requests by name; anything
//! outside this set is an error the model sees in its next turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::features::graph::{GraphStore, ReadQuery};
use crate::features::llm::ToolSpec;
use crate::shared::models::{CoreError, Result};

/// Default incident lookback when the model omits `window_days`.
const DEFAULT_WINDOW_DAYS: i64 = 180;
/// Issue samples included in an incident_history reply.
const INCIDENT_SAMPLE_LIMIT: usize = 5;

pub struct RiskToolbox {
    graph: Arc<dyn GraphStore>,
    repo_id: i64,
    now: DateTime<Utc>,
}

impl RiskToolbox {
    pub fn new(graph: Arc<dyn GraphStore>, repo_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            graph,
            repo_id,
            now,
        }
    }

    /// Tool specs offered to the model.
    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "incident_history".into(),
                description: "Count and sample the closed issues linked to commits that \
                              modified the given files within a rolling window."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "file_paths": {"type": "array", "items": {"type": "string"}},
                        "window_days": {"type": "integer"},
                    },
                    "required": ["file_paths"],
                }),
            },
            ToolSpec {
                name: "ownership_history".into(),
                description: "Developers by commit count over the given files, with first \
                              and last authored timestamps."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "file_paths": {"type": "array", "items": {"type": "string"}},
                    },
                    "required": ["file_paths"],
                }),
            },
            ToolSpec {
                name: "co_change_partners".into(),
                description: "Files that historically change together with the given files, \
                              filtered by minimum co-change frequency."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "file_paths": {"type": "array", "items": {"type": "string"}},
                        "min_frequency": {"type": "number"},
                    },
                    "required": ["file_paths"],
                }),
            },
            ToolSpec {
                name: "blast_radius".into(),
                description: "Transitive 1-hop structural dependents of a file, overlaid \
                              with their incident counts."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "file_path": {"type": "string"},
                    },
                    "required": ["file_path"],
                }),
            },
        ]
    }

    /// Execute one tool call. Deterministic, no side effects.
    pub async fn execute(&self, name: &str, args: &Value) -> Result<Value> {
        match name {
            "incident_history" => self.incident_history(args).await,
            "ownership_history" => self.ownership_history(args).await,
            "co_change_partners" => self.co_change_partners(args).await,
            "blast_radius" => self.blast_radius(args).await,
            other => Err(CoreError::llm_invalid_response(format!(
                "unknown tool: {}",
                other
            ))),
        }
    }

    fn file_paths(args: &Value) -> Result<Vec<String>> {
        args.get("file_paths")
            .and_then(Value::as_array)
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(|p| p.as_str().map(String::from))
                    .collect()
            })
            .filter(|paths: &Vec<String>| !paths.is_empty())
            .ok_or_else(|| CoreError::llm_invalid_response("file_paths missing or empty"))
    }

    async fn incident_history(&self, args: &Value) -> Result<Value> {
        let file_paths = Self::file_paths(args)?;
        let window_days = args
            .get("window_days")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_WINDOW_DAYS);
        let since = (self.now - chrono::Duration::days(window_days)).timestamp();

        let rows = self
            .graph
            .read(ReadQuery::IncidentRows {
                repo_id: self.repo_id,
                canonical_paths: file_paths,
                since_epoch: since,
            })
            .await?;

        let samples: Vec<&serde_json::Map<String, Value>> =
            rows.iter().take(INCIDENT_SAMPLE_LIMIT).collect();
        Ok(json!({
            "count": rows.len(),
            "window_days": window_days,
            "samples": samples,
        }))
    }

    async fn ownership_history(&self, args: &Value) -> Result<Value> {
        let file_paths = Self::file_paths(args)?;

        let rows = self
            .graph
            .read(ReadQuery::OwnershipRows {
                repo_id: self.repo_id,
                canonical_paths: file_paths,
            })
            .await?;

        Ok(json!({ "developers": rows }))
    }

    async fn co_change_partners(&self, args: &Value) -> Result<Value> {
        let file_paths = Self::file_paths(args)?;
        let min_frequency = args
            .get("min_frequency")
            .and_then(Value::as_f64)
            .unwrap_or(0.3);
        let since = (self.now - chrono::Duration::days(90)).timestamp();

        let mut partners = Vec::new();
        for path in file_paths {
            let rows = self
                .graph
                .read(ReadQuery::CoChangeRows {
                    repo_id: self.repo_id,
                    canonical_path: path.clone(),
                    since_epoch: since,
                })
                .await?;
            for row in rows {
                let together = row.get("together").and_then(Value::as_u64).unwrap_or(0) as f64;
                let total = row.get("total").and_then(Value::as_u64).unwrap_or(0) as f64;
                if total == 0.0 {
                    continue;
                }
                let frequency = together / total;
                if frequency >= min_frequency {
                    partners.push(json!({
                        "file": path,
                        "partner": row.get("other_path"),
                        "frequency": frequency,
                        "together": together as u64,
                        "total": total as u64,
                    }));
                }
            }
        }

        Ok(json!({ "partners": partners }))
    }

    async fn blast_radius(&self, args: &Value) -> Result<Value> {
        let file_path = args
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::llm_invalid_response("file_path missing"))?;
        let since = (self.now - chrono::Duration::days(DEFAULT_WINDOW_DAYS)).timestamp();

        let rows = self
            .graph
            .read(ReadQuery::BlastRadius {
                repo_id: self.repo_id,
                canonical_path: file_path.to_string(),
                since_epoch: since,
            })
            .await?;

        Ok(json!({
            "count": rows.len(),
            "dependents": rows,
        }))
    }
}

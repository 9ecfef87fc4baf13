//! Tier-1 metric computation.
//!
//! Three read-only, parameter-bound graph queries per file, each wrapped
//! in the metric-query timeout. Budget: < 500 ms per file against a
//! pre-indexed store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::features::graph::{GraphStore, ReadQuery};
use crate::features::risk::domain::{MetricResult, RiskLevel, ThresholdProfile, Tier1Result};
use crate::shared::models::Result;

/// Co-change lookback window.
const CO_CHANGE_WINDOW_DAYS: i64 = 90;
/// Incident-history rolling window.
const INCIDENT_WINDOW_DAYS: i64 = 180;
/// Pairs below this frequency do not contribute to the partner count.
const CO_CHANGE_CONTRIBUTION_FLOOR: f64 = 0.3;
/// Neighbor count at which the coupling score saturates.
const COUPLING_SATURATION: f64 = 20.0;

pub struct MetricsEngine {
    graph: Arc<dyn GraphStore>,
    profile: ThresholdProfile,
    query_timeout: Duration,
}

impl MetricsEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        profile: ThresholdProfile,
        query_timeout: Duration,
    ) -> Self {
        Self {
            graph,
            profile,
            query_timeout,
        }
    }

    /// Compute all three metrics for one canonical path.
    pub async fn tier1(
        &self,
        repo_id: i64,
        canonical_path: &str,
        now: DateTime<Utc>,
    ) -> Result<Tier1Result> {
        let started = Instant::now();

        let coupling = self.coupling(repo_id, canonical_path).await?;
        let (co_change, partners) = self.co_change(repo_id, canonical_path, now).await?;
        let incidents = self.incidents(repo_id, canonical_path, now).await?;

        let overall_risk = coupling.level.max(co_change.level).max(incidents.level);

        Ok(Tier1Result {
            canonical_path: canonical_path.to_string(),
            coupling,
            co_change,
            incidents,
            co_change_partners: partners,
            overall_risk,
            should_escalate: overall_risk.needs_escalation(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn read(&self, query: ReadQuery) -> Result<Vec<serde_json::Map<String, Value>>> {
        tokio::time::timeout(self.query_timeout, self.graph.read(query)).await?
    }

    async fn coupling(&self, repo_id: i64, canonical_path: &str) -> Result<MetricResult> {
        let rows = self
            .read(ReadQuery::StructuralCoupling {
                repo_id,
                canonical_path: canonical_path.to_string(),
            })
            .await?;

        let count = rows
            .first()
            .and_then(|r| r.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as f64;

        Ok(MetricResult {
            value: count,
            score: (count / COUPLING_SATURATION).min(1.0),
            level: self.profile.coupling.level_for(count),
        })
    }

    async fn co_change(
        &self,
        repo_id: i64,
        canonical_path: &str,
        now: DateTime<Utc>,
    ) -> Result<(MetricResult, usize)> {
        let since = (now - chrono::Duration::days(CO_CHANGE_WINDOW_DAYS)).timestamp();
        let rows = self
            .read(ReadQuery::CoChangeRows {
                repo_id,
                canonical_path: canonical_path.to_string(),
                since_epoch: since,
            })
            .await?;

        let mut max_frequency: f64 = 0.0;
        let mut partners = 0;
        for row in &rows {
            let together = row.get("together").and_then(Value::as_u64).unwrap_or(0) as f64;
            let total = row.get("total").and_then(Value::as_u64).unwrap_or(0) as f64;
            if total == 0.0 {
                continue;
            }
            let frequency = together / total;
            if frequency > CO_CHANGE_CONTRIBUTION_FLOOR {
                partners += 1;
            }
            max_frequency = max_frequency.max(frequency);
        }

        Ok((
            MetricResult {
                value: max_frequency,
                score: max_frequency,
                level: self.profile.co_change.level_for(max_frequency),
            },
            partners,
        ))
    }

    async fn incidents(
        &self,
        repo_id: i64,
        canonical_path: &str,
        now: DateTime<Utc>,
    ) -> Result<MetricResult> {
        let since = (now - chrono::Duration::days(INCIDENT_WINDOW_DAYS)).timestamp();
        let rows = self
            .read(ReadQuery::IncidentRows {
                repo_id,
                canonical_paths: vec![canonical_path.to_string()],
                since_epoch: since,
            })
            .await?;

        let count = rows.len() as f64;
        Ok(MetricResult {
            value: count,
            score: (count / 10.0).min(1.0),
            level: self.profile.incidents.level_for(count),
        })
    }
}

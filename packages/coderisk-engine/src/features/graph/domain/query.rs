//! Fixed read-query set.
//!
//! Every graph read the engine performs is one of these parameter-bound
//! shapes. Backends evaluate them natively (Cypher text on the HTTP
//! store, direct traversal in memory), so the metric and tool layers stay
//! store-agnostic. Ownership and co-change are never materialized as
//! edges; they exist only as these queries.

use serde_json::{Map, Value};

use super::models::{EdgeKind, NodeLabel};

/// One result row: column name → value.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ReadQuery {
    /// Distinct 1-hop structural neighbors (IMPORTS/CALLS, either
    /// direction) of a file. Columns: `count`.
    StructuralCoupling {
        repo_id: i64,
        canonical_path: String,
    },

    /// Commits on the default branch since `since_epoch` touching the
    /// file, joined with the other files those commits touched.
    /// Columns: `other_path`, `together`, `total`.
    CoChangeRows {
        repo_id: i64,
        canonical_path: String,
        since_epoch: i64,
    },

    /// Closed issues linked (REFERENCES via merged PR, CLOSED_BY, or
    /// FIXED_BY) to commits that modified any of the files, with
    /// `closed_at >= since_epoch`. Columns: `issue_number`, `title`,
    /// `closed_at`.
    IncidentRows {
        repo_id: i64,
        canonical_paths: Vec<String>,
        since_epoch: i64,
    },

    /// Developer × commit-count aggregation over the files.
    /// Columns: `developer`, `commits`, `first_at`, `last_at`.
    OwnershipRows {
        repo_id: i64,
        canonical_paths: Vec<String>,
    },

    /// Files structurally depending on the target (incoming
    /// IMPORTS/CALLS), overlaid with their incident counts since
    /// `since_epoch`. Columns: `dependent_path`, `incident_count`.
    BlastRadius {
        repo_id: i64,
        canonical_path: String,
        since_epoch: i64,
    },

    /// All edges of one kind. Columns: `from_id`, `to_id`, `props`.
    EdgesOfKind { repo_id: i64, kind: EdgeKind },

    /// All nodes of one label. Columns: `id`, `props`.
    NodesByLabel { repo_id: i64, label: NodeLabel },

    /// Node counts per label. Columns: `label`, `count`.
    CountsByLabel { repo_id: i64 },

    /// Repository linking-quality inputs. Columns: `closed_issues`,
    /// `fixed_links`.
    LinkQualitySummary { repo_id: i64 },
}

impl ReadQuery {
    /// Operation tag for logs and timeout selection.
    pub fn operation(&self) -> &'static str {
        match self {
            ReadQuery::StructuralCoupling { .. } => "structural_coupling",
            ReadQuery::CoChangeRows { .. } => "co_change_rows",
            ReadQuery::IncidentRows { .. } => "incident_rows",
            ReadQuery::OwnershipRows { .. } => "ownership_rows",
            ReadQuery::BlastRadius { .. } => "blast_radius",
            ReadQuery::EdgesOfKind { .. } => "edges_of_kind",
            ReadQuery::NodesByLabel { .. } => "nodes_by_label",
            ReadQuery::CountsByLabel { .. } => "counts_by_label",
            ReadQuery::LinkQualitySummary { .. } => "link_quality_summary",
        }
    }
}

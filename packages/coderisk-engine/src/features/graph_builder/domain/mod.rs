//! Build outcome models.

use serde::{Deserialize, Serialize};

use crate::features::graph::GraphStats;

/// Counters for one `build_graph` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub stats: GraphStats,
    pub commits_processed: usize,
    pub prs_processed: usize,
    pub issues_processed: usize,
    pub timeline_edges: usize,
    /// Rows skipped as inconsistent (logged, non-fatal).
    pub skipped_rows: usize,
}

impl BuildReport {
    pub fn merge(&mut self, other: BuildReport) {
        self.stats.add(other.stats);
        self.commits_processed += other.commits_processed;
        self.prs_processed += other.prs_processed;
        self.issues_processed += other.issues_processed;
        self.timeline_edges += other.timeline_edges;
        self.skipped_rows += other.skipped_rows;
    }
}

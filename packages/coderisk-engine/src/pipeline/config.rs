//! Pipeline tuning knobs.

use serde::{Deserialize, Serialize};

/// Worker-pool and batching configuration, overridable per phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fixed worker-pool size for parallel batches within a phase.
    pub workers: usize,
    /// Staging rows per batch transaction.
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Small fixed pool; clamped so a constrained runner is not
            // oversubscribed.
            workers: 20_usize.min(num_cpus::get() * 4),
            batch_size: 100,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_bounded() {
        let config = PipelineConfig::default();
        assert!(config.workers >= 1);
        assert!(config.workers <= 20);
        assert_eq!(config.batch_size, 100);
    }
}

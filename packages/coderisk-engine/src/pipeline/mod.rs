//! Ingestion pipeline.
//!
//! Phase ordering per repository is strict: commits, PRs, MERGED_AS,
//! issues, timeline edges, then the Linker, then (optionally) the
//! Atomizer. Phases across repositories are independent. Resumability
//! comes from the staging `processed` flags, not from checkpoints —
//! staging *is* the checkpoint.

pub mod config;
pub mod orchestrator;

pub use config::PipelineConfig;
pub use orchestrator::{IngestPipeline, IngestReport};

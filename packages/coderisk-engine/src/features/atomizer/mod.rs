//! Atomizer Feature (optional)
//!
//! Per-commit LLM enrichment producing function-granularity CodeBlock
//! entities and their RENAMED_FROM / IMPORTS_FROM relations.
//!
//! ## Note
//! Advisory, not authoritative: failure on an individual commit is
//! logged and skipped, and Tier-1 metrics never depend on its output.
//! Commits are processed in topological-index order by a single consumer
//! so rename chains build incrementally and deterministically.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;

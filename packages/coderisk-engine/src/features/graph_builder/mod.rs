//! Graph Builder Feature
//!
//! Transforms staging rows into idempotent node/edge batches.
//!
//! ## Sub-phases (strictly ordered, each resumable)
//! 1. Commits → Commit, Developer, File, AUTHORED, MODIFIED
//! 2. PRs → PR, Developer, CREATED
//! 3. PRs → MERGED_AS
//! 4. Issues → Issue
//! 5. Timeline → REFERENCES, CLOSED_BY
//!
//! The Linker runs after phase 5 so its edge replacement can never touch
//! the timeline-derived edges created here.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;

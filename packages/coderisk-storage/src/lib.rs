//! Relational staging store for repository ingestion.
//!
//! Append-only rows collected from Git and the issue tracker land here
//! before graph construction. The store also owns the mutable
//! file-identity map and the derived link tables.
//!
//! ## Core principles
//!
//! 1. **Append-only raw rows**: `raw_commits`, `raw_prs`, `raw_issues` and
//!    `timeline_events` are never mutated after insert, except for the
//!    `processed` flag (false → true, exactly once).
//! 2. **Stable batch fetch**: `fetch_unprocessed_*` is stable under
//!    concurrent insert; new rows become visible on the next call.
//! 3. **Port/adapter split**: PostgreSQL for production, in-memory for
//!    tests; both behind the [`StagingStore`] trait.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{
    CodeBlockRow, ConfidenceBreakdown, DetectionMethod, FileChange, FileChangeStatus,
    FileIdentity, IssueCommitRef, LinkAction, LinkQuality, RawCommit, RawIssue, RawPullRequest,
    Repository, StagingStats, TimelineEvent, TimelineEventType, ValidatedLink,
};
pub use domain::ports::{StagingKind, StagingStore};
pub use error::{Result, StagingError};
pub use infrastructure::memory::InMemoryStagingStore;
pub use infrastructure::postgres::PostgresStagingStore;

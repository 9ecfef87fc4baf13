//! Staging store port (trait interface).
//!
//! Port/adapter pattern for backend flexibility:
//! - Production: PostgreSQL (concurrency + full-text search)
//! - Testing: InMemory (fast unit tests)
//!
//! Contract: batch fetches are stable under concurrent insert — new rows
//! become visible on the next call, never partially within a batch.
//! `mark_processed` is atomic per batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    CodeBlockRow, FileIdentity, IssueCommitRef, RawCommit, RawIssue, RawPullRequest, Repository,
    StagingStats, TimelineEvent, ValidatedLink,
};
use crate::error::Result;

/// Which staging table a processed-flag operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingKind {
    Commits,
    PullRequests,
    Issues,
}

impl StagingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingKind::Commits => "commits",
            StagingKind::PullRequests => "prs",
            StagingKind::Issues => "issues",
        }
    }
}

/// Staging store port. All backends must implement this trait.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Create tables and indexes if missing. No-op for ephemeral backends.
    async fn ensure_schema(&self) -> Result<()>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Repositories
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn upsert_repository(&self, repo: &Repository) -> Result<()>;

    async fn get_repository(&self, repo_id: i64) -> Result<Option<Repository>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Raw rows (append-only; processed flag is the only mutation)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert commits, ignoring duplicates on `(repo_id, sha)`.
    async fn insert_commits(&self, commits: &[RawCommit]) -> Result<()>;

    async fn insert_prs(&self, prs: &[RawPullRequest]) -> Result<()>;

    async fn insert_issues(&self, issues: &[RawIssue]) -> Result<()>;

    async fn insert_timeline_events(&self, events: &[TimelineEvent]) -> Result<()>;

    /// Unprocessed commits ordered by topological index.
    async fn fetch_unprocessed_commits(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawCommit>>;

    /// Unprocessed PRs ordered by number.
    async fn fetch_unprocessed_prs(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawPullRequest>>;

    /// Unprocessed issues ordered by number.
    async fn fetch_unprocessed_issues(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawIssue>>;

    /// Flip `processed` to true for the given rows. Atomic per batch.
    async fn mark_processed(&self, kind: StagingKind, ids: &[i64]) -> Result<()>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Point lookups & windows (Linker, Builder, Risk Engine)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn get_commit_by_sha(&self, repo_id: i64, sha: &str) -> Result<Option<RawCommit>>;

    /// Every commit of the repository in topological order.
    async fn list_commits(&self, repo_id: i64) -> Result<Vec<RawCommit>>;

    async fn get_pr(&self, repo_id: i64, number: i64) -> Result<Option<RawPullRequest>>;

    async fn get_issue(&self, repo_id: i64, number: i64) -> Result<Option<RawIssue>>;

    async fn list_prs(&self, repo_id: i64) -> Result<Vec<RawPullRequest>>;

    async fn list_closed_issues(&self, repo_id: i64) -> Result<Vec<RawIssue>>;

    /// PRs merged within `[from, to]`.
    async fn prs_merged_between(
        &self,
        repo_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawPullRequest>>;

    /// Commits authored within `[from, to]`.
    async fn commits_authored_between(
        &self,
        repo_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawCommit>>;

    async fn timeline_events(&self, repo_id: i64) -> Result<Vec<TimelineEvent>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // File identity map
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert or replace an identity keyed on `(repo_id, canonical_path)`.
    async fn upsert_file_identity(&self, identity: &FileIdentity) -> Result<()>;

    /// Look up by canonical path only.
    async fn get_file_identity(
        &self,
        repo_id: i64,
        canonical_path: &str,
    ) -> Result<Option<FileIdentity>>;

    /// Look up by canonical path or any historical path (element match).
    async fn find_identity_by_path(
        &self,
        repo_id: i64,
        path: &str,
    ) -> Result<Option<FileIdentity>>;

    async fn list_file_identities(&self, repo_id: i64) -> Result<Vec<FileIdentity>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Link tables (Linker outputs)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Drop the repo's previous candidate refs and insert the new set in
    /// one transaction. The Linker is the only writer of this table.
    async fn replace_issue_commit_refs(&self, repo_id: i64, refs: &[IssueCommitRef])
        -> Result<()>;

    async fn list_issue_commit_refs(&self, repo_id: i64) -> Result<Vec<IssueCommitRef>>;

    /// Drop the repo's previous validated links and insert the new set in
    /// one transaction, so a re-run fully replaces the Linker's output.
    async fn replace_validated_links(&self, repo_id: i64, links: &[ValidatedLink]) -> Result<()>;

    async fn list_validated_links(&self, repo_id: i64) -> Result<Vec<ValidatedLink>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Code blocks (Atomizer outputs)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn insert_code_blocks(&self, blocks: &[CodeBlockRow]) -> Result<()>;

    async fn code_blocks_for_commit(
        &self,
        repo_id: i64,
        commit_sha: &str,
    ) -> Result<Vec<CodeBlockRow>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Operator tools
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Full-text search over issue titles and bodies. Not on the ingest
    /// critical path.
    async fn search_issues(
        &self,
        repo_id: i64,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawIssue>>;

    async fn staging_stats(&self, repo_id: i64) -> Result<StagingStats>;

    /// Repository-scoped teardown: delete every row carrying `repo_id`.
    async fn delete_repository_data(&self, repo_id: i64) -> Result<()>;
}

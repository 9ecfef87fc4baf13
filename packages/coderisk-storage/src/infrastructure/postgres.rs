//! PostgreSQL staging adapter.
//!
//! - Connection pooling via PgPool
//! - ON CONFLICT upserts keyed on the staging unique constraints
//! - Full-text search on issues via native GIN indexes
//! - Schema bootstrap (`ensure_schema`) creating the required indexes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::domain::models::{
    CodeBlockRow, ConfidenceBreakdown, DetectionMethod, FileIdentity, IssueCommitRef, LinkAction,
    LinkQuality, RawCommit, RawIssue, RawPullRequest, Repository, StagingStats, TimelineEvent,
    TimelineEventType, ValidatedLink,
};
use crate::domain::ports::{StagingKind, StagingStore};
use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id              BIGINT PRIMARY KEY,
    full_name       TEXT NOT NULL,
    absolute_path   TEXT NOT NULL,
    default_branch  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raw_commits (
    id                 BIGSERIAL PRIMARY KEY,
    repo_id            BIGINT NOT NULL,
    sha                TEXT NOT NULL,
    message            TEXT NOT NULL,
    author_name        TEXT NOT NULL,
    author_email       TEXT NOT NULL,
    author_date        TIMESTAMPTZ NOT NULL,
    topological_index  BIGINT NOT NULL,
    raw_json           JSONB NOT NULL,
    processed          BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (repo_id, sha)
);
CREATE INDEX IF NOT EXISTS idx_commits_unprocessed ON raw_commits (repo_id, processed);
CREATE INDEX IF NOT EXISTS idx_commits_author_date ON raw_commits (repo_id, author_date);
CREATE INDEX IF NOT EXISTS idx_commits_topo ON raw_commits (repo_id, topological_index);

CREATE TABLE IF NOT EXISTS raw_prs (
    id                BIGSERIAL PRIMARY KEY,
    repo_id           BIGINT NOT NULL,
    number            BIGINT NOT NULL,
    title             TEXT NOT NULL,
    body              TEXT,
    state             TEXT NOT NULL,
    merged            BOOLEAN NOT NULL,
    merged_at         TIMESTAMPTZ,
    merge_commit_sha  TEXT,
    created_at        TIMESTAMPTZ NOT NULL,
    raw_json          JSONB NOT NULL,
    processed         BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (repo_id, number)
);
CREATE INDEX IF NOT EXISTS idx_prs_merged_at ON raw_prs (repo_id, merged_at);
CREATE INDEX IF NOT EXISTS idx_prs_unprocessed ON raw_prs (repo_id, processed);

CREATE TABLE IF NOT EXISTS raw_issues (
    id          BIGSERIAL PRIMARY KEY,
    repo_id     BIGINT NOT NULL,
    number      BIGINT NOT NULL,
    title       TEXT NOT NULL,
    body        TEXT,
    state       TEXT NOT NULL,
    labels      TEXT[] NOT NULL DEFAULT '{}',
    created_at  TIMESTAMPTZ NOT NULL,
    closed_at   TIMESTAMPTZ,
    raw_json    JSONB NOT NULL,
    processed   BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (repo_id, number)
);
CREATE INDEX IF NOT EXISTS idx_issues_closed_at ON raw_issues (repo_id, closed_at);
CREATE INDEX IF NOT EXISTS idx_issues_unprocessed ON raw_issues (repo_id, processed);
CREATE INDEX IF NOT EXISTS idx_issues_fts ON raw_issues
    USING GIN (to_tsvector('english', title || ' ' || coalesce(body, '')));

CREATE TABLE IF NOT EXISTS timeline_events (
    id             BIGSERIAL PRIMARY KEY,
    repo_id        BIGINT NOT NULL,
    issue_number   BIGINT NOT NULL,
    event_type     TEXT NOT NULL,
    source_type    TEXT,
    source_number  BIGINT,
    source_sha     TEXT,
    actor          TEXT,
    occurred_at    TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_timeline_issue ON timeline_events (repo_id, issue_number);

CREATE TABLE IF NOT EXISTS file_identities (
    repo_id           BIGINT NOT NULL,
    canonical_path    TEXT NOT NULL,
    historical_paths  TEXT[] NOT NULL,
    PRIMARY KEY (repo_id, canonical_path)
);
CREATE INDEX IF NOT EXISTS idx_identities_historical ON file_identities
    USING GIN (historical_paths);

CREATE TABLE IF NOT EXISTS issue_commit_refs (
    id                BIGSERIAL PRIMARY KEY,
    repo_id           BIGINT NOT NULL,
    issue_number      BIGINT NOT NULL,
    pr_number         BIGINT,
    commit_sha        TEXT,
    action            TEXT NOT NULL,
    confidence        DOUBLE PRECISION NOT NULL,
    detection_method  TEXT NOT NULL,
    extracted_from    TEXT NOT NULL,
    evidence          TEXT[] NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_refs_issue ON issue_commit_refs (repo_id, issue_number);

CREATE TABLE IF NOT EXISTS code_blocks (
    id          BIGSERIAL PRIMARY KEY,
    repo_id     BIGINT NOT NULL,
    commit_sha  TEXT NOT NULL,
    file_path   TEXT NOT NULL,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    operation   TEXT NOT NULL,
    start_line  BIGINT NOT NULL,
    end_line    BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_blocks_commit ON code_blocks (repo_id, commit_sha);

CREATE TABLE IF NOT EXISTS validated_links (
    id                   BIGSERIAL PRIMARY KEY,
    repo_id              BIGINT NOT NULL,
    issue_number         BIGINT NOT NULL,
    pr_number            BIGINT,
    commit_sha           TEXT,
    final_confidence     DOUBLE PRECISION NOT NULL,
    detection_method     TEXT NOT NULL,
    link_quality         TEXT NOT NULL,
    evidence_sources     TEXT[] NOT NULL DEFAULT '{}',
    base_confidence      DOUBLE PRECISION NOT NULL,
    temporal_boost       DOUBLE PRECISION NOT NULL,
    bidirectional_boost  DOUBLE PRECISION NOT NULL,
    semantic_boost       DOUBLE PRECISION NOT NULL,
    negative_penalty     DOUBLE PRECISION NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_links_unique ON validated_links
    (repo_id, issue_number, coalesce(pr_number, -1), coalesce(commit_sha, ''));
"#;

/// PostgreSQL staging store (production).
pub struct PostgresStagingStore {
    pool: PgPool,
}

impl PostgresStagingStore {
    /// Connect with pooling. `database_url` is a standard Postgres DSN.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_repository(row: &PgRow) -> Result<Repository> {
        Ok(Repository {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            absolute_path: row.try_get("absolute_path")?,
            default_branch: row.try_get("default_branch")?,
        })
    }

    fn row_to_commit(row: &PgRow) -> Result<RawCommit> {
        Ok(RawCommit {
            id: row.try_get("id")?,
            repo_id: row.try_get("repo_id")?,
            sha: row.try_get("sha")?,
            message: row.try_get("message")?,
            author_name: row.try_get("author_name")?,
            author_email: row.try_get("author_email")?,
            author_date: row.try_get("author_date")?,
            topological_index: row.try_get("topological_index")?,
            raw_json: row.try_get("raw_json")?,
            processed: row.try_get("processed")?,
        })
    }

    fn row_to_pr(row: &PgRow) -> Result<RawPullRequest> {
        Ok(RawPullRequest {
            id: row.try_get("id")?,
            repo_id: row.try_get("repo_id")?,
            number: row.try_get("number")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            state: row.try_get("state")?,
            merged: row.try_get("merged")?,
            merged_at: row.try_get("merged_at")?,
            merge_commit_sha: row.try_get("merge_commit_sha")?,
            created_at: row.try_get("created_at")?,
            raw_json: row.try_get("raw_json")?,
            processed: row.try_get("processed")?,
        })
    }

    fn row_to_issue(row: &PgRow) -> Result<RawIssue> {
        Ok(RawIssue {
            id: row.try_get("id")?,
            repo_id: row.try_get("repo_id")?,
            number: row.try_get("number")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            state: row.try_get("state")?,
            labels: row.try_get("labels")?,
            created_at: row.try_get("created_at")?,
            closed_at: row.try_get("closed_at")?,
            raw_json: row.try_get("raw_json")?,
            processed: row.try_get("processed")?,
        })
    }

    fn row_to_event(row: &PgRow) -> Result<TimelineEvent> {
        let event_type: String = row.try_get("event_type")?;
        Ok(TimelineEvent {
            id: row.try_get("id")?,
            repo_id: row.try_get("repo_id")?,
            issue_number: row.try_get("issue_number")?,
            event_type: TimelineEventType::parse(&event_type)?,
            source_type: row.try_get("source_type")?,
            source_number: row.try_get("source_number")?,
            source_sha: row.try_get("source_sha")?,
            actor: row.try_get("actor")?,
            at: row.try_get("occurred_at")?,
        })
    }

    fn row_to_identity(row: &PgRow) -> Result<FileIdentity> {
        Ok(FileIdentity {
            repo_id: row.try_get("repo_id")?,
            canonical_path: row.try_get("canonical_path")?,
            historical_paths: row.try_get("historical_paths")?,
        })
    }

    fn row_to_ref(row: &PgRow) -> Result<IssueCommitRef> {
        let action: String = row.try_get("action")?;
        let method: String = row.try_get("detection_method")?;
        Ok(IssueCommitRef {
            id: row.try_get("id")?,
            repo_id: row.try_get("repo_id")?,
            issue_number: row.try_get("issue_number")?,
            pr_number: row.try_get("pr_number")?,
            commit_sha: row.try_get("commit_sha")?,
            action: LinkAction::parse(&action)?,
            confidence: row.try_get("confidence")?,
            detection_method: DetectionMethod::parse(&method)?,
            extracted_from: row.try_get("extracted_from")?,
            evidence: row.try_get("evidence")?,
        })
    }

    fn row_to_link(row: &PgRow) -> Result<ValidatedLink> {
        let method: String = row.try_get("detection_method")?;
        let quality: String = row.try_get("link_quality")?;
        Ok(ValidatedLink {
            id: row.try_get("id")?,
            repo_id: row.try_get("repo_id")?,
            issue_number: row.try_get("issue_number")?,
            pr_number: row.try_get("pr_number")?,
            commit_sha: row.try_get("commit_sha")?,
            final_confidence: row.try_get("final_confidence")?,
            detection_method: DetectionMethod::parse(&method)?,
            link_quality: LinkQuality::parse(&quality)?,
            evidence_sources: row.try_get("evidence_sources")?,
            breakdown: ConfidenceBreakdown {
                base: row.try_get("base_confidence")?,
                temporal_boost: row.try_get("temporal_boost")?,
                bidirectional_boost: row.try_get("bidirectional_boost")?,
                semantic_boost: row.try_get("semantic_boost")?,
                negative_penalty: row.try_get("negative_penalty")?,
            },
        })
    }

    fn processed_table(kind: StagingKind) -> &'static str {
        match kind {
            StagingKind::Commits => "raw_commits",
            StagingKind::PullRequests => "raw_prs",
            StagingKind::Issues => "raw_issues",
        }
    }
}

#[async_trait]
impl StagingStore for PostgresStagingStore {
    async fn ensure_schema(&self) -> Result<()> {
        // Statements are IF NOT EXISTS; safe to run on every startup.
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Repositories
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn upsert_repository(&self, repo: &Repository) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repositories (id, full_name, absolute_path, default_branch)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                absolute_path = EXCLUDED.absolute_path,
                default_branch = EXCLUDED.default_branch
            "#,
        )
        .bind(repo.id)
        .bind(&repo.full_name)
        .bind(&repo.absolute_path)
        .bind(&repo.default_branch)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_repository(&self, repo_id: i64) -> Result<Option<Repository>> {
        let row = sqlx::query("SELECT * FROM repositories WHERE id = $1")
            .bind(repo_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_repository).transpose()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Raw rows
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn insert_commits(&self, commits: &[RawCommit]) -> Result<()> {
        if commits.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for commit in commits {
            sqlx::query(
                r#"
                INSERT INTO raw_commits
                    (repo_id, sha, message, author_name, author_email, author_date,
                     topological_index, raw_json, processed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
                ON CONFLICT (repo_id, sha) DO NOTHING
                "#,
            )
            .bind(commit.repo_id)
            .bind(&commit.sha)
            .bind(&commit.message)
            .bind(&commit.author_name)
            .bind(&commit.author_email)
            .bind(commit.author_date)
            .bind(commit.topological_index)
            .bind(&commit.raw_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn insert_prs(&self, prs: &[RawPullRequest]) -> Result<()> {
        if prs.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for pr in prs {
            sqlx::query(
                r#"
                INSERT INTO raw_prs
                    (repo_id, number, title, body, state, merged, merged_at,
                     merge_commit_sha, created_at, raw_json, processed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE)
                ON CONFLICT (repo_id, number) DO NOTHING
                "#,
            )
            .bind(pr.repo_id)
            .bind(pr.number)
            .bind(&pr.title)
            .bind(&pr.body)
            .bind(&pr.state)
            .bind(pr.merged)
            .bind(pr.merged_at)
            .bind(&pr.merge_commit_sha)
            .bind(pr.created_at)
            .bind(&pr.raw_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn insert_issues(&self, issues: &[RawIssue]) -> Result<()> {
        if issues.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for issue in issues {
            sqlx::query(
                r#"
                INSERT INTO raw_issues
                    (repo_id, number, title, body, state, labels, created_at,
                     closed_at, raw_json, processed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)
                ON CONFLICT (repo_id, number) DO NOTHING
                "#,
            )
            .bind(issue.repo_id)
            .bind(issue.number)
            .bind(&issue.title)
            .bind(&issue.body)
            .bind(&issue.state)
            .bind(&issue.labels)
            .bind(issue.created_at)
            .bind(issue.closed_at)
            .bind(&issue.raw_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn insert_timeline_events(&self, events: &[TimelineEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO timeline_events
                    (repo_id, issue_number, event_type, source_type, source_number,
                     source_sha, actor, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.repo_id)
            .bind(event.issue_number)
            .bind(event.event_type.as_str())
            .bind(&event.source_type)
            .bind(event.source_number)
            .bind(&event.source_sha)
            .bind(&event.actor)
            .bind(event.at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn fetch_unprocessed_commits(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawCommit>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_commits
            WHERE repo_id = $1 AND processed = FALSE
            ORDER BY topological_index
            LIMIT $2
            "#,
        )
        .bind(repo_id)
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_commit).collect()
    }

    async fn fetch_unprocessed_prs(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawPullRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_prs
            WHERE repo_id = $1 AND processed = FALSE
            ORDER BY number
            LIMIT $2
            "#,
        )
        .bind(repo_id)
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_pr).collect()
    }

    async fn fetch_unprocessed_issues(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawIssue>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_issues
            WHERE repo_id = $1 AND processed = FALSE
            ORDER BY number
            LIMIT $2
            "#,
        )
        .bind(repo_id)
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_issue).collect()
    }

    async fn mark_processed(&self, kind: StagingKind, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let query = format!(
            "UPDATE {} SET processed = TRUE WHERE id = ANY($1)",
            Self::processed_table(kind)
        );
        sqlx::query(&query).bind(ids).execute(&self.pool).await?;

        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Point lookups & windows
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn get_commit_by_sha(&self, repo_id: i64, sha: &str) -> Result<Option<RawCommit>> {
        let row = sqlx::query("SELECT * FROM raw_commits WHERE repo_id = $1 AND sha = $2")
            .bind(repo_id)
            .bind(sha)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_commit).transpose()
    }

    async fn list_commits(&self, repo_id: i64) -> Result<Vec<RawCommit>> {
        let rows = sqlx::query(
            "SELECT * FROM raw_commits WHERE repo_id = $1 ORDER BY topological_index",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_commit).collect()
    }

    async fn get_pr(&self, repo_id: i64, number: i64) -> Result<Option<RawPullRequest>> {
        let row = sqlx::query("SELECT * FROM raw_prs WHERE repo_id = $1 AND number = $2")
            .bind(repo_id)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_pr).transpose()
    }

    async fn get_issue(&self, repo_id: i64, number: i64) -> Result<Option<RawIssue>> {
        let row = sqlx::query("SELECT * FROM raw_issues WHERE repo_id = $1 AND number = $2")
            .bind(repo_id)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_issue).transpose()
    }

    async fn list_prs(&self, repo_id: i64) -> Result<Vec<RawPullRequest>> {
        let rows = sqlx::query("SELECT * FROM raw_prs WHERE repo_id = $1 ORDER BY number")
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_pr).collect()
    }

    async fn list_closed_issues(&self, repo_id: i64) -> Result<Vec<RawIssue>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_issues
            WHERE repo_id = $1 AND closed_at IS NOT NULL
            ORDER BY number
            "#,
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_issue).collect()
    }

    async fn prs_merged_between(
        &self,
        repo_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawPullRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_prs
            WHERE repo_id = $1 AND merged_at IS NOT NULL
              AND merged_at >= $2 AND merged_at <= $3
            ORDER BY merged_at
            "#,
        )
        .bind(repo_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_pr).collect()
    }

    async fn commits_authored_between(
        &self,
        repo_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawCommit>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_commits
            WHERE repo_id = $1 AND author_date >= $2 AND author_date <= $3
            ORDER BY author_date
            "#,
        )
        .bind(repo_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_commit).collect()
    }

    async fn timeline_events(&self, repo_id: i64) -> Result<Vec<TimelineEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM timeline_events WHERE repo_id = $1 ORDER BY occurred_at",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // File identity map
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn upsert_file_identity(&self, identity: &FileIdentity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_identities (repo_id, canonical_path, historical_paths)
            VALUES ($1, $2, $3)
            ON CONFLICT (repo_id, canonical_path) DO UPDATE SET
                historical_paths = EXCLUDED.historical_paths
            "#,
        )
        .bind(identity.repo_id)
        .bind(&identity.canonical_path)
        .bind(&identity.historical_paths)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_file_identity(
        &self,
        repo_id: i64,
        canonical_path: &str,
    ) -> Result<Option<FileIdentity>> {
        let row = sqlx::query(
            "SELECT * FROM file_identities WHERE repo_id = $1 AND canonical_path = $2",
        )
        .bind(repo_id)
        .bind(canonical_path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_identity).transpose()
    }

    async fn find_identity_by_path(
        &self,
        repo_id: i64,
        path: &str,
    ) -> Result<Option<FileIdentity>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM file_identities
            WHERE repo_id = $1 AND (canonical_path = $2 OR $2 = ANY(historical_paths))
            LIMIT 1
            "#,
        )
        .bind(repo_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_identity).transpose()
    }

    async fn list_file_identities(&self, repo_id: i64) -> Result<Vec<FileIdentity>> {
        let rows = sqlx::query(
            "SELECT * FROM file_identities WHERE repo_id = $1 ORDER BY canonical_path",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_identity).collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Link tables
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn replace_issue_commit_refs(
        &self,
        repo_id: i64,
        refs: &[IssueCommitRef],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM issue_commit_refs WHERE repo_id = $1")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;

        for link in refs {
            sqlx::query(
                r#"
                INSERT INTO issue_commit_refs
                    (repo_id, issue_number, pr_number, commit_sha, action, confidence,
                     detection_method, extracted_from, evidence)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(link.repo_id)
            .bind(link.issue_number)
            .bind(link.pr_number)
            .bind(&link.commit_sha)
            .bind(link.action.as_str())
            .bind(link.confidence)
            .bind(link.detection_method.as_str())
            .bind(&link.extracted_from)
            .bind(&link.evidence)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn list_issue_commit_refs(&self, repo_id: i64) -> Result<Vec<IssueCommitRef>> {
        let rows = sqlx::query("SELECT * FROM issue_commit_refs WHERE repo_id = $1 ORDER BY id")
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_ref).collect()
    }

    async fn replace_validated_links(&self, repo_id: i64, links: &[ValidatedLink]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM validated_links WHERE repo_id = $1")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;

        for link in links {
            sqlx::query(
                r#"
                INSERT INTO validated_links
                    (repo_id, issue_number, pr_number, commit_sha, final_confidence,
                     detection_method, link_quality, evidence_sources, base_confidence,
                     temporal_boost, bidirectional_boost, semantic_boost, negative_penalty)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(link.repo_id)
            .bind(link.issue_number)
            .bind(link.pr_number)
            .bind(&link.commit_sha)
            .bind(link.final_confidence)
            .bind(link.detection_method.as_str())
            .bind(link.link_quality.as_str())
            .bind(&link.evidence_sources)
            .bind(link.breakdown.base)
            .bind(link.breakdown.temporal_boost)
            .bind(link.breakdown.bidirectional_boost)
            .bind(link.breakdown.semantic_boost)
            .bind(link.breakdown.negative_penalty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn list_validated_links(&self, repo_id: i64) -> Result<Vec<ValidatedLink>> {
        let rows = sqlx::query("SELECT * FROM validated_links WHERE repo_id = $1 ORDER BY id")
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_link).collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Code blocks
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn insert_code_blocks(&self, blocks: &[CodeBlockRow]) -> Result<()> {
        if blocks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for block in blocks {
            sqlx::query(
                r#"
                INSERT INTO code_blocks
                    (repo_id, commit_sha, file_path, name, kind, operation,
                     start_line, end_line)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(block.repo_id)
            .bind(&block.commit_sha)
            .bind(&block.file_path)
            .bind(&block.name)
            .bind(&block.kind)
            .bind(&block.operation)
            .bind(block.start_line)
            .bind(block.end_line)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn code_blocks_for_commit(
        &self,
        repo_id: i64,
        commit_sha: &str,
    ) -> Result<Vec<CodeBlockRow>> {
        let rows = sqlx::query(
            "SELECT * FROM code_blocks WHERE repo_id = $1 AND commit_sha = $2 ORDER BY id",
        )
        .bind(repo_id)
        .bind(commit_sha)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CodeBlockRow {
                    id: row.try_get("id")?,
                    repo_id: row.try_get("repo_id")?,
                    commit_sha: row.try_get("commit_sha")?,
                    file_path: row.try_get("file_path")?,
                    name: row.try_get("name")?,
                    kind: row.try_get("kind")?,
                    operation: row.try_get("operation")?,
                    start_line: row.try_get("start_line")?,
                    end_line: row.try_get("end_line")?,
                })
            })
            .collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Operator tools
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn search_issues(
        &self,
        repo_id: i64,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawIssue>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM raw_issues
            WHERE repo_id = $1
              AND to_tsvector('english', title || ' ' || coalesce(body, ''))
                  @@ plainto_tsquery('english', $2)
            ORDER BY ts_rank(
                to_tsvector('english', title || ' ' || coalesce(body, '')),
                plainto_tsquery('english', $2)) DESC
            LIMIT $3
            "#,
        )
        .bind(repo_id)
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_issue).collect()
    }

    async fn staging_stats(&self, repo_id: i64) -> Result<StagingStats> {
        let count = |table: &str| {
            let query = format!("SELECT COUNT(*) AS count FROM {} WHERE repo_id = $1", table);
            let pool = self.pool.clone();
            async move {
                let row = sqlx::query(&query).bind(repo_id).fetch_one(&pool).await?;
                let n: i64 = row.try_get("count")?;
                crate::error::Result::Ok(n as usize)
            }
        };

        let processed_row = sqlx::query(
            "SELECT COUNT(*) AS count FROM raw_commits WHERE repo_id = $1 AND processed = TRUE",
        )
        .bind(repo_id)
        .fetch_one(&self.pool)
        .await?;
        let commits_processed: i64 = processed_row.try_get("count")?;

        Ok(StagingStats {
            commits: count("raw_commits").await?,
            commits_processed: commits_processed as usize,
            prs: count("raw_prs").await?,
            issues: count("raw_issues").await?,
            timeline_events: count("timeline_events").await?,
            file_identities: count("file_identities").await?,
            issue_commit_refs: count("issue_commit_refs").await?,
            validated_links: count("validated_links").await?,
        })
    }

    async fn delete_repository_data(&self, repo_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "validated_links",
            "issue_commit_refs",
            "code_blocks",
            "file_identities",
            "timeline_events",
            "raw_issues",
            "raw_prs",
            "raw_commits",
        ] {
            let query = format!("DELETE FROM {} WHERE repo_id = $1", table);
            sqlx::query(&query).bind(repo_id).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM repositories WHERE id = $1")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

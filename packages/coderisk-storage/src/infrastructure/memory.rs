//! In-memory staging store (for testing).
//!
//! HashMap-backed implementation for unit and integration tests.
//! NOT for production use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::domain::models::{
    CodeBlockRow, FileIdentity, IssueCommitRef, RawCommit, RawIssue, RawPullRequest, Repository,
    StagingStats, TimelineEvent, ValidatedLink,
};
use crate::domain::ports::{StagingKind, StagingStore};
use crate::error::Result;

#[derive(Default)]
struct Tables {
    repos: HashMap<i64, Repository>,
    commits: Vec<RawCommit>,
    prs: Vec<RawPullRequest>,
    issues: Vec<RawIssue>,
    events: Vec<TimelineEvent>,
    identities: HashMap<(i64, String), FileIdentity>,
    refs: Vec<IssueCommitRef>,
    links: Vec<ValidatedLink>,
    blocks: Vec<CodeBlockRow>,
}

#[derive(Clone, Default)]
pub struct InMemoryStagingStore {
    tables: Arc<RwLock<Tables>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryStagingStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl StagingStore for InMemoryStagingStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_repository(&self, repo: &Repository) -> Result<()> {
        self.tables.write().repos.insert(repo.id, repo.clone());
        Ok(())
    }

    async fn get_repository(&self, repo_id: i64) -> Result<Option<Repository>> {
        Ok(self.tables.read().repos.get(&repo_id).cloned())
    }

    async fn insert_commits(&self, commits: &[RawCommit]) -> Result<()> {
        let mut tables = self.tables.write();
        for commit in commits {
            if tables
                .commits
                .iter()
                .any(|c| c.repo_id == commit.repo_id && c.sha == commit.sha)
            {
                continue;
            }
            let mut commit = commit.clone();
            commit.id = self.alloc_id();
            tables.commits.push(commit);
        }
        Ok(())
    }

    async fn insert_prs(&self, prs: &[RawPullRequest]) -> Result<()> {
        let mut tables = self.tables.write();
        for pr in prs {
            if tables
                .prs
                .iter()
                .any(|p| p.repo_id == pr.repo_id && p.number == pr.number)
            {
                continue;
            }
            let mut pr = pr.clone();
            pr.id = self.alloc_id();
            tables.prs.push(pr);
        }
        Ok(())
    }

    async fn insert_issues(&self, issues: &[RawIssue]) -> Result<()> {
        let mut tables = self.tables.write();
        for issue in issues {
            if tables
                .issues
                .iter()
                .any(|i| i.repo_id == issue.repo_id && i.number == issue.number)
            {
                continue;
            }
            let mut issue = issue.clone();
            issue.id = self.alloc_id();
            tables.issues.push(issue);
        }
        Ok(())
    }

    async fn insert_timeline_events(&self, events: &[TimelineEvent]) -> Result<()> {
        let mut tables = self.tables.write();
        for event in events {
            let mut event = event.clone();
            event.id = self.alloc_id();
            tables.events.push(event);
        }
        Ok(())
    }

    async fn fetch_unprocessed_commits(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawCommit>> {
        let tables = self.tables.read();
        let mut commits: Vec<RawCommit> = tables
            .commits
            .iter()
            .filter(|c| c.repo_id == repo_id && !c.processed)
            .cloned()
            .collect();
        commits.sort_by_key(|c| c.topological_index);
        commits.truncate(batch_size);
        Ok(commits)
    }

    async fn fetch_unprocessed_prs(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawPullRequest>> {
        let tables = self.tables.read();
        let mut prs: Vec<RawPullRequest> = tables
            .prs
            .iter()
            .filter(|p| p.repo_id == repo_id && !p.processed)
            .cloned()
            .collect();
        prs.sort_by_key(|p| p.number);
        prs.truncate(batch_size);
        Ok(prs)
    }

    async fn fetch_unprocessed_issues(
        &self,
        repo_id: i64,
        batch_size: usize,
    ) -> Result<Vec<RawIssue>> {
        let tables = self.tables.read();
        let mut issues: Vec<RawIssue> = tables
            .issues
            .iter()
            .filter(|i| i.repo_id == repo_id && !i.processed)
            .cloned()
            .collect();
        issues.sort_by_key(|i| i.number);
        issues.truncate(batch_size);
        Ok(issues)
    }

    async fn mark_processed(&self, kind: StagingKind, ids: &[i64]) -> Result<()> {
        let mut tables = self.tables.write();
        match kind {
            StagingKind::Commits => {
                for commit in tables.commits.iter_mut() {
                    if ids.contains(&commit.id) {
                        commit.processed = true;
                    }
                }
            }
            StagingKind::PullRequests => {
                for pr in tables.prs.iter_mut() {
                    if ids.contains(&pr.id) {
                        pr.processed = true;
                    }
                }
            }
            StagingKind::Issues => {
                for issue in tables.issues.iter_mut() {
                    if ids.contains(&issue.id) {
                        issue.processed = true;
                    }
                }
            }
        }
        Ok(())
    }

    async fn get_commit_by_sha(&self, repo_id: i64, sha: &str) -> Result<Option<RawCommit>> {
        Ok(self
            .tables
            .read()
            .commits
            .iter()
            .find(|c| c.repo_id == repo_id && c.sha == sha)
            .cloned())
    }

    async fn list_commits(&self, repo_id: i64) -> Result<Vec<RawCommit>> {
        let mut commits: Vec<RawCommit> = self
            .tables
            .read()
            .commits
            .iter()
            .filter(|c| c.repo_id == repo_id)
            .cloned()
            .collect();
        commits.sort_by_key(|c| c.topological_index);
        Ok(commits)
    }

    async fn get_pr(&self, repo_id: i64, number: i64) -> Result<Option<RawPullRequest>> {
        Ok(self
            .tables
            .read()
            .prs
            .iter()
            .find(|p| p.repo_id == repo_id && p.number == number)
            .cloned())
    }

    async fn get_issue(&self, repo_id: i64, number: i64) -> Result<Option<RawIssue>> {
        Ok(self
            .tables
            .read()
            .issues
            .iter()
            .find(|i| i.repo_id == repo_id && i.number == number)
            .cloned())
    }

    async fn list_prs(&self, repo_id: i64) -> Result<Vec<RawPullRequest>> {
        let mut prs: Vec<RawPullRequest> = self
            .tables
            .read()
            .prs
            .iter()
            .filter(|p| p.repo_id == repo_id)
            .cloned()
            .collect();
        prs.sort_by_key(|p| p.number);
        Ok(prs)
    }

    async fn list_closed_issues(&self, repo_id: i64) -> Result<Vec<RawIssue>> {
        let mut issues: Vec<RawIssue> = self
            .tables
            .read()
            .issues
            .iter()
            .filter(|i| i.repo_id == repo_id && i.closed_at.is_some())
            .cloned()
            .collect();
        issues.sort_by_key(|i| i.number);
        Ok(issues)
    }

    async fn prs_merged_between(
        &self,
        repo_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawPullRequest>> {
        Ok(self
            .tables
            .read()
            .prs
            .iter()
            .filter(|p| {
                p.repo_id == repo_id
                    && p.merged_at.map(|t| t >= from && t <= to).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn commits_authored_between(
        &self,
        repo_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawCommit>> {
        Ok(self
            .tables
            .read()
            .commits
            .iter()
            .filter(|c| c.repo_id == repo_id && c.author_date >= from && c.author_date <= to)
            .cloned()
            .collect())
    }

    async fn timeline_events(&self, repo_id: i64) -> Result<Vec<TimelineEvent>> {
        let mut events: Vec<TimelineEvent> = self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.repo_id == repo_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.at);
        Ok(events)
    }

    async fn upsert_file_identity(&self, identity: &FileIdentity) -> Result<()> {
        self.tables.write().identities.insert(
            (identity.repo_id, identity.canonical_path.clone()),
            identity.clone(),
        );
        Ok(())
    }

    async fn get_file_identity(
        &self,
        repo_id: i64,
        canonical_path: &str,
    ) -> Result<Option<FileIdentity>> {
        Ok(self
            .tables
            .read()
            .identities
            .get(&(repo_id, canonical_path.to_string()))
            .cloned())
    }

    async fn find_identity_by_path(
        &self,
        repo_id: i64,
        path: &str,
    ) -> Result<Option<FileIdentity>> {
        Ok(self
            .tables
            .read()
            .identities
            .values()
            .find(|identity| identity.repo_id == repo_id && identity.knows_path(path))
            .cloned())
    }

    async fn list_file_identities(&self, repo_id: i64) -> Result<Vec<FileIdentity>> {
        let mut identities: Vec<FileIdentity> = self
            .tables
            .read()
            .identities
            .values()
            .filter(|identity| identity.repo_id == repo_id)
            .cloned()
            .collect();
        identities.sort_by(|a, b| a.canonical_path.cmp(&b.canonical_path));
        Ok(identities)
    }

    async fn replace_issue_commit_refs(
        &self,
        repo_id: i64,
        refs: &[IssueCommitRef],
    ) -> Result<()> {
        let mut tables = self.tables.write();
        tables.refs.retain(|r| r.repo_id != repo_id);
        for link in refs {
            let mut link = link.clone();
            link.id = self.alloc_id();
            tables.refs.push(link);
        }
        Ok(())
    }

    async fn list_issue_commit_refs(&self, repo_id: i64) -> Result<Vec<IssueCommitRef>> {
        Ok(self
            .tables
            .read()
            .refs
            .iter()
            .filter(|r| r.repo_id == repo_id)
            .cloned()
            .collect())
    }

    async fn replace_validated_links(&self, repo_id: i64, links: &[ValidatedLink]) -> Result<()> {
        let mut tables = self.tables.write();
        tables.links.retain(|l| l.repo_id != repo_id);
        for link in links {
            let mut link = link.clone();
            link.id = self.alloc_id();
            tables.links.push(link);
        }
        Ok(())
    }

    async fn list_validated_links(&self, repo_id: i64) -> Result<Vec<ValidatedLink>> {
        Ok(self
            .tables
            .read()
            .links
            .iter()
            .filter(|l| l.repo_id == repo_id)
            .cloned()
            .collect())
    }

    async fn insert_code_blocks(&self, blocks: &[CodeBlockRow]) -> Result<()> {
        let mut tables = self.tables.write();
        for block in blocks {
            let mut block = block.clone();
            block.id = self.alloc_id();
            tables.blocks.push(block);
        }
        Ok(())
    }

    async fn code_blocks_for_commit(
        &self,
        repo_id: i64,
        commit_sha: &str,
    ) -> Result<Vec<CodeBlockRow>> {
        Ok(self
            .tables
            .read()
            .blocks
            .iter()
            .filter(|b| b.repo_id == repo_id && b.commit_sha == commit_sha)
            .cloned()
            .collect())
    }

    async fn search_issues(
        &self,
        repo_id: i64,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawIssue>> {
        // Substring match stands in for full-text search.
        let needle = query.to_lowercase();
        Ok(self
            .tables
            .read()
            .issues
            .iter()
            .filter(|i| {
                i.repo_id == repo_id
                    && (i.title.to_lowercase().contains(&needle)
                        || i.body
                            .as_deref()
                            .map(|b| b.to_lowercase().contains(&needle))
                            .unwrap_or(false))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn staging_stats(&self, repo_id: i64) -> Result<StagingStats> {
        let tables = self.tables.read();
        Ok(StagingStats {
            commits: tables.commits.iter().filter(|c| c.repo_id == repo_id).count(),
            commits_processed: tables
                .commits
                .iter()
                .filter(|c| c.repo_id == repo_id && c.processed)
                .count(),
            prs: tables.prs.iter().filter(|p| p.repo_id == repo_id).count(),
            issues: tables.issues.iter().filter(|i| i.repo_id == repo_id).count(),
            timeline_events: tables.events.iter().filter(|e| e.repo_id == repo_id).count(),
            file_identities: tables
                .identities
                .values()
                .filter(|f| f.repo_id == repo_id)
                .count(),
            issue_commit_refs: tables.refs.iter().filter(|r| r.repo_id == repo_id).count(),
            validated_links: tables.links.iter().filter(|l| l.repo_id == repo_id).count(),
        })
    }

    async fn delete_repository_data(&self, repo_id: i64) -> Result<()> {
        let mut tables = self.tables.write();
        tables.repos.remove(&repo_id);
        tables.commits.retain(|c| c.repo_id != repo_id);
        tables.prs.retain(|p| p.repo_id != repo_id);
        tables.issues.retain(|i| i.repo_id != repo_id);
        tables.events.retain(|e| e.repo_id != repo_id);
        tables.identities.retain(|_, f| f.repo_id != repo_id);
        tables.refs.retain(|r| r.repo_id != repo_id);
        tables.links.retain(|l| l.repo_id != repo_id);
        tables.blocks.retain(|b| b.repo_id != repo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn commit(repo_id: i64, sha: &str, topo: i64) -> RawCommit {
        RawCommit {
            id: 0,
            repo_id,
            sha: sha.to_string(),
            message: format!("commit {}", sha),
            author_name: "x".into(),
            author_email: "x@example.com".into(),
            author_date: Utc.timestamp_opt(1_700_000_000 + topo, 0).unwrap(),
            topological_index: topo,
            raw_json: json!({"files": []}),
            processed: false,
        }
    }

    #[tokio::test]
    async fn test_insert_commits_deduplicates_on_sha() {
        let store = InMemoryStagingStore::new();
        store
            .insert_commits(&[commit(1, "aaa", 0), commit(1, "aaa", 0)])
            .await
            .unwrap();

        let unprocessed = store.fetch_unprocessed_commits(1, 10).await.unwrap();
        assert_eq!(unprocessed.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unprocessed_is_topologically_ordered() {
        let store = InMemoryStagingStore::new();
        store
            .insert_commits(&[commit(1, "ccc", 2), commit(1, "aaa", 0), commit(1, "bbb", 1)])
            .await
            .unwrap();

        let batch = store.fetch_unprocessed_commits(1, 10).await.unwrap();
        let shas: Vec<&str> = batch.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["aaa", "bbb", "ccc"]);
    }

    #[tokio::test]
    async fn test_mark_processed_hides_rows() {
        let store = InMemoryStagingStore::new();
        store.insert_commits(&[commit(1, "aaa", 0)]).await.unwrap();

        let batch = store.fetch_unprocessed_commits(1, 10).await.unwrap();
        store
            .mark_processed(StagingKind::Commits, &[batch[0].id])
            .await
            .unwrap();

        assert!(store.fetch_unprocessed_commits(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_identity_by_historical_path() {
        let store = InMemoryStagingStore::new();
        let mut identity = FileIdentity::new(1, "b.go");
        identity.add_historical("a.go");
        store.upsert_file_identity(&identity).await.unwrap();

        let found = store.find_identity_by_path(1, "a.go").await.unwrap().unwrap();
        assert_eq!(found.canonical_path, "b.go");
        assert!(store.find_identity_by_path(1, "zzz.go").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_repository_data_scopes_by_repo() {
        let store = InMemoryStagingStore::new();
        store.insert_commits(&[commit(1, "aaa", 0), commit(2, "bbb", 0)]).await.unwrap();

        store.delete_repository_data(1).await.unwrap();

        assert!(store.fetch_unprocessed_commits(1, 10).await.unwrap().is_empty());
        assert_eq!(store.fetch_unprocessed_commits(2, 10).await.unwrap().len(), 1);
    }
}

//! Identity-map construction from staged commits.
//!
//! Walks every commit in topological order and threads rename chains
//! forward, so that by the end each surviving file has exactly one
//! identity whose canonical path is its name at HEAD. The final map is
//! computed in full before anything is persisted; an interrupted write
//! leaves only a subset of the same final rows, which the next run
//! overwrites.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use coderisk_storage::{FileChangeStatus, FileIdentity, StagingStore};

use crate::shared::models::Result;

pub struct IdentityMapBuilder {
    staging: Arc<dyn StagingStore>,
    repo_id: i64,
}

impl IdentityMapBuilder {
    pub fn new(staging: Arc<dyn StagingStore>, repo_id: i64) -> Self {
        Self { staging, repo_id }
    }

    /// Recompute and persist the full identity map. Returns the number of
    /// identities written.
    pub async fn rebuild(&self) -> Result<usize> {
        let commits = self.staging.list_commits(self.repo_id).await?;

        // Keyed by the file's current name at this point of the walk.
        let mut map: HashMap<String, FileIdentity> = HashMap::new();

        for commit in &commits {
            let changes = match commit.file_changes() {
                Ok(changes) => changes,
                Err(err) => {
                    warn!(sha = %commit.sha, error = %err, "skipping malformed commit payload");
                    continue;
                }
            };

            for change in changes {
                match (change.status, change.previous_filename.as_deref()) {
                    (FileChangeStatus::Renamed, Some(previous)) => {
                        let mut identity = map
                            .remove(previous)
                            .unwrap_or_else(|| FileIdentity::new(self.repo_id, previous));
                        identity.canonical_path = change.filename.clone();
                        identity.add_historical(previous.to_string());
                        identity.add_historical(change.filename.clone());
                        map.insert(change.filename.clone(), identity);
                    }
                    _ => {
                        map.entry(change.filename.clone()).or_insert_with(|| {
                            FileIdentity::new(self.repo_id, change.filename.clone())
                        });
                    }
                }
            }
        }

        let count = map.len();
        for identity in map.into_values() {
            self.staging.upsert_file_identity(&identity).await?;
        }

        info!(repo_id = self.repo_id, identities = count, "identity map rebuilt");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use coderisk_storage::{InMemoryStagingStore, RawCommit};
    use serde_json::json;

    fn commit(topo: i64, sha: &str, files: serde_json::Value) -> RawCommit {
        RawCommit {
            id: 0,
            repo_id: 1,
            sha: sha.to_string(),
            message: String::new(),
            author_name: "x".into(),
            author_email: "x@example.com".into(),
            author_date: Utc.timestamp_opt(1_700_000_000 + topo, 0).unwrap(),
            topological_index: topo,
            raw_json: json!({ "files": files }),
            processed: false,
        }
    }

    #[tokio::test]
    async fn test_rename_chain_collapses_to_one_identity() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[
                commit(0, "c1", json!([{"filename": "a.go", "status": "added"}])),
                commit(
                    1,
                    "c2",
                    json!([{"filename": "b.go", "status": "renamed", "previous_filename": "a.go"}]),
                ),
                commit(2, "c3", json!([{"filename": "b.go", "status": "modified"}])),
            ])
            .await
            .unwrap();

        let written = IdentityMapBuilder::new(staging.clone(), 1).rebuild().await.unwrap();
        assert_eq!(written, 1);

        let identity = staging.get_file_identity(1, "b.go").await.unwrap().unwrap();
        assert_eq!(identity.canonical_path, "b.go");
        assert_eq!(identity.historical_paths, vec!["a.go", "b.go"]);
        assert!(staging.get_file_identity(1, "a.go").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_canonical_path_is_always_historical() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[commit(
                0,
                "c1",
                json!([{"filename": "main.go", "status": "modified", "additions": 1}]),
            )])
            .await
            .unwrap();

        IdentityMapBuilder::new(staging.clone(), 1).rebuild().await.unwrap();

        for identity in staging.list_file_identities(1).await.unwrap() {
            assert!(identity.historical_paths.contains(&identity.canonical_path));
        }
    }

    #[tokio::test]
    async fn test_deleted_file_keeps_one_identity() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[
                commit(0, "c1", json!([{"filename": "tmp.go", "status": "added"}])),
                commit(1, "c2", json!([{"filename": "tmp.go", "status": "deleted"}])),
            ])
            .await
            .unwrap();

        IdentityMapBuilder::new(staging.clone(), 1).rebuild().await.unwrap();

        let identity = staging.get_file_identity(1, "tmp.go").await.unwrap().unwrap();
        assert_eq!(identity.canonical_path, "tmp.go");
        assert_eq!(identity.historical_paths, vec!["tmp.go"]);
        assert_eq!(staging.list_file_identities(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let staging = Arc::new(InMemoryStagingStore::new());
        staging
            .insert_commits(&[
                commit(0, "c1", json!([{"filename": "a.go", "status": "added"}])),
                commit(
                    1,
                    "c2",
                    json!([{"filename": "b.go", "status": "renamed", "previous_filename": "a.go"}]),
                ),
            ])
            .await
            .unwrap();

        let builder = IdentityMapBuilder::new(staging.clone(), 1);
        builder.rebuild().await.unwrap();
        let first = staging.list_file_identities(1).await.unwrap();

        builder.rebuild().await.unwrap();
        let second = staging.list_file_identities(1).await.unwrap();

        assert_eq!(first, second);
    }
}

//! Two-level path resolution.
//!
//! Queries must work whether the user types the current path while the
//! graph stores historical paths, or the other way round. Resolution
//! order, first hit wins:
//!
//! 1. Exact match against the identity map (confidence 1.00)
//! 2. Rename-chain walk via git rename detection (confidence 0.95)
//!
//! Anything else is reported as a new file (confidence 0.00) and
//! downstream queries proceed with the literal path.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use coderisk_storage::StagingStore;

use crate::features::identity::domain::{PathResolution, ResolutionMethod};
use crate::features::identity::infrastructure::{GitError, GitExecutor, RenameWalker};
use crate::shared::models::Result;

/// Default bound on concurrent resolutions in a batch.
const DEFAULT_WORKERS: usize = 20;

pub struct FileIdentityResolver {
    staging: Arc<dyn StagingStore>,
    repo_id: i64,
    git: Option<GitExecutor>,
    /// Invocation-scoped; never shared across commands.
    cache: DashMap<String, PathResolution>,
    workers: usize,
}

impl FileIdentityResolver {
    pub fn new(staging: Arc<dyn StagingStore>, repo_id: i64, git: Option<GitExecutor>) -> Self {
        Self {
            staging,
            repo_id,
            git,
            cache: DashMap::new(),
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Resolve one path to its canonical identity.
    pub async fn resolve(&self, path: &str) -> Result<PathResolution> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(hit.clone());
        }

        let resolution = self.resolve_uncached(path).await?;
        self.cache.insert(path.to_string(), resolution.clone());
        Ok(resolution)
    }

    /// Resolve many paths with a bounded worker pool, preserving input order.
    pub async fn resolve_batch(&self, paths: &[String]) -> Result<Vec<PathResolution>> {
        let mut resolved: Vec<(usize, PathResolution)> = stream::iter(paths.iter().enumerate())
            .map(|(index, path)| async move { (index, self.resolve(path).await) })
            .buffer_unordered(self.workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|(index, result)| result.map(|r| (index, r)))
            .collect::<Result<_>>()?;

        resolved.sort_by_key(|(index, _)| *index);
        Ok(resolved.into_iter().map(|(_, r)| r).collect())
    }

    async fn resolve_uncached(&self, path: &str) -> Result<PathResolution> {
        // Level 1: identity map, canonical or historical.
        if let Some(identity) = self.staging.find_identity_by_path(self.repo_id, path).await? {
            return Ok(PathResolution {
                input_path: path.to_string(),
                canonical_path: identity.canonical_path,
                historical_paths: identity.historical_paths,
                confidence: 1.0,
                method: ResolutionMethod::Exact,
            });
        }

        // Level 2: rename-chain walk, covering cold starts where the
        // identity map is incomplete.
        if let Some(git) = &self.git {
            match self.walk_renames(git, path).await {
                Ok(Some(resolution)) => return Ok(resolution),
                Ok(None) => {}
                Err(err) => {
                    warn!(path, error = %err, "rename walk failed, treating as new file");
                }
            }
        }

        debug!(path, "no identity found, reporting new file");
        Ok(PathResolution::new_file(path))
    }

    async fn walk_renames(
        &self,
        git: &GitExecutor,
        path: &str,
    ) -> std::result::Result<Option<PathResolution>, GitError> {
        let walker = RenameWalker::new(git);

        let canonical = if git.exists_at_head(path).await {
            Some(path.to_string())
        } else {
            walker.current_name(path).await?
        };

        let Some(canonical) = canonical else {
            return Ok(None);
        };

        let mut historical = walker.chain_from_head(&canonical).await?;
        if historical.is_empty() {
            return Ok(None);
        }
        if !historical.iter().any(|p| p == path) {
            historical.push(path.to_string());
        }

        Ok(Some(PathResolution {
            input_path: path.to_string(),
            canonical_path: canonical,
            historical_paths: historical,
            confidence: 0.95,
            method: ResolutionMethod::GitFollow,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderisk_storage::{FileIdentity, InMemoryStagingStore};

    async fn store_with_identity() -> Arc<InMemoryStagingStore> {
        let store = Arc::new(InMemoryStagingStore::new());
        let mut identity = FileIdentity::new(1, "b.go");
        identity.add_historical("a.go");
        store.upsert_file_identity(&identity).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_exact_match_by_canonical_path() {
        let resolver = FileIdentityResolver::new(store_with_identity().await, 1, None);

        let resolution = resolver.resolve("b.go").await.unwrap();
        assert_eq!(resolution.canonical_path, "b.go");
        assert_eq!(resolution.confidence, 1.0);
        assert_eq!(resolution.method, ResolutionMethod::Exact);
    }

    #[tokio::test]
    async fn test_exact_match_by_historical_path() {
        let resolver = FileIdentityResolver::new(store_with_identity().await, 1, None);

        let resolution = resolver.resolve("a.go").await.unwrap();
        assert_eq!(resolution.canonical_path, "b.go");
        assert!(resolution.historical_paths.contains(&"a.go".to_string()));
        assert_eq!(resolution.method, ResolutionMethod::Exact);
    }

    #[tokio::test]
    async fn test_unknown_path_reports_new_file() {
        let resolver = FileIdentityResolver::new(store_with_identity().await, 1, None);

        let resolution = resolver.resolve("never/seen.rs").await.unwrap();
        assert_eq!(resolution.method, ResolutionMethod::NewFile);
        assert_eq!(resolution.confidence, 0.0);
        assert_eq!(resolution.canonical_path, "never/seen.rs");
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order_and_caches() {
        let resolver =
            FileIdentityResolver::new(store_with_identity().await, 1, None).with_workers(4);

        let paths = vec!["a.go".to_string(), "new.rs".to_string(), "b.go".to_string()];
        let resolutions = resolver.resolve_batch(&paths).await.unwrap();

        assert_eq!(resolutions.len(), 3);
        assert_eq!(resolutions[0].input_path, "a.go");
        assert_eq!(resolutions[1].input_path, "new.rs");
        assert_eq!(resolutions[2].input_path, "b.go");
        assert_eq!(resolver.cache.len(), 3);
    }
}

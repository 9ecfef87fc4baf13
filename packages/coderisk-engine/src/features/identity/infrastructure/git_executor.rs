/// Git command executor
use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::error::{GitError, Result};

/// Executes git commands in a repository working copy.
///
/// Every invocation goes through the async process API so callers can be
/// cancelled by their surrounding deadline.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    repo_path: PathBuf,
}

impl GitExecutor {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let path = repo_path.as_ref().to_path_buf();

        if !path.join(".git").exists() {
            return Err(GitError::NotARepository(path.display().to_string()));
        }

        Ok(Self { repo_path: path })
    }

    /// Run a git command and return stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(GitError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    /// Whether `path` exists at HEAD.
    pub async fn exists_at_head(&self, path: &str) -> bool {
        self.run(&["cat-file", "-e", &format!("HEAD:{}", path)])
            .await
            .is_ok()
    }

    /// The patch for a single commit, with rename detection enabled.
    pub async fn show_patch(&self, sha: &str) -> Result<String> {
        self.run(&["show", "--patch", "--find-renames", "--format=format:", sha])
            .await
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_repository() {
        let result = GitExecutor::new("/tmp/definitely_not_a_repo");
        assert!(result.is_err());
    }
}

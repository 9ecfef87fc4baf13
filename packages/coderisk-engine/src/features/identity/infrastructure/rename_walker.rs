//! Rename-chain reconstruction from git history.
//!
//! `git log --follow --name-status` emits rename records of the form
//! `R<score>\t<old>\t<new>`; walking them from HEAD backward yields every
//! name a file has carried. The forward direction (historical name →
//! current name) is recovered by chasing rename records until a name that
//! exists at HEAD is reached.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::Result;
use super::git_executor::GitExecutor;

static RENAME_RECORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^R\d*\t([^\t]+)\t([^\t\r\n]+)$").expect("static regex"));

/// Maximum rename hops chased in the forward direction. Chains longer
/// than this are treated as unresolvable.
const MAX_RENAME_HOPS: usize = 10;

pub struct RenameWalker<'a> {
    git: &'a GitExecutor,
}

impl<'a> RenameWalker<'a> {
    pub fn new(git: &'a GitExecutor) -> Self {
        Self { git }
    }

    /// Every name in `path`'s rename chain, newest first, `path` included.
    ///
    /// Empty result means git has no history for the path at all.
    pub async fn chain_from_head(&self, path: &str) -> Result<Vec<String>> {
        let log = self
            .git
            .run(&[
                "log",
                "--follow",
                "--name-status",
                "--format=format:%H",
                "--",
                path,
            ])
            .await?;

        if log.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut names = vec![path.to_string()];
        for captures in RENAME_RECORD.captures_iter(&log) {
            for name in [&captures[2], &captures[1]] {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    /// Resolve a historical name to the name the file carries at HEAD.
    ///
    /// Chases `R old new` records forward; returns `None` when the chain
    /// dead-ends (file deleted, or never renamed and absent at HEAD).
    pub async fn current_name(&self, historical: &str) -> Result<Option<String>> {
        let mut current = historical.to_string();

        for _ in 0..MAX_RENAME_HOPS {
            if self.git.exists_at_head(&current).await {
                return Ok(Some(current));
            }

            let log = self
                .git
                .run(&[
                    "log",
                    "--name-status",
                    "--find-renames",
                    "--format=format:%H",
                    "--",
                    &current,
                ])
                .await?;

            let next = RENAME_RECORD
                .captures_iter(&log)
                .find(|c| &c[1] == current.as_str())
                .map(|c| c[2].to_string());

            match next {
                Some(name) => current = name,
                None => return Ok(None),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_record_parses_score_variants() {
        let log = "abc123\nR100\ta.go\tb.go\nR087\tsrc/x.rs\tsrc/y.rs\nM\tmain.go\n";
        let records: Vec<(String, String)> = RENAME_RECORD
            .captures_iter(log)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();

        assert_eq!(
            records,
            vec![
                ("a.go".to_string(), "b.go".to_string()),
                ("src/x.rs".to_string(), "src/y.rs".to_string()),
            ]
        );
    }
}

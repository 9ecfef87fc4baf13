//! Atomizer output models, mirroring the constrained response schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOperation {
    Added,
    Modified,
    Removed,
}

impl BlockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockOperation::Added => "added",
            BlockOperation::Modified => "modified",
            BlockOperation::Removed => "removed",
        }
    }
}

/// One code block touched by a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockChange {
    pub operation: BlockOperation,
    pub file_path: String,
    pub name: String,
    /// "function", "method", "type", ...
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub start_line: i64,
    #[serde(default)]
    pub end_line: i64,
}

fn default_kind() -> String {
    "function".to_string()
}

/// A block rename inferred from the diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRename {
    pub from_file: String,
    pub from_name: String,
    pub to_file: String,
    pub to_name: String,
}

/// An import/use relation between blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockImport {
    pub from_file: String,
    pub from_name: String,
    pub to_file: String,
    pub to_name: String,
}

/// Full constrained response for one commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomizedCommit {
    #[serde(default)]
    pub blocks: Vec<BlockChange>,
    #[serde(default)]
    pub renames: Vec<BlockRename>,
    #[serde(default)]
    pub imports: Vec<BlockImport>,
}

/// Counters for one Atomizer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtomizeReport {
    pub commits_processed: usize,
    pub commits_skipped: usize,
    pub blocks_written: usize,
    pub edges_written: usize,
}

//! Staging entities.
//!
//! Raw provider payloads are kept verbatim in `raw_json`; the typed columns
//! are the subset the pipeline queries. Timestamps are UTC throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StagingError};

/// A tracked repository. Created once; immutable apart from metadata refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    /// e.g. "acme/payments"
    pub full_name: String,
    /// Local working-copy path used for git subprocess calls.
    pub absolute_path: String,
    pub default_branch: String,
}

/// Per-file change entry inside a commit payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub status: FileChangeStatus,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    /// Present when `status == Renamed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl FileChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileChangeStatus::Added => "added",
            FileChangeStatus::Modified => "modified",
            FileChangeStatus::Deleted => "deleted",
            FileChangeStatus::Renamed => "renamed",
        }
    }
}

/// Raw commit row, unique per `(repo_id, sha)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommit {
    pub id: i64,
    pub repo_id: i64,
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub author_date: DateTime<Utc>,
    /// Per-repository total order respecting parent → child.
    pub topological_index: i64,
    /// Full provider payload including `files: [FileChange]`.
    pub raw_json: serde_json::Value,
    pub processed: bool,
}

impl RawCommit {
    /// Decode the per-file change entries from the raw payload.
    ///
    /// A payload without a `files` array decodes to an empty list (a commit
    /// touching zero files is legal).
    pub fn file_changes(&self) -> Result<Vec<FileChange>> {
        match self.raw_json.get("files") {
            Some(files) => serde_json::from_value(files.clone()).map_err(|e| {
                StagingError::InvalidData(format!(
                    "commit {}: malformed files payload: {}",
                    self.sha, e
                ))
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Raw pull-request row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPullRequest {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub merged: bool,
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_commit_sha: Option<String>,
    pub created_at: DateTime<Utc>,
    pub raw_json: serde_json::Value,
    pub processed: bool,
}

impl RawPullRequest {
    /// Author email as reported by the provider, falling back to a
    /// noreply address derived from the login when the email is absent.
    pub fn author_email(&self, noreply_host: &str) -> Option<String> {
        if let Some(email) = self
            .raw_json
            .pointer("/user/email")
            .and_then(|v| v.as_str())
        {
            if !email.is_empty() {
                return Some(email.to_string());
            }
        }
        self.raw_json
            .pointer("/user/login")
            .and_then(|v| v.as_str())
            .map(|login| format!("{}@users.noreply.{}", login, noreply_host))
    }

    pub fn base_branch(&self) -> Option<&str> {
        self.raw_json.pointer("/base/ref").and_then(|v| v.as_str())
    }

    pub fn head_branch(&self) -> Option<&str> {
        self.raw_json.pointer("/head/ref").and_then(|v| v.as_str())
    }
}

/// Raw issue row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub raw_json: serde_json::Value,
    pub processed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEventType {
    /// Another object (a PR) referenced this issue.
    #[serde(rename = "cross-referenced")]
    CrossReferenced,
    /// The issue was closed, optionally by a commit (`source_sha`).
    #[serde(rename = "closed")]
    Closed,
}

impl TimelineEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEventType::CrossReferenced => "cross-referenced",
            TimelineEventType::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "cross-referenced" => Ok(TimelineEventType::CrossReferenced),
            "closed" => Ok(TimelineEventType::Closed),
            other => Err(StagingError::InvalidData(format!(
                "unknown timeline event type: {}",
                other
            ))),
        }
    }
}

/// Issue timeline event as collected from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: i64,
    pub repo_id: i64,
    pub issue_number: i64,
    pub event_type: TimelineEventType,
    /// "pull_request" for cross-references sourced from a PR.
    pub source_type: Option<String>,
    pub source_number: Option<i64>,
    pub source_sha: Option<String>,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
}

/// Canonical identity of a file across its rename chain.
///
/// Invariant: `canonical_path` is always a member of `historical_paths`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub repo_id: i64,
    /// The file's path at HEAD of the default branch.
    pub canonical_path: String,
    /// Every path the file has had, including the canonical one.
    pub historical_paths: Vec<String>,
}

impl FileIdentity {
    pub fn new(repo_id: i64, canonical_path: impl Into<String>) -> Self {
        let canonical_path = canonical_path.into();
        Self {
            repo_id,
            historical_paths: vec![canonical_path.clone()],
            canonical_path,
        }
    }

    /// Record a historical path, keeping the list deduplicated.
    pub fn add_historical(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.historical_paths.contains(&path) {
            self.historical_paths.push(path);
        }
    }

    pub fn knows_path(&self, path: &str) -> bool {
        self.canonical_path == path || self.historical_paths.iter().any(|p| p == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    Fixes,
    Mentions,
    AssociatedWith,
}

impl LinkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkAction::Fixes => "fixes",
            LinkAction::Mentions => "mentions",
            LinkAction::AssociatedWith => "associated_with",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "fixes" => Ok(LinkAction::Fixes),
            "mentions" => Ok(LinkAction::Mentions),
            "associated_with" => Ok(LinkAction::AssociatedWith),
            other => Err(StagingError::InvalidData(format!(
                "unknown link action: {}",
                other
            ))),
        }
    }
}

/// How a candidate issue↔PR/commit link was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    /// 100%-confidence provider timeline event.
    #[serde(rename = "timeline")]
    Timeline,
    /// Textual `fixes #N` style reference.
    #[serde(rename = "explicit")]
    Explicit,
    /// Merge/close temporal proximity.
    #[serde(rename = "temporal")]
    Temporal,
    /// Two non-explicit methods agreed.
    #[serde(rename = "bidirectional")]
    Bidirectional,
    /// An explicit reference corroborated by a second method.
    #[serde(rename = "explicit-bidirectional")]
    ExplicitBidirectional,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Timeline => "timeline",
            DetectionMethod::Explicit => "explicit",
            DetectionMethod::Temporal => "temporal",
            DetectionMethod::Bidirectional => "bidirectional",
            DetectionMethod::ExplicitBidirectional => "explicit-bidirectional",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "timeline" => Ok(DetectionMethod::Timeline),
            "explicit" => Ok(DetectionMethod::Explicit),
            "temporal" => Ok(DetectionMethod::Temporal),
            "bidirectional" => Ok(DetectionMethod::Bidirectional),
            "explicit-bidirectional" => Ok(DetectionMethod::ExplicitBidirectional),
            other => Err(StagingError::InvalidData(format!(
                "unknown detection method: {}",
                other
            ))),
        }
    }
}

/// Candidate link between an issue and a PR and/or commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCommitRef {
    pub id: i64,
    pub repo_id: i64,
    pub issue_number: i64,
    pub pr_number: Option<i64>,
    pub commit_sha: Option<String>,
    pub action: LinkAction,
    pub confidence: f64,
    pub detection_method: DetectionMethod,
    /// Where the reference text was found ("pr_body", "commit_message", ...).
    pub extracted_from: String,
    pub evidence: Vec<String>,
}

/// Final classification of a validated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkQuality {
    FixedBy,
    AssociatedWith,
}

impl LinkQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkQuality::FixedBy => "fixed_by",
            LinkQuality::AssociatedWith => "associated_with",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "fixed_by" => Ok(LinkQuality::FixedBy),
            "associated_with" => Ok(LinkQuality::AssociatedWith),
            other => Err(StagingError::InvalidData(format!(
                "unknown link quality: {}",
                other
            ))),
        }
    }
}

/// Per-signal confidence composition for a validated link.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub base: f64,
    pub temporal_boost: f64,
    pub bidirectional_boost: f64,
    pub semantic_boost: f64,
    pub negative_penalty: f64,
}

impl ConfidenceBreakdown {
    /// Combined confidence, clamped to [0, 1].
    pub fn total(&self) -> f64 {
        (self.base + self.temporal_boost + self.bidirectional_boost + self.semantic_boost
            - self.negative_penalty)
            .clamp(0.0, 1.0)
    }
}

/// Ground-truth-classified issue↔PR/commit link, loaded as a graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedLink {
    pub id: i64,
    pub repo_id: i64,
    pub issue_number: i64,
    pub pr_number: Option<i64>,
    pub commit_sha: Option<String>,
    pub final_confidence: f64,
    pub detection_method: DetectionMethod,
    pub link_quality: LinkQuality,
    pub evidence_sources: Vec<String>,
    pub breakdown: ConfidenceBreakdown,
}

/// Function-granularity code entity extracted by the Atomizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlockRow {
    pub id: i64,
    pub repo_id: i64,
    pub commit_sha: String,
    pub file_path: String,
    pub name: String,
    /// "function", "method", "type", ...
    pub kind: String,
    /// "added", "modified" or "removed" in this commit.
    pub operation: String,
    pub start_line: i64,
    pub end_line: i64,
}

/// Row counts per staging table, for operator visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingStats {
    pub commits: usize,
    pub commits_processed: usize,
    pub prs: usize,
    pub issues: usize,
    pub timeline_events: usize,
    pub file_identities: usize,
    pub issue_commit_refs: usize,
    pub validated_links: usize,
}

//! Linker orchestration.
//!
//! Runs after the timeline edges exist in the graph. Its own outputs are
//! marked `created_from = "validated_link"`; before writing, every
//! FIXED_BY / ASSOCIATED_WITH edge of the repo is dropped (marked or not,
//! covering partial prior runs) while REFERENCES / CLOSED_BY are never
//! selected and survive any number of re-runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::json;
use tracing::{debug, info};

use coderisk_storage::{
    DetectionMethod, LinkAction, LinkQuality, RawIssue, StagingStore, TimelineEventType,
};

use crate::features::graph::{EdgeFilter, EdgeKind, GraphEdge, GraphStore, NodeLabel, NodeRef};
use crate::features::linking::domain::{CandidateLink, LinkReport, MergedLink};
use crate::features::linking::infrastructure::{
    extract_references, issue_target_similarity, semantic_confidence_boost,
    temporal_base_confidence, temporal_signal_boost, SEMANTIC_FLOOR_SECS,
};
use crate::shared::models::Result;

/// Penalty applied to explicit references targeting a PR that was closed
/// without being merged.
const UNMERGED_PR_PENALTY: f64 = 0.25;

pub struct Linker {
    staging: Arc<dyn StagingStore>,
    graph: Arc<dyn GraphStore>,
}

/// One temporal-correlation pair awaiting CPU-side similarity scoring.
struct TemporalPair {
    issue_number: i64,
    pr_number: Option<i64>,
    commit_sha: Option<String>,
    issue_title: String,
    issue_body: Option<String>,
    target_title: String,
    target_body: Option<String>,
    delta_secs: i64,
    base_confidence: f64,
}

impl Linker {
    pub fn new(staging: Arc<dyn StagingStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self { staging, graph }
    }

    pub async fn run(&self, repo_id: i64) -> Result<LinkReport> {
        let mut candidates = Vec::new();
        candidates.extend(self.timeline_candidates(repo_id).await?);
        candidates.extend(self.explicit_candidates(repo_id).await?);
        candidates.extend(self.temporal_candidates(repo_id).await?);

        // Drop references to issues that were never staged.
        let mut known = Vec::new();
        for candidate in candidates {
            if self
                .staging
                .get_issue(repo_id, candidate.issue_number)
                .await?
                .is_none()
            {
                debug!(
                    issue = candidate.issue_number,
                    "reference to unknown issue dropped"
                );
                continue;
            }
            known.push(candidate);
        }

        let mut report = LinkReport {
            candidates: known.len(),
            ..LinkReport::default()
        };

        let refs: Vec<_> = known.iter().map(|c| c.to_ref(repo_id)).collect();
        self.staging.replace_issue_commit_refs(repo_id, &refs).await?;

        // Bidirectional merge.
        let mut by_tuple: ahash::AHashMap<(i64, Option<i64>, Option<String>), Vec<CandidateLink>> =
            ahash::AHashMap::new();
        for candidate in known {
            by_tuple.entry(candidate.tuple()).or_default().push(candidate);
        }

        let mut validated = Vec::new();
        for (_, group) in by_tuple {
            let Some(merged) = MergedLink::from_candidates(group) else {
                continue;
            };
            report.merged += 1;

            match merged.classify() {
                Some(LinkQuality::FixedBy) => {
                    report.fixed_by += 1;
                    validated.push(merged.to_validated(repo_id, LinkQuality::FixedBy));
                }
                Some(LinkQuality::AssociatedWith) => {
                    report.associated_with += 1;
                    validated.push(merged.to_validated(repo_id, LinkQuality::AssociatedWith));
                }
                None => report.filtered_out += 1,
            }
        }

        self.staging
            .replace_validated_links(repo_id, &validated)
            .await?;

        // Replace link edges wholesale; timeline kinds are not selected.
        self.graph
            .delete_edges(&EdgeFilter {
                repo_id,
                kinds: vec![EdgeKind::FixedBy, EdgeKind::AssociatedWith],
            })
            .await?;

        let mut edges = Vec::new();
        for link in &validated {
            let target = if let Some(pr_number) = link.pr_number {
                NodeRef::new(NodeLabel::PullRequest, pr_number.to_string())
            } else if let Some(sha) = &link.commit_sha {
                NodeRef::new(NodeLabel::Commit, sha)
            } else {
                continue;
            };
            let kind = match link.link_quality {
                LinkQuality::FixedBy => EdgeKind::FixedBy,
                LinkQuality::AssociatedWith => EdgeKind::AssociatedWith,
            };
            edges.push(
                GraphEdge::new(
                    repo_id,
                    kind,
                    NodeRef::new(NodeLabel::Issue, link.issue_number.to_string()),
                    target,
                )
                .prop("confidence", json!(link.final_confidence))
                .prop("detection_method", json!(link.detection_method.as_str()))
                .prop("created_from", json!("validated_link")),
            );
        }
        report.edges_written = self.graph.merge_edges(&edges).await?;

        info!(
            repo_id,
            candidates = report.candidates,
            fixed_by = report.fixed_by,
            associated_with = report.associated_with,
            filtered = report.filtered_out,
            "linker run complete"
        );
        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Candidate sources
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn timeline_candidates(&self, repo_id: i64) -> Result<Vec<CandidateLink>> {
        let mut candidates = Vec::new();
        for event in self.staging.timeline_events(repo_id).await? {
            match event.event_type {
                TimelineEventType::CrossReferenced => {
                    let is_pr = matches!(
                        event.source_type.as_deref(),
                        Some("pull_request") | Some("pr")
                    );
                    if let Some(number) = event.source_number.filter(|_| is_pr) {
                        candidates.push(CandidateLink {
                            issue_number: event.issue_number,
                            pr_number: Some(number),
                            commit_sha: None,
                            action: LinkAction::AssociatedWith,
                            method: DetectionMethod::Timeline,
                            base_confidence: 1.0,
                            temporal_boost: 0.0,
                            semantic_boost: 0.0,
                            negative_penalty: 0.0,
                            extracted_from: "timeline".into(),
                            evidence: vec!["timeline:cross-referenced".into()],
                        });
                    }
                }
                TimelineEventType::Closed => {
                    if let Some(sha) = event.source_sha.clone() {
                        candidates.push(CandidateLink {
                            issue_number: event.issue_number,
                            pr_number: None,
                            commit_sha: Some(sha),
                            action: LinkAction::Fixes,
                            method: DetectionMethod::Timeline,
                            base_confidence: 1.0,
                            temporal_boost: 0.0,
                            semantic_boost: 0.0,
                            negative_penalty: 0.0,
                            extracted_from: "timeline".into(),
                            evidence: vec!["timeline:closed".into()],
                        });
                    }
                }
            }
        }
        Ok(candidates)
    }

    async fn explicit_candidates(&self, repo_id: i64) -> Result<Vec<CandidateLink>> {
        let mut candidates = Vec::new();

        for pr in self.staging.list_prs(repo_id).await? {
            let Some(body) = pr.body.as_deref() else {
                continue;
            };
            let closed_unmerged = !pr.merged && pr.state == "closed";
            for reference in extract_references(body) {
                let mut evidence = vec![
                    format!("keyword:{}", reference.keyword),
                    format!("pattern:{}", reference.matched),
                ];
                let negative_penalty = if closed_unmerged {
                    evidence.push("negative:pr-closed-unmerged".into());
                    UNMERGED_PR_PENALTY
                } else {
                    0.0
                };
                candidates.push(CandidateLink {
                    issue_number: reference.issue_number,
                    pr_number: Some(pr.number),
                    commit_sha: None,
                    action: LinkAction::Fixes,
                    method: DetectionMethod::Explicit,
                    base_confidence: 0.90,
                    temporal_boost: 0.0,
                    semantic_boost: 0.0,
                    negative_penalty,
                    extracted_from: "pr_body".into(),
                    evidence,
                });
            }
        }

        for commit in self.staging.list_commits(repo_id).await? {
            for reference in extract_references(&commit.message) {
                candidates.push(CandidateLink {
                    issue_number: reference.issue_number,
                    pr_number: None,
                    commit_sha: Some(commit.sha.clone()),
                    action: LinkAction::Fixes,
                    method: DetectionMethod::Explicit,
                    base_confidence: 0.90,
                    temporal_boost: 0.0,
                    semantic_boost: 0.0,
                    negative_penalty: 0.0,
                    extracted_from: "commit_message".into(),
                    evidence: vec![
                        format!("keyword:{}", reference.keyword),
                        format!("pattern:{}", reference.matched),
                    ],
                });
            }
        }

        Ok(candidates)
    }

    async fn temporal_candidates(&self, repo_id: i64) -> Result<Vec<CandidateLink>> {
        let mut pairs = Vec::new();

        for issue in self.staging.list_closed_issues(repo_id).await? {
            let Some(closed_at) = issue.closed_at else {
                continue;
            };
            let from = closed_at - chrono::Duration::hours(24);
            let to = closed_at + chrono::Duration::hours(24);

            for pr in self.staging.prs_merged_between(repo_id, from, to).await? {
                let Some(merged_at) = pr.merged_at else {
                    continue;
                };
                self.push_pair(
                    &mut pairs,
                    &issue,
                    closed_at,
                    merged_at,
                    Some(pr.number),
                    None,
                    pr.title.clone(),
                    pr.body.clone(),
                );
            }

            for commit in self
                .staging
                .commits_authored_between(repo_id, from, to)
                .await?
            {
                let (title, body) = split_message(&commit.message);
                self.push_pair(
                    &mut pairs,
                    &issue,
                    closed_at,
                    commit.author_date,
                    None,
                    Some(commit.sha.clone()),
                    title,
                    body,
                );
            }
        }

        // Similarity scoring is pure CPU work over many pairs.
        let candidates: Vec<CandidateLink> = pairs
            .par_iter()
            .filter_map(|pair| {
                let similarity = issue_target_similarity(
                    &pair.issue_title,
                    pair.issue_body.as_deref(),
                    &pair.target_title,
                    pair.target_body.as_deref(),
                );
                let semantic_boost = semantic_confidence_boost(similarity);
                if semantic_boost == 0.0 && pair.delta_secs.abs() >= SEMANTIC_FLOOR_SECS {
                    return None;
                }

                Some(CandidateLink {
                    issue_number: pair.issue_number,
                    pr_number: pair.pr_number,
                    commit_sha: pair.commit_sha.clone(),
                    action: LinkAction::AssociatedWith,
                    method: DetectionMethod::Temporal,
                    base_confidence: pair.base_confidence,
                    temporal_boost: temporal_signal_boost(chrono::Duration::seconds(
                        pair.delta_secs,
                    )),
                    semantic_boost,
                    negative_penalty: 0.0,
                    extracted_from: "temporal".into(),
                    evidence: vec![
                        format!("temporal:delta_secs={}", pair.delta_secs.abs()),
                        format!("semantic:jaccard={:.2}", similarity),
                    ],
                })
            })
            .collect();

        Ok(candidates)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_pair(
        &self,
        pairs: &mut Vec<TemporalPair>,
        issue: &RawIssue,
        closed_at: DateTime<Utc>,
        target_at: DateTime<Utc>,
        pr_number: Option<i64>,
        commit_sha: Option<String>,
        target_title: String,
        target_body: Option<String>,
    ) {
        let delta = closed_at - target_at;
        let Some(base_confidence) = temporal_base_confidence(delta) else {
            return;
        };

        pairs.push(TemporalPair {
            issue_number: issue.number,
            pr_number,
            commit_sha,
            issue_title: issue.title.clone(),
            issue_body: issue.body.clone(),
            target_title,
            target_body,
            delta_secs: delta.num_seconds(),
            base_confidence,
        });
    }
}

/// Commit message → (subject line, remainder).
fn split_message(message: &str) -> (String, Option<String>) {
    match message.split_once('\n') {
        Some((subject, rest)) => {
            let rest = rest.trim();
            (
                subject.trim().to_string(),
                (!rest.is_empty()).then(|| rest.to_string()),
            )
        }
        None => (message.trim().to_string(), None),
    }
}

//! Candidate and merged link models.

use coderisk_storage::{
    ConfidenceBreakdown, DetectionMethod, IssueCommitRef, LinkAction, LinkQuality, ValidatedLink,
};

/// Cap applied to a single-method candidate's combined confidence.
pub const SINGLE_METHOD_CAP: f64 = 0.98;
/// Cap applied after the bidirectional merge bonus.
pub const BIDIRECTIONAL_CAP: f64 = 0.95;
/// Bonus for a tuple attested by two independent methods.
pub const BIDIRECTIONAL_BONUS: f64 = 0.05;
/// Links below this final confidence are filtered out entirely.
pub const MIN_LINK_CONFIDENCE: f64 = 0.70;
/// FIXED_BY requires at least this base confidence.
pub const FIXED_BY_MIN_BASE: f64 = 0.85;
/// Ground-truth signal A: very close temporal proximity.
pub const FIXED_BY_MIN_TEMPORAL: f64 = 0.12;
/// Ground-truth signal C: strong semantic agreement.
pub const FIXED_BY_MIN_SEMANTIC: f64 = 0.10;

/// One detection's view of an issue↔PR/commit link, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLink {
    pub issue_number: i64,
    pub pr_number: Option<i64>,
    pub commit_sha: Option<String>,
    pub action: LinkAction,
    pub method: DetectionMethod,
    pub base_confidence: f64,
    pub temporal_boost: f64,
    pub semantic_boost: f64,
    pub negative_penalty: f64,
    /// Where the text was found ("pr_body", "commit_message", "timeline").
    pub extracted_from: String,
    pub evidence: Vec<String>,
}

impl CandidateLink {
    /// Tuple identity used by the bidirectional merge.
    pub fn tuple(&self) -> (i64, Option<i64>, Option<String>) {
        (self.issue_number, self.pr_number, self.commit_sha.clone())
    }

    /// Combined single-method confidence. The temporal boost is a
    /// classification signal, not a confidence component; only the
    /// semantic boost raises the score above the window base.
    pub fn confidence(&self) -> f64 {
        (self.base_confidence + self.semantic_boost - self.negative_penalty)
            .clamp(0.0, SINGLE_METHOD_CAP)
    }

    pub fn to_ref(&self, repo_id: i64) -> IssueCommitRef {
        IssueCommitRef {
            id: 0,
            repo_id,
            issue_number: self.issue_number,
            pr_number: self.pr_number,
            commit_sha: self.commit_sha.clone(),
            action: self.action,
            confidence: self.confidence(),
            detection_method: self.method,
            extracted_from: self.extracted_from.clone(),
            evidence: self.evidence.clone(),
        }
    }
}

/// Result of the bidirectional merge for one tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLink {
    pub issue_number: i64,
    pub pr_number: Option<i64>,
    pub commit_sha: Option<String>,
    pub action: LinkAction,
    pub method: DetectionMethod,
    pub breakdown: ConfidenceBreakdown,
    pub final_confidence: f64,
    pub evidence: Vec<String>,
}

impl MergedLink {
    /// Merge every candidate attesting the same tuple.
    pub fn from_candidates(mut candidates: Vec<CandidateLink>) -> Option<MergedLink> {
        let first = candidates.first()?.clone();

        candidates.sort_by(|a, b| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut methods: Vec<DetectionMethod> = Vec::new();
        for candidate in &candidates {
            if !methods.contains(&candidate.method) {
                methods.push(candidate.method);
            }
        }
        let corroborated = methods.len() > 1;

        let method = if methods.contains(&DetectionMethod::Timeline) {
            DetectionMethod::Timeline
        } else if corroborated && methods.contains(&DetectionMethod::Explicit) {
            DetectionMethod::ExplicitBidirectional
        } else if corroborated {
            DetectionMethod::Bidirectional
        } else {
            methods[0]
        };

        // Prefer fixes over mentions over associated_with.
        let action = candidates
            .iter()
            .map(|c| c.action)
            .min_by_key(|a| match a {
                LinkAction::Fixes => 0,
                LinkAction::Mentions => 1,
                LinkAction::AssociatedWith => 2,
            })
            .unwrap_or(first.action);

        let max_fold = |f: fn(&CandidateLink) -> f64| {
            candidates
                .iter()
                .map(f)
                .fold(0.0_f64, |acc, v| acc.max(v))
        };

        let breakdown = ConfidenceBreakdown {
            base: max_fold(|c| c.base_confidence),
            temporal_boost: max_fold(|c| c.temporal_boost),
            bidirectional_boost: if corroborated { BIDIRECTIONAL_BONUS } else { 0.0 },
            semantic_boost: max_fold(|c| c.semantic_boost),
            negative_penalty: max_fold(|c| c.negative_penalty),
        };

        let best = candidates[0].confidence();
        let final_confidence = if corroborated {
            (best + BIDIRECTIONAL_BONUS).min(BIDIRECTIONAL_CAP)
        } else {
            best
        };

        let mut evidence = Vec::new();
        for candidate in &candidates {
            for item in &candidate.evidence {
                if !evidence.contains(item) {
                    evidence.push(item.clone());
                }
            }
        }

        Some(MergedLink {
            issue_number: first.issue_number,
            pr_number: first.pr_number,
            commit_sha: first.commit_sha,
            action,
            method,
            breakdown,
            final_confidence,
            evidence,
        })
    }

    /// Multi-signal FIXED_BY criteria; `None` means the link is dropped.
    pub fn classify(&self) -> Option<LinkQuality> {
        if self.is_fixed_by() {
            return Some(LinkQuality::FixedBy);
        }
        if self.final_confidence >= MIN_LINK_CONFIDENCE {
            return Some(LinkQuality::AssociatedWith);
        }
        None
    }

    fn is_fixed_by(&self) -> bool {
        let method_ok = matches!(
            self.method,
            DetectionMethod::Timeline | DetectionMethod::ExplicitBidirectional
        );
        let base_ok = self.breakdown.base >= FIXED_BY_MIN_BASE;
        let clean = self.breakdown.negative_penalty == 0.0;

        let has_keyword_tag = self.evidence.iter().any(|e| {
            e.starts_with("keyword:fix")
                || e.starts_with("keyword:close")
                || e.starts_with("keyword:resolve")
        });
        let ground_truth_signal = self.breakdown.temporal_boost >= FIXED_BY_MIN_TEMPORAL
            || self.breakdown.bidirectional_boost > 0.0
            || (self.breakdown.semantic_boost >= FIXED_BY_MIN_SEMANTIC && has_keyword_tag);

        method_ok && base_ok && clean && ground_truth_signal
    }

    pub fn to_validated(&self, repo_id: i64, quality: LinkQuality) -> ValidatedLink {
        ValidatedLink {
            id: 0,
            repo_id,
            issue_number: self.issue_number,
            pr_number: self.pr_number,
            commit_sha: self.commit_sha.clone(),
            final_confidence: self.final_confidence,
            detection_method: self.method,
            link_quality: quality,
            evidence_sources: self.evidence.clone(),
            breakdown: self.breakdown,
        }
    }
}

/// Counters for one Linker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub candidates: usize,
    pub merged: usize,
    pub fixed_by: usize,
    pub associated_with: usize,
    pub filtered_out: usize,
    pub edges_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit(issue: i64, pr: i64) -> CandidateLink {
        CandidateLink {
            issue_number: issue,
            pr_number: Some(pr),
            commit_sha: None,
            action: LinkAction::Fixes,
            method: DetectionMethod::Explicit,
            base_confidence: 0.90,
            temporal_boost: 0.0,
            semantic_boost: 0.0,
            negative_penalty: 0.0,
            extracted_from: "pr_body".into(),
            evidence: vec!["keyword:fixes".into(), "pattern:fixes #7".into()],
        }
    }

    fn temporal(issue: i64, pr: i64, base: f64, temporal_boost: f64, semantic: f64) -> CandidateLink {
        CandidateLink {
            issue_number: issue,
            pr_number: Some(pr),
            commit_sha: None,
            action: LinkAction::AssociatedWith,
            method: DetectionMethod::Temporal,
            base_confidence: base,
            temporal_boost,
            semantic_boost: semantic,
            negative_penalty: 0.0,
            extracted_from: "temporal".into(),
            evidence: vec!["temporal:window".into()],
        }
    }

    #[test]
    fn test_explicit_plus_temporal_becomes_fixed_by() {
        // PR body says "fixes #7"; issue closed 3 minutes after merge;
        // title similarity 0.35.
        let merged = MergedLink::from_candidates(vec![
            explicit(7, 9),
            temporal(7, 9, 0.75, 0.15, 0.10),
        ])
        .unwrap();

        assert_eq!(merged.method, DetectionMethod::ExplicitBidirectional);
        assert_eq!(merged.final_confidence, 0.95);
        assert_eq!(merged.breakdown.base, 0.90);
        assert_eq!(merged.breakdown.temporal_boost, 0.15);
        assert!(merged.breakdown.bidirectional_boost > 0.0);
        assert_eq!(merged.classify(), Some(LinkQuality::FixedBy));
        assert_eq!(merged.action, LinkAction::Fixes);
    }

    #[test]
    fn test_single_explicit_is_only_associated() {
        // Explicit alone: method is not in {timeline, explicit-bidirectional}.
        let merged = MergedLink::from_candidates(vec![explicit(7, 9)]).unwrap();

        assert_eq!(merged.method, DetectionMethod::Explicit);
        assert_eq!(merged.classify(), Some(LinkQuality::AssociatedWith));
    }

    #[test]
    fn test_weak_temporal_is_filtered() {
        let merged =
            MergedLink::from_candidates(vec![temporal(7, 9, 0.55, 0.05, 0.05)]).unwrap();

        assert!(merged.final_confidence < MIN_LINK_CONFIDENCE);
        assert_eq!(merged.classify(), None);
    }

    #[test]
    fn test_negative_penalty_blocks_fixed_by() {
        let mut dirty = explicit(7, 9);
        dirty.negative_penalty = 0.25;
        let merged =
            MergedLink::from_candidates(vec![dirty, temporal(7, 9, 0.75, 0.15, 0.10)]).unwrap();

        assert_ne!(merged.classify(), Some(LinkQuality::FixedBy));
    }
}

//! Temporal proximity scoring.
//!
//! A closed issue and a PR merged (or commit authored) near the close
//! time are correlation candidates. The window base confidence feeds the
//! candidate score; the separate signal boost feeds the ground-truth
//! classification.

use chrono::Duration;

/// Candidates with no semantic agreement are accepted only when the
/// delta is below this many seconds.
pub const SEMANTIC_FLOOR_SECS: i64 = 3600;

/// Base confidence by |t_issue − t_target| window. `None` outside 24 h.
pub fn temporal_base_confidence(delta: Duration) -> Option<f64> {
    let delta = if delta < Duration::zero() { -delta } else { delta };
    if delta < Duration::minutes(5) {
        Some(0.75)
    } else if delta < Duration::hours(1) {
        Some(0.65)
    } else if delta <= Duration::hours(24) {
        Some(0.55)
    } else {
        None
    }
}

/// Ground-truth temporal signal recorded in the confidence breakdown.
pub fn temporal_signal_boost(delta: Duration) -> f64 {
    let delta = if delta < Duration::zero() { -delta } else { delta };
    if delta < Duration::minutes(5) {
        0.15
    } else if delta < Duration::hours(1) {
        0.10
    } else if delta <= Duration::hours(24) {
        0.05
    } else {
        0.0
    }
}

/// Semantic boost for a given Jaccard score.
pub fn semantic_confidence_boost(similarity: f64) -> f64 {
    if similarity >= 0.20 {
        0.10
    } else if similarity >= 0.10 {
        0.05
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_confidence_windows() {
        assert_eq!(temporal_base_confidence(Duration::minutes(3)), Some(0.75));
        assert_eq!(temporal_base_confidence(Duration::minutes(30)), Some(0.65));
        assert_eq!(temporal_base_confidence(Duration::hours(20)), Some(0.55));
        assert_eq!(temporal_base_confidence(Duration::hours(25)), None);
    }

    #[test]
    fn test_delta_sign_is_irrelevant() {
        assert_eq!(
            temporal_base_confidence(Duration::minutes(-3)),
            temporal_base_confidence(Duration::minutes(3))
        );
    }

    #[test]
    fn test_signal_boost_thresholds() {
        // Only the < 5 min window clears the FIXED_BY signal bar of 0.12.
        assert_eq!(temporal_signal_boost(Duration::minutes(3)), 0.15);
        assert_eq!(temporal_signal_boost(Duration::minutes(45)), 0.10);
        assert_eq!(temporal_signal_boost(Duration::hours(12)), 0.05);
    }

    #[test]
    fn test_semantic_boost_tiers() {
        assert_eq!(semantic_confidence_boost(0.35), 0.10);
        assert_eq!(semantic_confidence_boost(0.15), 0.05);
        assert_eq!(semantic_confidence_boost(0.05), 0.0);
    }
}

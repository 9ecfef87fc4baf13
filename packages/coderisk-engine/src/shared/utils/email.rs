//! Developer email normalization.
//!
//! Commit-author and PR-author emails diverge between provider APIs in
//! exactly one way: the commit side reports
//! `"<digits>+<login>@users.noreply.<host>"` while the PR side reports
//! `"<login>@users.noreply.<host>"`. Failing to normalize splits a single
//! developer into two nodes, so this runs on every developer-identifying
//! email before it is used as a key.

use once_cell::sync::Lazy;
use regex::Regex;

static NOREPLY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\+(.+@users\.noreply\..+)$").expect("static regex"));

/// Strip the numeric prefix from noreply addresses.
///
/// Runs to a fixpoint, so applying it twice can never yield a new
/// result (a stacked prefix like `1+2+x@…` collapses fully on the first
/// call).
pub fn normalize_email(email: &str) -> String {
    let mut email = email.trim().to_lowercase();
    while let Some(captures) = NOREPLY_PREFIX.captures(&email) {
        email = captures[1].to_string();
    }
    email
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_numeric_prefix() {
        assert_eq!(
            normalize_email("12345+x@users.noreply.github.com"),
            "x@users.noreply.github.com"
        );
    }

    #[test]
    fn test_plain_addresses_unchanged() {
        assert_eq!(normalize_email("dev@example.com"), "dev@example.com");
        assert_eq!(
            normalize_email("x@users.noreply.github.com"),
            "x@users.noreply.github.com"
        );
    }

    #[test]
    fn test_digits_only_local_part_without_plus_unchanged() {
        assert_eq!(
            normalize_email("12345@users.noreply.github.com"),
            "12345@users.noreply.github.com"
        );
    }

    #[test]
    fn test_case_and_whitespace_folded() {
        assert_eq!(normalize_email("  Dev@Example.COM "), "dev@example.com");
    }

    proptest! {
        #[test]
        fn test_normalization_is_idempotent(email in "[0-9+a-z@.]{1,40}") {
            let once = normalize_email(&email);
            prop_assert_eq!(normalize_email(&once), once);
        }
    }
}

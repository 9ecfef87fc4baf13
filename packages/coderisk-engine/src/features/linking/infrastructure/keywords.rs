//! Keyword-set semantic similarity.
//!
//! Texts are reduced to keyword sets (lowercase, URLs and markdown
//! stripped, stop words and short/numeric tokens dropped, light suffix
//! stemming) and compared with plain Jaccard. For issue↔PR comparison
//! both title-only and full-text scores are computed and the maximum
//! taken, so a long PR body cannot dilute a strong title match.

use ahash::AHashSet;
use once_cell::sync::Lazy;
use regex::Regex;

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("static regex"));
static MARKDOWN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[`*_#>~\[\]()|]").expect("static regex"));
static DOTTED_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?\d+\.\d+").expect("static regex"));

static STOP_WORDS: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being",
        "to", "of", "in", "on", "at", "for", "with", "by", "from", "into", "about", "this",
        "that", "these", "those", "it", "its", "as", "if", "then", "than", "so", "not", "no",
        "we", "you", "i", "he", "she", "they", "them", "their", "our", "your", "my", "me", "us",
        "do", "does", "did", "done", "can", "could", "should", "would", "will", "shall", "may",
        "might", "must", "have", "has", "had", "having", "when", "where", "which", "who", "whom",
        "what", "why", "how", "all", "any", "some", "there", "here", "also", "just", "only",
        "very", "more", "most", "such", "other", "after", "before", "because",
    ]
    .into_iter()
    .collect()
});

/// Suffixes stripped when the remainder keeps length ≥ 2, longest first.
const SUFFIXES: [&str; 6] = ["ing", "ed", "es", "er", "ly", "s"];

fn stem(token: &str) -> String {
    for suffix in SUFFIXES {
        if let Some(remainder) = token.strip_suffix(suffix) {
            if remainder.len() >= 2 {
                return remainder.to_string();
            }
        }
    }
    token.to_string()
}

fn is_numeric_only(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Reduce free text to its keyword set.
pub fn keyword_set(text: &str) -> AHashSet<String> {
    let lowered = text.to_lowercase();
    let without_urls = URL.replace_all(&lowered, " ");
    let without_markdown = MARKDOWN.replace_all(&without_urls, " ");

    without_markdown
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '.'))
        .filter(|t| t.len() >= 2)
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !is_numeric_only(t) || DOTTED_VERSION.is_match(t))
        .map(stem)
        .filter(|t| t.len() >= 2)
        .collect()
}

/// Jaccard similarity of two keyword sets.
pub fn jaccard(a: &AHashSet<String>, b: &AHashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Issue↔target similarity: max of title-only and full-text scores.
pub fn issue_target_similarity(
    issue_title: &str,
    issue_body: Option<&str>,
    target_title: &str,
    target_body: Option<&str>,
) -> f64 {
    let title_score = jaccard(&keyword_set(issue_title), &keyword_set(target_title));

    let issue_full = format!("{} {}", issue_title, issue_body.unwrap_or_default());
    let target_full = format!("{} {}", target_title, target_body.unwrap_or_default());
    let full_score = jaccard(&keyword_set(&issue_full), &keyword_set(&target_full));

    title_score.max(full_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_set_strips_noise() {
        let set = keyword_set("Fix the *crash* in `engine` module, see https://example.com/bug #42");
        assert!(set.contains("fix"));
        assert!(set.contains("crash"));
        assert!(set.contains("engine"));
        assert!(!set.iter().any(|t| t.contains("http")));
        assert!(!set.contains("the"));
        assert!(!set.contains("42"));
    }

    #[test]
    fn test_dotted_versions_survive_numeric_filter() {
        let set = keyword_set("upgrade to 1.2 and v3.4.1 from 42");
        assert!(set.iter().any(|t| t.starts_with("1.2")));
        assert!(set.iter().any(|t| t.starts_with("v3.4")));
        assert!(!set.contains("42"));
    }

    #[test]
    fn test_stemming_folds_inflections() {
        let a = keyword_set("fixing crashes");
        let b = keyword_set("fix crash");
        assert_eq!(jaccard(&a, &b), 1.0);
    }

    #[test]
    fn test_stem_keeps_short_remainders_intact() {
        // "es" would leave "r", below the length-2 floor.
        assert_eq!(stem("res"), "re");
        assert_eq!(stem("is"), "is");
    }

    #[test]
    fn test_title_match_not_diluted_by_long_body() {
        let long_body = "unrelated words ".repeat(50);
        let score = issue_target_similarity(
            "parser crash on empty input",
            None,
            "fix parser crash on empty input",
            Some(&long_body),
        );
        assert!(score >= 0.5, "title-only comparison should dominate: {}", score);
    }

    #[test]
    fn test_jaccard_of_empty_sets_is_zero() {
        assert_eq!(jaccard(&AHashSet::new(), &AHashSet::new()), 0.0);
    }
}

//! Explicit `fixes #N` reference extraction.
//!
//! Regex over PR bodies and commit messages; no LLM on this path.

use once_cell::sync::Lazy;
use regex::Regex;

static EXPLICIT_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fix|fixes|fixed|close|closes|closed|resolve|resolves|resolved)\s+#(\d+)")
        .expect("static regex")
});

/// One textual reference to an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedReference {
    pub issue_number: i64,
    /// The keyword as written, lowercased ("fixes", "closed", ...).
    pub keyword: String,
    /// The full matched text ("Fixes #42").
    pub matched: String,
}

/// Extract every explicit issue reference from `text`.
pub fn extract_references(text: &str) -> Vec<ExtractedReference> {
    EXPLICIT_REF
        .captures_iter(text)
        .filter_map(|captures| {
            let issue_number = captures[2].parse::<i64>().ok()?;
            Some(ExtractedReference {
                issue_number,
                keyword: captures[1].to_lowercase(),
                matched: captures[0].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_keyword_forms() {
        let text = "Fixes #7, also Closes #8 and resolved #9.";
        let refs = extract_references(text);

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].issue_number, 7);
        assert_eq!(refs[0].keyword, "fixes");
        assert_eq!(refs[1].issue_number, 8);
        assert_eq!(refs[1].keyword, "closes");
        assert_eq!(refs[2].issue_number, 9);
        assert_eq!(refs[2].keyword, "resolved");
    }

    #[test]
    fn test_is_case_insensitive() {
        let refs = extract_references("FIX #12");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].keyword, "fix");
        assert_eq!(refs[0].matched, "FIX #12");
    }

    #[test]
    fn test_ignores_bare_issue_numbers_and_partial_words() {
        assert!(extract_references("see #7 for details").is_empty());
        assert!(extract_references("prefixes #7").is_empty());
    }
}

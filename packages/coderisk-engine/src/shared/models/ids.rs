//! Composite node identifiers.
//!
//! Every graph node carries `repo_id` and a composite ID
//! `"<repo_id>:<type>:<identifier>"` so multiple repositories coexist in
//! one graph database.

/// Build the composite node ID for a `(repo, type, identifier)` triple.
pub fn composite_id(repo_id: i64, node_type: &str, identifier: &str) -> String {
    format!("{}:{}:{}", repo_id, node_type, identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_id_layout() {
        assert_eq!(composite_id(7, "file", "src/main.rs"), "7:file:src/main.rs");
        assert_eq!(composite_id(7, "issue", "42"), "7:issue:42");
    }
}

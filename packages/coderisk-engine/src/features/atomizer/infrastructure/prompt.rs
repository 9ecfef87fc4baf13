//! Schema-constrained atomization prompt.

use crate::features::atomizer::domain::AtomizedCommit;
use crate::features::llm::{ChatMessage, ChatRequest, LlmError, LlmResult};

/// Diffs beyond this length are truncated; the tail of a huge diff adds
/// noise faster than signal.
const MAX_DIFF_CHARS: usize = 30_000;

const SYSTEM_PROMPT: &str = "\
You extract code structure changes from a single git commit diff. \
Reply with ONLY a JSON object of this shape:\n\
{\n\
  \"blocks\": [{\"operation\": \"added|modified|removed\", \"file_path\": \"...\", \
\"name\": \"...\", \"kind\": \"function|method|type\", \"start_line\": 0, \"end_line\": 0}],\n\
  \"renames\": [{\"from_file\": \"...\", \"from_name\": \"...\", \"to_file\": \"...\", \
\"to_name\": \"...\"}],\n\
  \"imports\": [{\"from_file\": \"...\", \"from_name\": \"...\", \"to_file\": \"...\", \
\"to_name\": \"...\"}]\n\
}\n\
Report only function-granularity entities visible in the diff. \
Use empty arrays when nothing applies.";

pub fn build_atomize_request(sha: &str, message: &str, diff: &str) -> ChatRequest {
    let diff = if diff.len() > MAX_DIFF_CHARS {
        &diff[..MAX_DIFF_CHARS]
    } else {
        diff
    };

    ChatRequest {
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "commit: {}\nmessage: {}\n\ndiff:\n{}",
                sha, message, diff
            )),
        ],
        tools: Vec::new(),
        require_json: true,
        max_tokens: Some(2_000),
    }
}

pub fn parse_atomized(content: &str) -> LlmResult<AtomizedCommit> {
    serde_json::from_str(content)
        .map_err(|e| LlmError::InvalidResponse(format!("atomize payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::atomizer::domain::BlockOperation;

    #[test]
    fn test_parse_full_payload() {
        let content = r#"{
            "blocks": [{"operation": "added", "file_path": "auth.go", "name": "Login",
                        "kind": "function", "start_line": 10, "end_line": 42}],
            "renames": [{"from_file": "auth.go", "from_name": "SignIn",
                         "to_file": "auth.go", "to_name": "Login"}],
            "imports": []
        }"#;

        let atomized = parse_atomized(content).unwrap();
        assert_eq!(atomized.blocks.len(), 1);
        assert_eq!(atomized.blocks[0].operation, BlockOperation::Added);
        assert_eq!(atomized.renames[0].to_name, "Login");
    }

    #[test]
    fn test_parse_tolerates_missing_sections() {
        let atomized = parse_atomized(r#"{"blocks": []}"#).unwrap();
        assert!(atomized.renames.is_empty());
        assert!(atomized.imports.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_atomized("Sure! Here is the JSON you asked for").is_err());
    }

    #[test]
    fn test_long_diff_is_truncated() {
        let diff = "x".repeat(100_000);
        let request = build_atomize_request("abc", "msg", &diff);
        assert!(request.messages[1].content.len() < 40_000);
    }
}

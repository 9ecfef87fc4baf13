//! Provider-neutral chat types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::shared::models::CoreError;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Endpoint unreachable, misconfigured, or persistently failing.
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the call with a rate-limit response.
    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    /// The model answered outside the constrained schema.
    #[error("LLM response invalid: {0}")]
    InvalidResponse(String),
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

impl From<LlmError> for CoreError {
    fn from(err: LlmError) -> Self {
        match &err {
            LlmError::Unavailable(m) => CoreError::llm_unavailable(m.clone()),
            LlmError::RateLimited(m) => CoreError::llm_rate_limited(m.clone()),
            LlmError::InvalidResponse(m) => CoreError::llm_invalid_response(m.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// A tool offered to the model (JSON-schema parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    /// Constrain the reply to a JSON object.
    pub require_json: bool,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_call: Option<ToolInvocation>,
    pub tokens_used: u32,
}

/// Unified interface implemented by all LLM providers.
///
/// Implementations handle network failures, timeouts, and rate limits
/// inside `complete` and surface them as the matching [`LlmError`]
/// category.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> LlmResult<ChatResponse>;

    /// Provider name, used for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ErrorKind;

    #[test]
    fn test_llm_errors_map_to_engine_kinds() {
        let rate: CoreError = LlmError::RateLimited("429".into()).into();
        assert_eq!(rate.kind, ErrorKind::LlmRateLimited);

        let down: CoreError = LlmError::Unavailable("refused".into()).into();
        assert_eq!(down.kind, ErrorKind::LlmUnavailable);

        let bad: CoreError = LlmError::InvalidResponse("not json".into()).into();
        assert_eq!(bad.kind, ErrorKind::LlmInvalidResponse);
    }
}

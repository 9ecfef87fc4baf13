//! OpenAI-compatible chat-completions adapter.
//!
//! Works against any endpoint speaking the `/chat/completions` wire
//! format. HTTP 429 becomes `RateLimited`, transport failures become
//! `Unavailable`, and schema violations become `InvalidResponse`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::features::llm::domain::{
    ChatRequest, ChatResponse, LlmError, LlmProvider, LlmResult, Role, ToolInvocation,
};

/// Per-call transport timeout; the investigation deadline above this is
/// enforced by the caller.
const CALL_TIMEOUT: Duration = Duration::from_secs(45);

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "user",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            },
                        })
                    })
                    .collect(),
            );
        }
        if request.require_json {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    fn parse_response(payload: &Value) -> LlmResult<ChatResponse> {
        let message = payload
            .pointer("/choices/0/message")
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".into()))?;

        let tool_call = match message.pointer("/tool_calls/0/function") {
            Some(function) => {
                let name = function
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LlmError::InvalidResponse("tool call without name".into()))?
                    .to_string();
                let raw_arguments = function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}");
                let arguments: Value = serde_json::from_str(raw_arguments).map_err(|e| {
                    LlmError::InvalidResponse(format!("tool arguments not JSON: {}", e))
                })?;
                Some(ToolInvocation { name, arguments })
            }
            None => None,
        };

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(String::from);

        let tokens_used = payload
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        Ok(ChatResponse {
            content,
            tool_call,
            tokens_used,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, request: &ChatRequest) -> LlmResult<ChatResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(CALL_TIMEOUT)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(LlmError::Unavailable(format!("HTTP {}", status)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let parsed = Self::parse_response(&payload)?;
        debug!(
            tokens = parsed.tokens_used,
            has_tool_call = parsed.tool_call.is_some(),
            "chat completion received"
        );
        Ok(parsed)
    }

    fn name(&self) -> &str {
        "openai-compat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final_content_response() {
        let payload = json!({
            "choices": [{"message": {"content": "{\"risk_level\": \"HIGH\"}"}}],
            "usage": {"total_tokens": 321},
        });

        let response = OpenAiCompatProvider::parse_response(&payload).unwrap();
        assert_eq!(response.content.as_deref(), Some("{\"risk_level\": \"HIGH\"}"));
        assert!(response.tool_call.is_none());
        assert_eq!(response.tokens_used, 321);
    }

    #[test]
    fn test_parse_tool_call_response() {
        let payload = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{"function": {
                    "name": "incident_history",
                    "arguments": "{\"file_paths\": [\"core/auth.go\"], \"window_days\": 180}",
                }}],
            }}],
            "usage": {"total_tokens": 100},
        });

        let response = OpenAiCompatProvider::parse_response(&payload).unwrap();
        let call = response.tool_call.unwrap();
        assert_eq!(call.name, "incident_history");
        assert_eq!(call.arguments["window_days"], json!(180));
    }

    #[test]
    fn test_malformed_payload_is_invalid_response() {
        let payload = json!({"unexpected": true});
        assert!(matches!(
            OpenAiCompatProvider::parse_response(&payload),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}

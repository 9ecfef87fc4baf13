//! Phase-2 bounded investigation.
//!
//! The loop submits the conversation to the model; each reply is either a
//! final `{risk_level, confidence, reasoning}` verdict or a tool call,
//! which is executed and appended to the history. Bounds: MAX_HOPS model
//! turns and one wall-clock deadline over the whole loop.

use std::time::Duration;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::features::identity::PathResolution;
use crate::features::llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider};
use crate::features::risk::domain::{
    AssessmentSource, InvestigationTrace, RiskAssessment, RiskLevel, Tier1Result, TraceEntry,
};
use crate::features::risk::infrastructure::RiskToolbox;
use crate::shared::models::{CoreError, Result};

/// Model turns per investigation.
pub const MAX_HOPS: usize = 5;

const SYSTEM_PROMPT: &str = "\
You are a software change-risk investigator with read-only access to a \
repository knowledge graph via tools. Investigate the changed file, then \
answer with ONLY a JSON object: {\"risk_level\": \"LOW|MEDIUM|HIGH|CRITICAL\", \
\"confidence\": 0.0-1.0, \"reasoning\": \"...\"}. Call tools when you need \
evidence; do not guess numbers you can query.";

pub struct InvestigationContext {
    pub resolution: PathResolution,
    pub tier1: Tier1Result,
    pub diff_summary: Option<String>,
    /// Fraction of closed issues carrying a FIXED_BY link, when known.
    pub link_quality: Option<f64>,
}

pub struct Investigator<'a> {
    llm: &'a dyn LlmProvider,
    toolbox: RiskToolbox,
    deadline: Duration,
}

impl<'a> Investigator<'a> {
    pub fn new(llm: &'a dyn LlmProvider, toolbox: RiskToolbox, deadline: Duration) -> Self {
        Self {
            llm,
            toolbox,
            deadline,
        }
    }

    pub async fn investigate(
        &self,
        context: &InvestigationContext,
    ) -> Result<(RiskAssessment, InvestigationTrace)> {
        tokio::time::timeout(self.deadline, self.run_loop(context)).await?
    }

    async fn run_loop(
        &self,
        context: &InvestigationContext,
    ) -> Result<(RiskAssessment, InvestigationTrace)> {
        let mut trace = InvestigationTrace {
            id: Uuid::new_v4().to_string(),
            diff_hash: diff_hash(context),
            hops: Vec::new(),
            total_tokens: 0,
        };

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(kickoff_prompt(context)),
        ];

        for hop in 0..MAX_HOPS {
            let request = ChatRequest {
                messages: messages.clone(),
                tools: RiskToolbox::specs(),
                require_json: false,
                max_tokens: Some(1_000),
            };

            let response: ChatResponse = self.llm.complete(&request).await.map_err(CoreError::from)?;
            trace.total_tokens += response.tokens_used;

            if let Some(call) = response.tool_call {
                debug!(hop, tool = %call.name, "investigator tool call");

                let result = match self.toolbox.execute(&call.name, &call.arguments).await {
                    Ok(result) => result,
                    // The model sees its own mistake and may recover
                    // within the hop budget.
                    Err(err) if err.is_llm() => json!({ "error": err.to_string() }),
                    Err(err) => return Err(err),
                };

                trace.hops.push(TraceEntry {
                    tool: call.name.clone(),
                    args: call.arguments.clone(),
                    result: result.clone(),
                    token_cost: response.tokens_used,
                });

                messages.push(ChatMessage::assistant(format!(
                    "tool call: {} {}",
                    call.name, call.arguments
                )));
                messages.push(ChatMessage::tool(result.to_string()));
                continue;
            }

            let Some(content) = response.content else {
                return Err(CoreError::llm_invalid_response(
                    "model returned neither verdict nor tool call",
                ));
            };
            let assessment = parse_verdict(&content)?;
            return Ok((assessment, trace));
        }

        Err(CoreError::llm_invalid_response(format!(
            "no final verdict within {} hops",
            MAX_HOPS
        )))
    }
}

fn diff_hash(context: &InvestigationContext) -> String {
    let mut hasher = Sha256::new();
    hasher.update(context.resolution.canonical_path.as_bytes());
    if let Some(diff) = &context.diff_summary {
        hasher.update(diff.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn kickoff_prompt(context: &InvestigationContext) -> String {
    let mut prompt = format!(
        "Changed file: {} (resolved via {}, confidence {:.2})\n",
        context.resolution.canonical_path,
        context.resolution.method.as_str(),
        context.resolution.confidence,
    );
    if context.resolution.historical_paths.len() > 1 {
        prompt.push_str(&format!(
            "Known historical paths: {}\n",
            context.resolution.historical_paths.join(", ")
        ));
    }

    prompt.push_str("\nPhase-1 metrics:\n");
    for line in context.tier1.evidence() {
        prompt.push_str("- ");
        prompt.push_str(&line);
        prompt.push('\n');
    }

    if let Some(quality) = context.link_quality {
        prompt.push_str(&format!(
            "\nRepository linking quality: {:.0}% of closed issues have a \
             validated fix link (lower means incident counts undercount).\n",
            quality * 100.0
        ));
    }

    match &context.diff_summary {
        Some(diff) => {
            prompt.push_str("\nDiff summary:\n");
            prompt.push_str(diff);
            prompt.push('\n');
        }
        None => prompt.push_str("\nNo diff is available for this change.\n"),
    }

    prompt
}

fn parse_verdict(content: &str) -> Result<RiskAssessment> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|e| CoreError::llm_invalid_response(format!("verdict not JSON: {}", e)))?;

    let risk_level = value
        .get("risk_level")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::llm_invalid_response("verdict missing risk_level"))?;
    let risk_level = RiskLevel::parse(risk_level).map_err(CoreError::from)?;

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(RiskAssessment {
        risk_level,
        confidence,
        reasoning,
        source: AssessmentSource::Investigation,
    })
}

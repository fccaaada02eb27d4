//! Bounded multi-turn reasoning over the gateway.
//!
//! An external engine picks catalog instructions as tools; each pick goes
//! through the same pipeline as a direct request (validation and the
//! confirmation gate included). The loop stops at a final answer, an
//! engine failure, or one of the two caps.

use crate::pipeline::Gateway;
use async_trait::async_trait;
use futures::future::join_all;
use kubegate_shared::catalog::CATALOG;
use kubegate_shared::error::GateError;
use kubegate_shared::params::Params;
use kubegate_shared::redact::redact_map;
use kubegate_shared::rpc::{DiagnoseOutcome, DiagnoseResponse, ExecuteResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const SYSTEM_PROMPT: &str = "You are a Kubernetes diagnostic assistant.
The user asks a question about their cluster (for example \"are my pods healthy?\" or \"how do I deploy nginx with autoscaling?\").

Your job:
1. Decide which kubectl operations to run via the available functions.
2. Analyze the results.
3. Repeat as needed, for a few rounds at most.
4. Give a final, concise answer or a step-by-step plan.

For diagnostic questions, call get_resources, describe_resource, get_events and similar functions to gather data, then summarize health and issues.
For planning questions, outline the steps (for example \"create deployment, expose service, add HPA\") and optionally call functions to check prerequisites.
Operations that change the cluster are not executed without confirmation; report them as proposed steps.

Keep the final answer brief and actionable.";

/// Characters of stdout handed back to the engine.
const STDOUT_LIMIT: usize = 2000;
/// Characters of stderr handed back to the engine.
const STDERR_LIMIT: usize = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("reasoning engine is not configured: {0}")]
    NotConfigured(String),

    #[error("reasoning engine request failed: {0}")]
    Transport(String),

    #[error("reasoning engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed reasoning engine response: {0}")]
    MalformedResponse(String),
}

/// One tool invocation requested by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Always an object; unparseable arguments arrive as `{}`.
    pub arguments: Value,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// What the engine said this round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(&self, turns: &[Turn], tools: &[Value]) -> Result<EngineReply, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_iterations: u32,
    pub max_llm_calls: u32,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_llm_calls: 20,
        }
    }
}

/// Function-calling schema for every catalog instruction. Arguments are
/// advertised as strings; the pipeline coerces them.
pub fn build_tool_schemas() -> Vec<Value> {
    CATALOG
        .iter()
        .map(|instr| {
            let properties: Map<String, Value> = instr
                .args
                .iter()
                .map(|arg| {
                    (
                        arg.name.to_string(),
                        json!({"type": "string", "description": format!("Parameter {}", arg.name)}),
                    )
                })
                .collect();
            json!({
                "type": "function",
                "function": {
                    "name": instr.name,
                    "description": instr.doc,
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": instr.required_args(),
                    }
                }
            })
        })
        .collect()
}

/// Run one reasoning session to completion.
pub async fn run_diagnostic(
    gateway: &Gateway,
    engine: &dyn ReasoningEngine,
    session_id: &str,
    question: &str,
    limits: LoopLimits,
) -> DiagnoseResponse {
    let request_id = Uuid::new_v4().to_string();
    let tools = build_tool_schemas();
    let mut turns = vec![
        Turn::System {
            content: SYSTEM_PROMPT.to_string(),
        },
        Turn::User {
            content: question.to_string(),
        },
    ];
    let mut iterations = 0u32;
    let mut llm_calls = 0u32;

    let finish = |outcome: DiagnoseOutcome,
                  answer: Option<String>,
                  message: Option<String>,
                  iterations: u32,
                  llm_calls: u32| {
        DiagnoseResponse {
            request_id: request_id.clone(),
            outcome,
            answer,
            message,
            iterations,
            llm_calls,
        }
    };

    while iterations < limits.max_iterations {
        iterations += 1;
        llm_calls += 1;

        if llm_calls > limits.max_llm_calls {
            warn!(
                event = "diagnostic_llm_limit_reached",
                request_id = %request_id,
                llm_calls,
                iterations
            );
            return finish(
                DiagnoseOutcome::LlmLimitReached,
                None,
                Some(format!(
                    "Reached maximum LLM call limit ({}). The assistant may not have reached a final conclusion.",
                    limits.max_llm_calls
                )),
                iterations,
                llm_calls,
            );
        }

        let reply = match engine.complete(&turns, &tools).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    event = "diagnostic_engine_failure",
                    request_id = %request_id,
                    error = %e,
                    llm_calls,
                    iterations
                );
                return finish(
                    DiagnoseOutcome::EngineFailure,
                    None,
                    Some(e.to_string()),
                    iterations,
                    llm_calls,
                );
            }
        };

        turns.push(Turn::Assistant {
            content: reply.content.clone(),
            tool_calls: reply.tool_calls.clone(),
        });

        if reply.tool_calls.is_empty() {
            info!(
                event = "diagnostic_complete",
                request_id = %request_id,
                llm_calls,
                iterations
            );
            return finish(
                DiagnoseOutcome::Answer,
                Some(reply.content.unwrap_or_default()),
                None,
                iterations,
                llm_calls,
            );
        }

        let runs = reply.tool_calls.iter().map(|call| {
            let params = tool_params(&call.arguments, &request_id);
            info!(
                "Tool call {}: {} {}",
                call.id,
                call.name,
                serde_json::Value::Object(redact_map(&params))
            );
            gateway.execute(session_id, &call.name, params)
        });
        let results = join_all(runs).await;

        for (call, result) in reply.tool_calls.iter().zip(results) {
            turns.push(Turn::Tool {
                tool_call_id: call.id.clone(),
                content: format_tool_result(&result),
            });
        }
    }

    warn!(
        event = "diagnostic_max_iterations",
        request_id = %request_id,
        llm_calls,
        iterations
    );
    finish(
        DiagnoseOutcome::MaxIterations,
        None,
        Some("Reached maximum reasoning iterations. The assistant may not have reached a final conclusion.".to_string()),
        iterations,
        llm_calls,
    )
}

/// Tool arguments as pipeline params, tagged with the session request id.
fn tool_params(arguments: &Value, request_id: &str) -> Params {
    let mut params = arguments.as_object().cloned().unwrap_or_default();
    params.insert("request_id".to_string(), Value::String(request_id.to_string()));
    params
}

/// Compact JSON the engine sees as the tool's output.
pub fn format_tool_result(result: &Result<ExecuteResponse, GateError>) -> String {
    let mut out = Map::new();
    match result {
        Ok(ExecuteResponse::Executed(r)) => {
            out.insert("returncode".into(), json!(r.returncode));
            if let Some(summary) = r.summary.as_ref().filter(|s| !s.is_empty()) {
                out.insert("summary".into(), json!(summary));
            } else if !r.stdout.is_empty() {
                out.insert("stdout".into(), json!(truncate(&r.stdout, STDOUT_LIMIT)));
            }
            if !r.stderr.is_empty() {
                out.insert("stderr".into(), json!(truncate(&r.stderr, STDERR_LIMIT)));
            }
            if r.timed_out {
                out.insert("timed_out".into(), json!(true));
            }
        }
        Ok(ExecuteResponse::ConfirmationRequired(envelope)) => {
            out.insert("returncode".into(), json!(envelope.returncode));
            out.insert("confirmation_required".into(), json!(true));
            out.insert("message".into(), json!(envelope.message));
        }
        Err(e) => {
            out.insert("error".into(), json!(e.to_string()));
        }
    }
    Value::Object(out).to_string()
}

fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

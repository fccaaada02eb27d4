//! OpenAI-compatible chat completions client.

use crate::config::ReasoningConfig;
use crate::reasoning::{EngineError, EngineReply, ReasoningEngine, ToolCall, Turn};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiEngine {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiEngine {
    pub fn new(config: &ReasoningConfig) -> Result<Self, EngineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EngineError::NotConfigured("no API key".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("kubegated/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn complete(&self, turns: &[Turn], tools: &[Value]) -> Result<EngineReply, EngineError> {
        let body = json!({
            "model": self.model,
            "messages": turns_to_messages(turns),
            "tools": tools,
            "tool_choice": "auto",
            "temperature": 0,
        });
        debug!("Chat completion: {} turns, {} tools", turns.len(), tools.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;
        parse_reply(&json)
    }
}

/// Conversation turns in the wire shape of the chat completions API.
pub fn turns_to_messages(turns: &[Turn]) -> Vec<Value> {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::System { content } => json!({"role": "system", "content": content}),
            Turn::User { content } => json!({"role": "user", "content": content}),
            Turn::Assistant {
                content,
                tool_calls,
            } if tool_calls.is_empty() => json!({"role": "assistant", "content": content}),
            Turn::Assistant {
                content,
                tool_calls,
            } => {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments.to_string()}
                        })
                    })
                    .collect();
                json!({"role": "assistant", "content": content, "tool_calls": calls})
            }
            Turn::Tool {
                tool_call_id,
                content,
            } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
        })
        .collect()
}

/// First choice of a chat completion, as content plus tool calls.
pub fn parse_reply(response: &Value) -> Result<EngineReply, EngineError> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            let detail = response
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("no choices in response");
            EngineError::MalformedResponse(detail.to_string())
        })?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());
    Ok(EngineReply {
        content,
        tool_calls: extract_tool_calls(message),
    })
}

fn extract_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(calls) = message["tool_calls"].as_array() else {
        return Vec::new();
    };
    calls
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let name = item["function"]["name"].as_str()?.to_string();
            let id = item["id"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("tool_call_{}", idx + 1));
            let raw = item["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments = serde_json::from_str::<Value>(raw)
                .ok()
                .filter(|v| v.is_object())
                .unwrap_or_else(|| json!({}));
            Some(ToolCall {
                id,
                name,
                arguments,
            })
        })
        .collect()
}

//! Fakes shared by the daemon integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use kubegate_shared::params::Params;
use kubegated::config::GatewayConfig;
use kubegated::context::{CURRENT_CONTEXT_COMMAND, DEFAULT_NAMESPACE_COMMAND};
use kubegated::executor::{CommandOutput, CommandRunner};
use kubegated::pipeline::Gateway;
use kubegated::reasoning::{EngineError, EngineReply, ReasoningEngine, ToolCall, Turn};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every command and answers from a script. Kubeconfig lookups
/// answer `test-ctx` / `default` and are kept apart from real commands.
#[derive(Default)]
pub struct SpyRunner {
    calls: Mutex<Vec<(String, Duration)>>,
    lookups: Mutex<usize>,
    script: Vec<(String, CommandOutput)>,
}

impl SpyRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `output` to any command containing `needle`.
    pub fn respond(mut self, needle: &str, output: CommandOutput) -> Self {
        self.script.push((needle.to_string(), output));
        self
    }

    /// Commands other than kubeconfig lookups, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl CommandRunner for SpyRunner {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutput {
        if command == CURRENT_CONTEXT_COMMAND || command == DEFAULT_NAMESPACE_COMMAND {
            *self.lookups.lock().unwrap() += 1;
            let stdout = if command == CURRENT_CONTEXT_COMMAND {
                "test-ctx"
            } else {
                "default"
            };
            return ok(stdout);
        }
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), timeout));
        self.script
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| ok("ok"))
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        duration_ms: 3,
        ..Default::default()
    }
}

pub fn params(v: Value) -> Params {
    v.as_object().cloned().unwrap_or_default()
}

pub fn gateway(runner: Arc<SpyRunner>) -> Gateway {
    Gateway::new(GatewayConfig::default(), runner)
}

pub fn gateway_with(config: GatewayConfig, runner: Arc<SpyRunner>) -> Gateway {
    Gateway::new(config, runner)
}

/// Engine that replays canned replies and records what it was sent.
pub struct ScriptedEngine {
    replies: Mutex<std::collections::VecDeque<Result<EngineReply, EngineError>>>,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedEngine {
    pub fn new(replies: Vec<Result<EngineReply, EngineError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Engine that asks for the same tool call `rounds` times.
    pub fn looping(call: ToolCall, rounds: usize) -> Self {
        Self::new(
            (0..rounds)
                .map(|_| {
                    Ok(EngineReply {
                        content: None,
                        tool_calls: vec![call.clone()],
                    })
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Turns sent on the `n`th call.
    pub fn turns(&self, n: usize) -> Vec<Turn> {
        self.seen.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn complete(&self, turns: &[Turn], _tools: &[Value]) -> Result<EngineReply, EngineError> {
        self.seen.lock().unwrap().push(turns.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Transport("script exhausted".into())))
    }
}

pub fn answer(text: &str) -> Result<EngineReply, EngineError> {
    Ok(EngineReply {
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
    })
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

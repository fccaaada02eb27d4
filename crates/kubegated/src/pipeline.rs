//! The execution pipeline.
//!
//! validate → synthesize → classify → gate → execute → summarize.
//! Every rejection happens before a process is spawned; everything after
//! the gate is reported as a result, never as an error.

use crate::config::GatewayConfig;
use crate::context::ContextCache;
use crate::executor::{CommandRunner, ShellRunner, TimeoutPolicy};
use crate::gate::{self, GateDecision};
use chrono::Utc;
use kubegate_shared::catalog::{display_command, lookup};
use kubegate_shared::classify::classify_instruction;
use kubegate_shared::error::GateError;
use kubegate_shared::params::{parse_flag, parse_int, value_to_string, Params};
use kubegate_shared::redact::{redact_command, redact_map};
use kubegate_shared::rpc::{
    ConfirmationEnvelope, ExecuteResponse, ExecutionResult, CONFIRMATION_MESSAGE,
    PREVIEW_UNSUPPORTED_MESSAGE,
};
use kubegate_shared::summary::summarize_output;
use kubegate_shared::validate::validate_params;
use std::sync::Arc;
use tracing::{info, warn};

/// Keys that steer the pipeline rather than the command.
pub const CONTROL_KEYS: &[&str] = &["request_id", "timeout", "duration", "dry_run", "confirm"];

/// Per-request controls lifted out of the caller's params.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlParams {
    pub request_id: Option<String>,
    pub dry_run: bool,
    pub confirm: bool,
    /// Non-integer values are dropped so the defaults apply.
    pub timeout: Option<i64>,
    pub duration: Option<i64>,
}

impl ControlParams {
    /// Remove the control keys from `params` and interpret them.
    pub fn lift(params: &mut Params) -> Self {
        let request_id = params
            .remove("request_id")
            .map(|v| value_to_string(&v))
            .filter(|s| !s.is_empty());
        Self {
            request_id,
            dry_run: params.remove("dry_run").map(|v| parse_flag(&v)).unwrap_or(false),
            confirm: params.remove("confirm").map(|v| parse_flag(&v)).unwrap_or(false),
            timeout: params.remove("timeout").and_then(|v| parse_int(&v)),
            duration: params.remove("duration").and_then(|v| parse_int(&v)),
        }
    }
}

pub struct Gateway {
    config: GatewayConfig,
    timeouts: TimeoutPolicy,
    runner: Arc<dyn CommandRunner>,
    context: ContextCache,
}

impl Gateway {
    pub fn new(config: GatewayConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let context = ContextCache::new(
            runner.clone(),
            config.context_ttl(),
            config.context_timeout()
        );
        let timeouts = TimeoutPolicy {
            default_timeout_secs: config.default_timeout_secs,
            default_stream_duration_secs: config.default_stream_duration_secs,
        };
        Self {
            config,
            timeouts,
            runner,
            context,
        }
    }

    /// Gateway that runs commands through the configured shell.
    pub fn with_shell(config: GatewayConfig) -> Self {
        let runner = Arc::new(ShellRunner::new(config.shell.clone()));
        Self::new(config, runner)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run one instruction through the full pipeline.
    pub async fn execute(
        &self,
        session_id: &str,
        instruction: &str,
        params: Params,
    ) -> Result<ExecuteResponse, GateError> {
        let result = self.execute_inner(session_id, instruction, params).await;
        if let Err(e) = &result {
            warn!(
                event = "execute_rejected",
                session_id = %session_id,
                instruction = %instruction,
                kind = e.kind(),
                detail = %e
            );
        }
        result
    }

    async fn execute_inner(
        &self,
        session_id: &str,
        instruction: &str,
        mut params: Params,
    ) -> Result<ExecuteResponse, GateError> {
        if session_id.trim().is_empty() {
            return Err(GateError::MissingSessionId);
        }
        let control = ControlParams::lift(&mut params);

        validate_params(&mut params)?;
        let instr = lookup(instruction)?;
        let synthesized = instr.synthesize(&params)?;
        let command = synthesized.command;
        let display = synthesized.display_command;

        let verdict = classify_instruction(instr, &command);
        if verdict.is_heuristic() {
            warn!(
                "{} has no explicit mutating flag; heuristic verdict {} via {:?}",
                instruction, verdict.mutating, verdict.rule
            );
        }

        let context = self.context.current().await;
        let request_id = control.request_id.clone();
        let redacted_command = redact_command(&display);
        info!(
            event = "execute_requested",
            session_id = %session_id,
            request_id = request_id.as_deref().unwrap_or("-"),
            instruction = %instruction,
            params = %serde_json::Value::Object(redact_map(&params)),
            command = %redacted_command,
            mutating = verdict.mutating,
            dry_run = control.dry_run,
            confirm = control.confirm,
            context = context.current_context.as_deref().unwrap_or("-"),
            namespace = context.default_namespace.as_deref().unwrap_or("-")
        );

        let decision = gate::decide(
            self.config.require_confirm_for_mutations,
            verdict.mutating,
            control.dry_run,
            control.confirm
        );

        if decision == GateDecision::AwaitingConfirmation {
            let preview =
                gate::run_preview(self.runner.as_ref(), &command, self.config.preview_timeout())
                    .await;
            info!(
                event = "confirmation_required",
                session_id = %session_id,
                request_id = request_id.as_deref().unwrap_or("-"),
                instruction = %instruction,
                preview_supported = preview.supported,
                preview_returncode = preview.returncode
            );
            return Ok(ExecuteResponse::ConfirmationRequired(ConfirmationEnvelope {
                session_id: session_id.to_string(),
                request_id,
                instruction: instruction.to_string(),
                command,
                display_command: display,
                confirmation_required: true,
                message: CONFIRMATION_MESSAGE.to_string(),
                preview,
                returncode: 0,
            }));
        }

        let mut result = ExecutionResult {
            session_id: session_id.to_string(),
            request_id,
            instruction: instruction.to_string(),
            ..Default::default()
        };

        if control.dry_run {
            match gate::preview_command(&command) {
                Some(preview) => {
                    let out = self
                        .runner
                        .run(&preview, self.config.preview_timeout())
                        .await;
                    result.display_command = display_command(&preview);
                    result.command = preview;
                    result.stdout = out.stdout;
                    result.stderr = out.stderr;
                    result.returncode = out.returncode;
                    result.timed_out = out.timed_out;
                    result.duration_ms = out.duration_ms;
                    result.dry_run = Some(true);
                }
                None => {
                    result.command = command;
                    result.display_command = display;
                    result.stderr = PREVIEW_UNSUPPORTED_MESSAGE.to_string();
                    result.preview_only = Some(true);
                }
            }
            result.context = Some((*context).clone());
        } else {
            let timeout = self
                .timeouts
                .resolve(&command, control.timeout, control.duration);
            let out = self.runner.run(&command, timeout).await;

            if let Some(structured) = summarize_output(
                params.get("structured_output").map(parse_flag).unwrap_or(false),
                out.returncode,
                &out.stdout,
                Utc::now(),
            ) {
                result.structured = Some(structured.structured);
                result.summary = structured.summary;
            }

            // A successful switch makes the cached snapshot stale.
            let context = if instruction == "use_context" && out.returncode == 0 {
                self.context.invalidate().await;
                self.context.current().await
            } else {
                context
            };

            result.command = command;
            result.display_command = display;
            result.stdout = out.stdout;
            result.stderr = out.stderr;
            result.returncode = out.returncode;
            result.timed_out = out.timed_out;
            result.duration_ms = out.duration_ms;
            result.context = Some((*context).clone());
        }

        info!(
            event = "execute_result",
            session_id = %session_id,
            request_id = result.request_id.as_deref().unwrap_or("-"),
            instruction = %instruction,
            returncode = result.returncode,
            timed_out = result.timed_out,
            duration_ms = result.duration_ms,
            dry_run = result.dry_run.unwrap_or(false),
            preview_only = result.preview_only.unwrap_or(false)
        );
        Ok(ExecuteResponse::Executed(result))
    }
}

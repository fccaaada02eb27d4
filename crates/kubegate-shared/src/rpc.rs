//! HTTP wire types for kubegated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::Params;

/// Message returned with every confirmation envelope.
pub const CONFIRMATION_MESSAGE: &str = "This action modifies cluster state. Resubmit with confirm=true to proceed, or dry_run=true to preview only.";

/// stderr of a dry-run request whose command has no preview form.
pub const PREVIEW_UNSUPPORTED_MESSAGE: &str =
    "Dry-run preview not supported for this command form; returning command only.";

/// Body of `POST /execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub instruction: String,
    #[serde(default)]
    pub params: Option<Params>,
}

/// Active kubeconfig context at execution time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub current_context: Option<String>,
    pub default_namespace: Option<String>,
}

/// Outcome of a command that actually ran (live or as a dry run).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub session_id: String,
    pub request_id: Option<String>,
    pub instruction: String,
    pub command: String,
    pub display_command: String,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_only: Option<bool>,
}

/// Best-effort server-side dry run attached to a confirmation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub supported: bool,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl PreviewReport {
    /// Preview for a command form that has no dry-run variant.
    pub fn unsupported(command: &str) -> Self {
        Self {
            supported: false,
            command: command.to_string(),
            stdout: String::new(),
            stderr: String::new(),
            returncode: 0,
            dry_run: None,
        }
    }
}

/// Returned instead of executing a mutating command without consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEnvelope {
    pub session_id: String,
    pub request_id: Option<String>,
    pub instruction: String,
    pub command: String,
    pub display_command: String,
    pub confirmation_required: bool,
    pub message: String,
    pub preview: PreviewReport,
    pub returncode: i32,
}

/// Either a result or a request for confirmation. Both are HTTP 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecuteResponse {
    ConfirmationRequired(ConfirmationEnvelope),
    Executed(ExecutionResult),
}

impl ExecuteResponse {
    pub fn is_confirmation(&self) -> bool {
        matches!(self, ExecuteResponse::ConfirmationRequired(_))
    }
}

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}

/// `GET /instructions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionsResponse {
    pub instructions: Map<String, Value>,
}

/// Body of `POST /diagnose`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnoseRequest {
    pub question: String,
}

/// How a reasoning session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnoseOutcome {
    Answer,
    MaxIterations,
    LlmLimitReached,
    EngineFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnoseResponse {
    pub request_id: String,
    pub outcome: DiagnoseOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub iterations: u32,
    pub llm_calls: u32,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

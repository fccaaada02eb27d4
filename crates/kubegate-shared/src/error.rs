//! Error types for the gateway pipeline.
//!
//! Every variant here means the request was rejected before any external
//! process ran. Timeouts and non-zero exit codes are not errors; they travel
//! in the result body.

use thiserror::Error;

/// A parameter failed validation. `reason` is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Catalog dispatch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("Invalid parameters for instruction: {0}")]
    InvalidParameters(String),
}

/// Any rejection surfaced to the caller as a client error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("session_id is required")]
    MissingSessionId,

    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl GateError {
    /// Stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::MissingSessionId => "missing_session_id",
            GateError::MalformedBody(_) => "malformed_body",
            GateError::Validation(_) => "validation_error",
            GateError::Catalog(CatalogError::UnknownInstruction(_)) => "unknown_instruction",
            GateError::Catalog(CatalogError::InvalidParameters(_)) => "invalid_parameters",
        }
    }
}

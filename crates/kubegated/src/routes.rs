//! API routes for kubegated

use crate::reasoning::run_diagnostic;
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kubegate_shared::catalog::describe_all;
use kubegate_shared::error::GateError;
use kubegate_shared::rpc::{
    DiagnoseRequest, DiagnoseResponse, ErrorBody, ExecuteRequest, ExecuteResponse,
    InstructionsResponse, RootResponse,
};
use kubegate_shared::VERSION;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

type AppStateArc = Arc<AppState>;

pub const ENGINE_UNAVAILABLE: &str =
    "Reasoning engine not configured; set OPENAI_API_KEY or [reasoning].api_key";

/// Error response: `{detail}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

impl SessionQuery {
    fn require(&self) -> Result<&str, GateError> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(GateError::MissingSessionId)
    }
}

// ============================================================================
// Meta Routes
// ============================================================================

pub fn meta_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/", get(root))
        .route("/instructions", get(instructions))
}

async fn root(State(state): State<AppStateArc>) -> Json<RootResponse> {
    debug!("Liveness check, up {:?}", state.start_time.elapsed());
    Json(RootResponse {
        message: "kubegate gateway is running".to_string(),
        version: VERSION.to_string(),
    })
}

async fn instructions() -> Json<InstructionsResponse> {
    Json(InstructionsResponse {
        instructions: describe_all(),
    })
}

// ============================================================================
// Execute Routes
// ============================================================================

pub fn execute_routes() -> Router<AppStateArc> {
    Router::new().route("/execute", post(execute))
}

async fn execute(
    State(state): State<AppStateArc>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<Json<ExecuteResponse>, ApiError> {
    // Checked before the body is looked at.
    let session_id = query.require()?;
    let req: ExecuteRequest = serde_json::from_slice(&body)
        .map_err(|e| GateError::MalformedBody(e.to_string()))?;

    let response = state
        .gateway
        .execute(session_id, &req.instruction, req.params.unwrap_or_default())
        .await?;
    Ok(Json(response))
}

// ============================================================================
// Diagnose Routes
// ============================================================================

pub fn diagnose_routes() -> Router<AppStateArc> {
    Router::new().route("/diagnose", post(diagnose))
}

async fn diagnose(
    State(state): State<AppStateArc>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<Json<DiagnoseResponse>, ApiError> {
    let session_id = query.require()?;
    let Some(engine) = state.engine.as_ref() else {
        return Err(ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: ENGINE_UNAVAILABLE.to_string(),
        });
    };
    let req: DiagnoseRequest = serde_json::from_slice(&body)
        .map_err(|e| GateError::MalformedBody(e.to_string()))?;

    info!("Diagnose request for session {}", session_id);
    let response = run_diagnostic(
        &state.gateway,
        engine.as_ref(),
        session_id,
        &req.question,
        state.limits,
    )
    .await;
    Ok(Json(response))
}

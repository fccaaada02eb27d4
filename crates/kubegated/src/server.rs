//! HTTP server for kubegated

use crate::pipeline::Gateway;
use crate::reasoning::{LoopLimits, ReasoningEngine};
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// `None` disables `/diagnose`
    pub engine: Option<Arc<dyn ReasoningEngine>>,
    pub limits: LoopLimits,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            engine: None,
            limits: LoopLimits::default(),
            start_time: Instant::now(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// The full router, without a listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::meta_routes())
        .merge(routes::execute_routes())
        .merge(routes::diagnose_routes())
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, bind: &str) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

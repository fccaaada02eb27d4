//! kubegated - safety-gated Kubernetes command gateway
//!
//! Serves the execute/diagnose HTTP surface, or runs a single diagnose
//! session from the command line.

use anyhow::{Context, Result};
use clap::Parser;
use kubegate_shared::version::VersionInfo;
use kubegated::cli::{Cli, Commands};
use kubegated::config::Config;
use kubegated::llm::OpenAiEngine;
use kubegated::pipeline::Gateway;
use kubegated::reasoning::{run_diagnostic, LoopLimits, ReasoningEngine};
use kubegated::server::{self, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "kubegated=info,tower_http=info";

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_engine(config: &Config) -> Option<Arc<dyn ReasoningEngine>> {
    config.reasoning.api_key.as_ref()?;
    match OpenAiEngine::new(&config.reasoning) {
        Ok(engine) => {
            info!("Reasoning engine: {} at {}", engine.model(), config.reasoning.endpoint);
            Some(Arc::new(engine))
        }
        Err(e) => {
            warn!("Reasoning engine disabled: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(cli.log_json || config.gateway.log_json);

    let version = VersionInfo::current();
    info!(
        "kubegated v{} ({} built {}) starting",
        version.version, version.git_sha, version.build_date
    );
    info!("Configuration: {}", config.source);

    let engine = build_engine(&config);
    if !config.gateway.require_confirm_for_mutations {
        warn!("Mutating commands will run without confirmation");
    }

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.gateway.bind.clone());
            let gateway = Gateway::with_shell(config.gateway.clone());
            let mut state = AppState::new(gateway);
            if let Some(engine) = engine {
                state = state.with_engine(engine);
            } else {
                info!("No reasoning engine configured; /diagnose returns 503");
            }
            server::run(state, &bind).await
        }
        Commands::Diagnose {
            question,
            session_id,
        } => {
            let engine = engine.context("Diagnose needs a reasoning engine; set OPENAI_API_KEY")?;
            let gateway = Gateway::with_shell(config.gateway.clone());
            let response = run_diagnostic(
                &gateway,
                engine.as_ref(),
                &session_id,
                &question,
                LoopLimits::default(),
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

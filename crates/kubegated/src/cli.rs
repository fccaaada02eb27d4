//! CLI - Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kubegate gateway daemon
#[derive(Parser, Debug)]
#[command(name = "kubegated")]
#[command(about = "Safety-gated Kubernetes command gateway", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (defaults to /etc/kubegate/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Listen address (overrides config and $KUBEGATE_BIND)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one reasoning session in-process and print the outcome
    Diagnose {
        /// Question about the cluster
        question: String,

        #[arg(long, default_value = "cli-session")]
        session_id: String,
    },
}

//! Configuration management for kubegated.
//!
//! Loads settings from /etc/kubegate/config.toml (or `--config`), then
//! applies environment overrides. Every field has a default, so a missing
//! file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fmt;
use thiserror::Error;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/kubegate/config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Execution pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address for the HTTP surface
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Hold mutating commands until the caller confirms or asks for a dry run
    #[serde(default = "default_require_confirm")]
    pub require_confirm_for_mutations: bool,

    /// Per-command timeout when the request does not set one
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Cap for watch/follow commands when the request does not set `duration`
    #[serde(default = "default_stream_duration")]
    pub default_stream_duration_secs: u64,

    /// Cap for server-side dry-run previews
    #[serde(default = "default_preview_timeout")]
    pub preview_timeout_secs: u64,

    /// How long a kubeconfig context snapshot stays fresh
    #[serde(default = "default_context_ttl")]
    pub context_ttl_secs: u64,

    /// Cap for each kubeconfig lookup
    #[serde(default = "default_context_timeout")]
    pub context_timeout_secs: u64,

    /// Shell used to run command lines
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_require_confirm() -> bool {
    true
}

fn default_timeout() -> u64 {
    60
}

fn default_stream_duration() -> u64 {
    15
}

fn default_preview_timeout() -> u64 {
    30
}

fn default_context_ttl() -> u64 {
    60
}

fn default_context_timeout() -> u64 {
    5
}

fn default_shell() -> String {
    if cfg!(windows) {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            require_confirm_for_mutations: default_require_confirm(),
            default_timeout_secs: default_timeout(),
            default_stream_duration_secs: default_stream_duration(),
            preview_timeout_secs: default_preview_timeout(),
            context_ttl_secs: default_context_ttl(),
            context_timeout_secs: default_context_timeout(),
            shell: default_shell(),
            log_json: false,
        }
    }
}

impl GatewayConfig {
    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }

    pub fn context_ttl(&self) -> Duration {
        Duration::from_secs(self.context_ttl_secs)
    }

    pub fn context_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout_secs)
    }
}

/// Reasoning engine (OpenAI-compatible chat completions) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Without a key the diagnose surface is disabled
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where a loaded configuration came from. Loading happens before the
/// subscriber is installed, so the caller logs this afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    #[default]
    Defaults,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Defaults => write!(f, "defaults (no config at {})", CONFIG_PATH),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub reasoning: ReasoningConfig,

    #[serde(skip)]
    pub source: ConfigSource,
}

impl Config {
    /// Load from an explicit path (which must exist) or from the default
    /// path (which may not), then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => match Self::load_from_path(Path::new(CONFIG_PATH)) {
                Ok(c) => c,
                Err(ConfigError::Read { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    Config::default()
                }
                Err(e) => return Err(e),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source = ConfigSource::File(path.to_path_buf());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REQUIRE_CONFIRM_FOR_MUTATIONS") {
            self.gateway.require_confirm_for_mutations =
                matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("KUBEGATE_BIND").filter(|v| !v.is_empty()) {
            self.gateway.bind = v;
        }
        if let Some(v) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.reasoning.api_key = Some(v);
        }
        if let Some(v) = lookup("KUBEGATE_LLM_ENDPOINT").filter(|v| !v.is_empty()) {
            self.reasoning.endpoint = v;
        }
        if let Some(v) = lookup("KUBEGATE_LLM_MODEL").filter(|v| !v.is_empty()) {
            self.reasoning.model = v;
        }
    }
}

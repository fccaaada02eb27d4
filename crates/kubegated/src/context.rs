//! Active kubeconfig context, cached.
//!
//! Each execution result carries the context it ran against. Looking it up
//! costs two kubectl invocations, so a snapshot is reused for a short while.
//! A snapshot without a current context is never reused.

use crate::executor::CommandRunner;
use kubegate_shared::rpc::ContextSnapshot;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

pub const CURRENT_CONTEXT_COMMAND: &str = "kubectl config current-context";
pub const DEFAULT_NAMESPACE_COMMAND: &str =
    "kubectl config view --minify --output 'jsonpath={..namespace}'";

pub struct ContextCache {
    runner: Arc<dyn CommandRunner>,
    ttl: Duration,
    lookup_timeout: Duration,
    slot: RwLock<Option<(Instant, Arc<ContextSnapshot>)>>,
}

impl ContextCache {
    pub fn new(runner: Arc<dyn CommandRunner>, ttl: Duration, lookup_timeout: Duration) -> Self {
        Self {
            runner,
            ttl,
            lookup_timeout,
            slot: RwLock::new(None),
        }
    }

    /// Fresh snapshot if one is cached, otherwise ask kubectl.
    pub async fn current(&self) -> Arc<ContextSnapshot> {
        if let Some((taken_at, snapshot)) = self.slot.read().await.as_ref() {
            if taken_at.elapsed() < self.ttl && snapshot.current_context.is_some() {
                return snapshot.clone();
            }
        }

        let snapshot = Arc::new(self.lookup().await);
        debug!(
            "Context refreshed: {:?} ns={:?}",
            snapshot.current_context, snapshot.default_namespace
        );
        *self.slot.write().await = Some((Instant::now(), snapshot.clone()));
        snapshot
    }

    /// Drop the cached snapshot (after `use_context`, for instance).
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    async fn lookup(&self) -> ContextSnapshot {
        let (context, namespace) = tokio::join!(
            self.read_value(CURRENT_CONTEXT_COMMAND),
            self.read_value(DEFAULT_NAMESPACE_COMMAND)
        );
        ContextSnapshot {
            current_context: context,
            default_namespace: namespace,
        }
    }

    async fn read_value(&self, command: &str) -> Option<String> {
        let out = self.runner.run(command, self.lookup_timeout).await;
        if out.returncode != 0 || out.timed_out {
            return None;
        }
        let value = out.stdout.trim();
        // jsonpath prints the literal quotes on cmd.exe
        let value = value.trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    }
}

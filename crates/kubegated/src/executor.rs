//! Bounded command execution.
//!
//! One child process per command, run through the host shell. Both streams
//! are drained concurrently into shared buffers so output produced before
//! a timeout survives the kill. On expiry the whole process group is
//! killed, which also takes down pipelines and `kubectl ... -w` children.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long readers may keep draining after the child is gone.
const READER_GRACE: Duration = Duration::from_secs(2);

/// What came back from one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `-<signal>` when killed by a signal, `-1` when unknown.
    pub returncode: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn failed_to_start(error: impl std::fmt::Display, started: Instant) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Failed to start command: {}", error),
            returncode: -1,
            timed_out: false,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Runs command lines. The gateway only ever talks to this trait, so
/// tests can substitute a recording fake.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutput;
}

/// Real runner: `sh -c <command>` (or `cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn shell_flag(&self) -> &'static str {
        let lower = self.shell.to_lowercase();
        if lower.ends_with("cmd") || lower.ends_with("cmd.exe") {
            "/C"
        } else {
            "-c"
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(if cfg!(windows) { "cmd" } else { "sh" })
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutput {
        let started = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg(self.shell_flag())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.shell, e);
                return CommandOutput::failed_to_start(e, started);
            }
        };

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let readers = [
            child.stdout.take().map(|s| drain(s, stdout_buf.clone())),
            child.stderr.take().map(|s| drain(s, stderr_buf.clone())),
        ];

        let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status.ok(), false),
            Err(_) => {
                debug!("Command exceeded {:?}, killing process group", timeout);
                kill_tree(&mut child).await;
                (child.wait().await.ok(), true)
            }
        };

        for reader in readers.into_iter().flatten() {
            finish_reader(reader).await;
        }

        CommandOutput {
            stdout: take_text(&stdout_buf),
            stderr: take_text(&stderr_buf),
            returncode: status.map(exit_code).unwrap_or(-1),
            timed_out,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn drain<R>(mut stream: R, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut b) = buf.lock() {
                        b.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

/// Wait briefly for a reader to hit EOF. A backgrounded grandchild can hold
/// the pipe open forever, so give up after the grace period.
async fn finish_reader(mut reader: JoinHandle<()>) {
    if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
        reader.abort();
    }
}

fn take_text(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    buf.lock()
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .unwrap_or_default()
}

#[cfg(unix)]
async fn kill_tree(child: &mut tokio::process::Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("killpg({}) failed: {}", pid, e);
        }
    }
    let _ = child.kill().await;
}

#[cfg(not(unix))]
async fn kill_tree(child: &mut tokio::process::Child) {
    let _ = child.kill().await;
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

// ============================================================================
// Timeout policy
// ============================================================================

/// Per-request timeout resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub default_timeout_secs: u64,
    pub default_stream_duration_secs: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60,
            default_stream_duration_secs: 15,
        }
    }
}

impl TimeoutPolicy {
    /// `timeout` (at least 1s) for ordinary commands. Streaming commands
    /// are further capped at `max(1, duration)`.
    pub fn resolve(&self, command: &str, timeout: Option<i64>, duration: Option<i64>) -> Duration {
        let timeout = timeout
            .map(|t| t.max(1) as u64)
            .unwrap_or(self.default_timeout_secs)
            .max(1);
        let secs = if is_streaming(command) {
            let duration = duration
                .map(|d| d.max(1) as u64)
                .unwrap_or(self.default_stream_duration_secs)
                .max(1);
            timeout.min(duration)
        } else {
            timeout
        };
        Duration::from_secs(secs)
    }
}

/// Commands that never exit on their own: watches and followed logs.
pub fn is_streaming(command: &str) -> bool {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    let has = |flag: &str| tokens.iter().any(|t| *t == flag || t.starts_with(&format!("{}=", flag)));
    if has("-w") || has("--watch") {
        return true;
    }
    let is_logs = tokens.windows(2).any(|w| w[0] == "kubectl" && w[1] == "logs");
    is_logs && (has("-f") || has("--follow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_detection() {
        assert!(is_streaming("kubectl get events -n default -w"));
        assert!(is_streaming("kubectl get pods --watch"));
        assert!(is_streaming("kubectl logs -n default web -f"));
        assert!(is_streaming("kubectl logs -n default web --follow=true"));
        assert!(!is_streaming("kubectl get pods -n default"));
        // -f on apply means a file, not follow
        assert!(!is_streaming("kubectl apply -f -"));
        assert!(!is_streaming("kubectl get -o wide pods"));
    }

    #[test]
    fn test_timeout_resolution() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.resolve("kubectl get ns", None, None), Duration::from_secs(60));
        assert_eq!(policy.resolve("kubectl get ns", Some(5), None), Duration::from_secs(5));
        assert_eq!(policy.resolve("kubectl get ns", Some(0), None), Duration::from_secs(1));
        assert_eq!(
            policy.resolve("kubectl get pods -w", None, None),
            Duration::from_secs(15)
        );
        assert_eq!(
            policy.resolve("kubectl get pods -w", Some(5), Some(30)),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.resolve("kubectl get pods -w", None, Some(0)),
            Duration::from_secs(1)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let out = ShellRunner::default()
            .run("echo hello; echo oops >&2; exit 3", Duration::from_secs(10))
            .await;
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
        assert_eq!(out.returncode, 3);
        assert!(!out.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let started = Instant::now();
        let out = ShellRunner::default()
            .run("echo started; sleep 30", Duration::from_millis(300))
            .await;
        assert!(out.timed_out);
        assert_eq!(out.stdout, "started");
        assert_eq!(out.returncode, -9);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_pipeline_children() {
        let started = Instant::now();
        let out = ShellRunner::default()
            .run("sleep 30 | cat", Duration::from_millis(300))
            .await;
        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_a_result() {
        let out = ShellRunner::new("/nonexistent/kubegate-shell")
            .run("true", Duration::from_secs(1))
            .await;
        assert_eq!(out.returncode, -1);
        assert!(out.stderr.starts_with("Failed to start command"));
        assert!(!out.timed_out);
    }
}

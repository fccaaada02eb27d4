//! Confirmation and dry-run gate.
//!
//! A mutating command without consent never runs. Instead the caller gets a
//! confirmation envelope carrying a client-side dry-run preview when the
//! command has a form that supports one.

use crate::executor::{CommandOutput, CommandRunner};
use kubegate_shared::catalog::is_encoded_script;
use kubegate_shared::rpc::PreviewReport;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

const DRY_RUN_FLAGS: &str = "--dry-run=client -o yaml";

/// Dry-run flags go right after the verb.
static APPLY_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bkubectl\s+apply\b").unwrap());

/// Dry-run flags go at the end.
static APPEND_VERBS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bkubectl\s+(create|expose|autoscale)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Return a confirmation envelope; run nothing but the preview.
    AwaitingConfirmation,
    /// Run it (live, or as a dry run when asked).
    Ready,
}

pub fn decide(require_confirm: bool, mutating: bool, dry_run: bool, confirm: bool) -> GateDecision {
    if require_confirm && mutating && !dry_run && !confirm {
        GateDecision::AwaitingConfirmation
    } else {
        GateDecision::Ready
    }
}

/// Client-side dry-run form of `command`, or `None` when there is none.
pub fn preview_command(command: &str) -> Option<String> {
    if is_encoded_script(command) {
        return None;
    }
    if let Some(m) = APPLY_VERB.find(command) {
        if command.contains("--dry-run") {
            return Some(command.to_string());
        }
        return Some(format!(
            "{} {}{}",
            &command[..m.end()],
            DRY_RUN_FLAGS,
            &command[m.end()..]
        ));
    }
    if APPEND_VERBS.is_match(command) {
        if command.contains("--dry-run") {
            return Some(command.to_string());
        }
        return Some(format!("{} {}", command.trim_end(), DRY_RUN_FLAGS));
    }
    None
}

/// Run the preview for `command` under `cap`. Previews are never gated.
pub async fn run_preview(
    runner: &dyn CommandRunner,
    command: &str,
    cap: Duration,
) -> PreviewReport {
    let Some(preview) = preview_command(command) else {
        return PreviewReport::unsupported(command);
    };
    let out = runner.run(&preview, cap).await;
    preview_report(preview, out, cap)
}

fn preview_report(command: String, out: CommandOutput, cap: Duration) -> PreviewReport {
    if out.timed_out {
        return PreviewReport {
            supported: true,
            command,
            stdout: out.stdout,
            stderr: format!("Dry-run preview timed out after {}s", cap.as_secs()),
            returncode: -1,
            dry_run: Some(true),
        };
    }
    PreviewReport {
        supported: true,
        command,
        stdout: out.stdout,
        stderr: out.stderr,
        returncode: out.returncode,
        dry_run: Some(true),
    }
}

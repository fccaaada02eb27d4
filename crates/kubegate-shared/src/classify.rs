//! Mutation classification.
//!
//! Decides whether a synthesized command changes cluster state. An explicit
//! per-instruction flag always wins; the name-prefix and command-token
//! heuristics only apply to instructions that do not declare one, and
//! callers are expected to log those verdicts.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::catalog::{decode_script, Instruction};

/// Instruction name prefixes that imply a mutation.
pub const MUTATING_PREFIXES: &[&str] = &[
    "create_", "delete_", "scale_", "set_", "expose_", "undo_", "start_", "stop_",
];

/// `kubectl <verb>` at a word boundary, anywhere in the command line.
static MUTATING_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bkubectl\s+(delete|apply|create|expose|autoscale|scale|set|rollout\s+undo|run)\b",
    )
    .unwrap()
});

/// Which rule produced a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "evidence", rename_all = "snake_case")]
pub enum MutationRule {
    Override,
    NamePrefix(String),
    CommandToken(String),
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationVerdict {
    pub mutating: bool,
    #[serde(flatten)]
    pub rule: MutationRule,
}

impl MutationVerdict {
    /// True when no explicit flag backed the verdict.
    pub fn is_heuristic(&self) -> bool {
        self.rule != MutationRule::Override
    }
}

/// Classify a command produced for `name`.
///
/// Encoded script payloads are decoded and scanned too.
pub fn classify(name: &str, override_flag: Option<bool>, command: &str) -> MutationVerdict {
    if let Some(mutating) = override_flag {
        return MutationVerdict {
            mutating,
            rule: MutationRule::Override,
        };
    }

    if let Some(prefix) = MUTATING_PREFIXES.iter().find(|p| name.starts_with(**p)) {
        return MutationVerdict {
            mutating: true,
            rule: MutationRule::NamePrefix((*prefix).to_string()),
        };
    }

    let decoded = decode_script(command);
    let haystacks = std::iter::once(command).chain(decoded.as_deref());
    for text in haystacks {
        if let Some(m) = MUTATING_TOKEN_RE.find(text) {
            let token = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            return MutationVerdict {
                mutating: true,
                rule: MutationRule::CommandToken(token),
            };
        }
    }

    MutationVerdict {
        mutating: false,
        rule: MutationRule::NoMatch,
    }
}

pub fn classify_instruction(instruction: &Instruction, command: &str) -> MutationVerdict {
    classify(instruction.name, instruction.mutating, command)
}

//! Secret masking for log output.
//!
//! Pure transforms: nothing here decides whether to log, only what a logged
//! value may show.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Keys whose values are always masked (compared case-insensitively).
pub const SENSITIVE_KEYS: &[&str] = &[
    "openai_api_key",
    "api_key",
    "authorization",
    "token",
    "password",
    "secret",
    "credential",
];

/// Secret-bearing fragments of a command line.
static COMMAND_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // --token=abc, --password abc, --client-key=...
        Regex::new(r"(?i)(--(?:token|password|client-key|client-certificate-data|api-key)[= ])(\S+)")
            .unwrap(),
        // Authorization: Bearer abc
        Regex::new(r"(?i)(bearer\s+)([a-zA-Z0-9._~+/=-]+)").unwrap(),
    ]
});

/// `abcd***wxyz`, or `***` for values of eight characters or fewer.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.contains(&lower.as_str())
}

/// Copy of `value` with every sensitive key masked, at any depth.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

pub fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| {
            let v = if is_sensitive_key(k) {
                let raw = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Value::String(mask(&raw))
            } else {
                redact_value(v)
            };
            (k.clone(), v)
        })
        .collect()
}

/// Mask secret-bearing flags inside a command line.
pub fn redact_command(command: &str) -> String {
    let mut out = command.to_string();
    for pattern in COMMAND_PATTERNS.iter() {
        out = pattern
            .replace_all(&out, |caps: &regex::Captures| {
                format!("{}{}", &caps[1], mask(&caps[2]))
            })
            .into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_lengths() {
        assert_eq!(mask("short"), "***");
        assert_eq!(mask("12345678"), "***");
        assert_eq!(mask("sk-abcdefghijkl"), "sk-a***ijkl");
    }

    #[test]
    fn test_nested_keys_are_masked() {
        let v = json!({
            "params": {"Token": "abcdefghijklmnop", "name": "web"},
            "list": [{"password": "hunter2"}],
            "OPENAI_API_KEY": "sk-1234567890abcdef",
        });
        let r = redact_value(&v);
        assert_eq!(r["params"]["Token"], "abcd***mnop");
        assert_eq!(r["params"]["name"], "web");
        assert_eq!(r["list"][0]["password"], "***");
        assert_eq!(r["OPENAI_API_KEY"], "sk-1***cdef");
    }

    #[test]
    fn test_non_string_secret_is_stringified() {
        let r = redact_value(&json!({"secret": 123456789012_i64}));
        assert_eq!(r["secret"], "1234***9012");
    }

    #[test]
    fn test_command_flags_are_masked() {
        let cmd = "kubectl get pods --token=abcdefghijklmnop -n default";
        assert_eq!(
            redact_command(cmd),
            "kubectl get pods --token=abcd***mnop -n default"
        );
        assert_eq!(redact_command("kubectl get ns"), "kubectl get ns");
    }
}

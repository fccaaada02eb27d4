//! Loosely-typed instruction parameters.
//!
//! Callers (and especially the reasoning engine, which sends every argument
//! as a string) are inconsistent about types, so values are coerced here.

use serde_json::Value;

/// Raw parameter object as received from the caller.
pub type Params = serde_json::Map<String, Value>;

/// Render a value the way it should appear on a command line.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Interpret a value as a boolean flag.
///
/// Accepts JSON booleans, non-zero numbers, and `true`/`1`/`yes`
/// (case-insensitive). Everything else is false.
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => false,
    }
}

/// Interpret a value as an integer: JSON integers, integral floats, or
/// strings that parse as integers.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

//! One-line-per-object summaries of `kubectl ... -o json` output.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parsed output plus its human summary.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredOutput {
    pub structured: Value,
    /// `None` when no object produced a line.
    pub summary: Option<String>,
}

/// Summarize command output when the caller asked for structured output,
/// the command succeeded, and there is something to parse. Anything that
/// is not JSON is left alone.
pub fn summarize_output(
    requested: bool,
    returncode: i32,
    stdout: &str,
    now: DateTime<Utc>,
) -> Option<StructuredOutput> {
    if !requested || returncode != 0 || stdout.is_empty() {
        return None;
    }
    let structured: Value = serde_json::from_str(stdout).ok()?;
    if structured.is_null() {
        return None;
    }

    let items: Vec<&Value> = match &structured {
        Value::Object(obj) => match obj.get("items") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => Vec::new(),
            None => vec![&structured],
        },
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let lines: Vec<String> = items
        .into_iter()
        .filter(|v| v.is_object())
        .map(|obj| summarize_item(obj, now))
        .collect();

    let summary = if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    };
    Some(StructuredOutput {
        structured,
        summary,
    })
}

/// Render one Kubernetes object as a summary line.
pub fn summarize_item(obj: &Value, now: DateTime<Utc>) -> String {
    let kind = str_at(obj, &["kind"]).to_lowercase();
    let name = str_at(obj, &["metadata", "name"]);
    let ns = str_at(obj, &["metadata", "namespace"]);
    let age = match obj.pointer("/metadata/creationTimestamp") {
        Some(Value::String(ts)) if !ts.is_empty() => format_age(parse_timestamp(ts, now), now),
        _ => "-".to_string(),
    };

    match kind.as_str() {
        "pod" => {
            let statuses = obj
                .pointer("/status/containerStatuses")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let restarts: i64 = statuses
                .iter()
                .map(|c| c.get("restartCount").and_then(Value::as_i64).unwrap_or(0))
                .sum();
            let ready = statuses
                .iter()
                .filter(|c| c.get("ready").and_then(Value::as_bool).unwrap_or(false))
                .count();
            format!(
                "pod/{} ns={} ip={} node={} phase={} ready={}/{} restarts={} age={}",
                name,
                ns,
                str_or_dash(obj, &["status", "podIP"]),
                str_or_dash(obj, &["spec", "nodeName"]),
                str_at(obj, &["status", "phase"]),
                ready,
                statuses.len(),
                restarts,
                age
            )
        }
        "deployment" => {
            let replicas = obj
                .pointer("/spec/replicas")
                .or_else(|| obj.pointer("/status/replicas"))
                .map(render_scalar)
                .unwrap_or_else(|| "0".to_string());
            let count = |field: &str| {
                obj.get("status")
                    .and_then(|s| s.get(field))
                    .map(render_scalar)
                    .unwrap_or_else(|| "0".to_string())
            };
            format!(
                "deployment/{} ns={} replicas={} ready={} updated={} available={} age={}",
                name,
                ns,
                replicas,
                count("readyReplicas"),
                count("updatedReplicas"),
                count("availableReplicas"),
                age
            )
        }
        "service" => {
            let spec = obj.get("spec");
            let ports = spec
                .and_then(|s| s.get("ports"))
                .and_then(Value::as_array)
                .map(|ports| {
                    ports
                        .iter()
                        .map(|p| p.get("port").map(render_scalar).unwrap_or_else(|| "None".into()))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();

            let cluster_ips: Vec<String> = match spec.and_then(|s| s.get("clusterIPs")) {
                Some(Value::Array(ips)) => ips.iter().map(render_scalar).collect(),
                _ => match spec.and_then(|s| s.get("clusterIP")).and_then(Value::as_str) {
                    Some(ip) if !ip.is_empty() && ip != "None" => vec![ip.to_string()],
                    _ => Vec::new(),
                },
            };

            let mut external: Vec<String> = spec
                .and_then(|s| s.get("externalIPs"))
                .and_then(Value::as_array)
                .map(|ips| ips.iter().map(render_scalar).collect())
                .unwrap_or_default();
            if let Some(ingress) = obj
                .pointer("/status/loadBalancer/ingress")
                .and_then(Value::as_array)
            {
                for entry in ingress {
                    for key in ["ip", "hostname"] {
                        if let Some(v) = entry.get(key).and_then(Value::as_str) {
                            if !v.is_empty() {
                                external.push(v.to_string());
                            }
                        }
                    }
                }
            }

            format!(
                "service/{} ns={} type={} clusterIP={} external=[{}] ports=[{}] age={}",
                name,
                ns,
                str_at(obj, &["spec", "type"]),
                join_or_dash(&cluster_ips),
                join_or_dash(&external),
                ports,
                age
            )
        }
        _ => format!("{}/{} ns={} age={}", kind, name, ns, age),
    }
}

/// RFC 3339 timestamp, or `now` when it does not parse.
pub fn parse_timestamp(ts: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Two most significant units: `3d4h`, `2h5m`, `1m30s`, `42s`.
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = (now - created).num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn str_at<'a>(obj: &'a Value, path: &[&str]) -> &'a str {
    path.iter()
        .try_fold(obj, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn str_or_dash(obj: &Value, path: &[&str]) -> String {
    match path.iter().try_fold(obj, |v, key| v.get(key)) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

fn render_scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age_units() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s");
        assert_eq!(format_age(now - Duration::seconds(90), now), "1m30s");
        assert_eq!(format_age(now - Duration::minutes(125), now), "2h5m");
        assert_eq!(format_age(now - Duration::hours(76), now), "3d4h");
        assert_eq!(format_age(now + Duration::hours(1), now), "0s");
    }

    #[test]
    fn test_unparseable_timestamp_is_now() {
        let now = Utc::now();
        assert_eq!(parse_timestamp("yesterday", now), now);
    }
}

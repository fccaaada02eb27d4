//! Parameter validation.
//!
//! Runs before any command is synthesized. Commands are executed through a
//! shell as a single string, so these allowlists are the injection boundary.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::params::{parse_int, value_to_string, Params};

/// Characters that would let a value escape into a new shell command,
/// substitute one, redirect, or break out of a double-quoted word.
pub const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '\n', '\r', '$', '<', '>', '"'];

/// Namespace values that mean "every namespace".
pub const NAMESPACE_WILDCARDS: &[&str] = &["all", "*"];

/// Characters the host shell would glob, quote or split on in a bare word.
pub const BARE_WORD_METACHARACTERS: &[char] = &[
    '*', '?', '[', ']', '{', '}', '(', ')', '\'', '\\', '~', '#', '!', ' ', '\t',
];

/// Resource kinds the caller may name (singular, plural and short forms).
pub const ALLOWED_RESOURCE_TYPES: &[&str] = &[
    // core
    "pod", "pods", "deployment", "deployments", "service", "services", "svc",
    "endpoint", "endpoints", "endpointslice", "endpointslices",
    "node", "nodes", "event", "events", "namespace", "namespaces", "ns",
    // workloads
    "daemonset", "daemonsets", "statefulset", "statefulsets", "job", "jobs",
    "cronjob", "cronjobs",
    // config and storage
    "configmap", "configmaps", "cm", "secret", "secrets",
    "persistentvolumeclaim", "persistentvolumeclaims", "pvc",
    "persistentvolume", "persistentvolumes", "pv",
    // networking
    "ingress", "ingresses",
    // autoscaling
    "horizontalpodautoscaler", "hpa",
];

pub const ALLOWED_SERVICE_TYPES: &[&str] = &["ClusterIP", "NodePort", "LoadBalancer"];

/// Fields that must hold non-negative integers.
pub const INTEGER_FIELDS: &[&str] = &[
    "replicas",
    "min_replicas",
    "max_replicas",
    "port",
    "target_port",
    "container_port",
    "cpu_utilization",
    "memory_utilization",
    "grace_period",
    "revision",
    "burst_per_second",
];

/// Free-form fields that end up as bare shell words.
pub const NAME_FIELDS: &[&str] = &[
    "pod_name",
    "deployment_name",
    "configmap_name",
    "resource_name",
    "pvc_claim_name",
    "label_selector",
    "service_name",
    "container",
    "container_name",
    "context_name",
    "name",
    "image",
    "from_file",
    "volume_mount_path",
    "generator",
    "sort_by",
];

/// Name fields placed unquoted on the command line.
///
/// `label_selector` is double-quoted and `from_file` is single-quoted, so
/// neither is listed. `container_name` additionally accepts a lone `*`.
pub const BARE_WORD_FIELDS: &[&str] = &[
    "pod_name",
    "deployment_name",
    "configmap_name",
    "resource_name",
    "pvc_claim_name",
    "service_name",
    "container",
    "container_name",
    "context_name",
    "name",
    "image",
    "volume_mount_path",
    "generator",
    "sort_by",
];

pub const CPU_FIELDS: &[&str] = &["cpu_request", "cpu_limit"];
pub const MEMORY_FIELDS: &[&str] = &["memory_request", "memory_limit"];

static DNS_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

static CPU_QTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:\.\d+)?|\d+m)$").unwrap());

static MEM_QTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\.\d+)?(?:Ki|Mi|Gi|Ti|Pi|Ei|K|M|G|T|P|E)?$").unwrap()
});

static MEM_TYPO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+i$").unwrap());

/// Kubernetes DNS label: lowercase alphanumerics and hyphens, at most 63
/// characters, alphanumeric at both ends.
pub fn is_valid_k8s_name(name: &str) -> bool {
    name.len() <= 63 && DNS_LABEL_RE.is_match(name)
}

pub fn has_dangerous_chars(value: &str) -> bool {
    value.contains(SHELL_METACHARACTERS)
}

/// True when the host shell would not pass `value` through as one literal word.
pub fn has_bare_word_hazard(value: &str) -> bool {
    value.contains(BARE_WORD_METACHARACTERS)
}

/// `all` or `*`, in any case.
pub fn is_namespace_wildcard(ns: &str) -> bool {
    NAMESPACE_WILDCARDS.contains(&ns.to_lowercase().as_str())
}

pub fn is_valid_cpu_qty(value: &str) -> bool {
    CPU_QTY_RE.is_match(value)
}

pub fn is_valid_mem_qty(value: &str) -> bool {
    MEM_QTY_RE.is_match(value)
}

/// Suggest the likely intended quantity for the `4i` typo (`4Mi`).
pub fn suggest_mem_fix(value: &str) -> Option<String> {
    if MEM_TYPO_RE.is_match(value) {
        Some(format!("{}Mi", &value[..value.len() - 1]))
    } else {
        None
    }
}

/// Validate and normalize instruction parameters in place.
///
/// Integer fields are rewritten as JSON integers so builders see one shape.
pub fn validate_params(params: &mut Params) -> Result<(), ValidationError> {
    if let Some(ns) = params.get("namespace") {
        validate_namespace(ns)?;
    }

    if let Some(rt) = params.get("resource_type") {
        let raw = value_to_string(rt);
        if !ALLOWED_RESOURCE_TYPES.contains(&raw.to_lowercase().as_str()) {
            return Err(ValidationError::new(
                "resource_type",
                format!("Invalid resource_type: {}", raw),
            ));
        }
    }

    if let Some(st) = params.get("service_type") {
        let raw = value_to_string(st);
        if !ALLOWED_SERVICE_TYPES.contains(&raw.as_str()) {
            return Err(ValidationError::new(
                "service_type",
                format!("Invalid service_type: {}", raw),
            ));
        }
    }

    for key in INTEGER_FIELDS {
        let Some(value) = params.get(*key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let parsed = parse_int(value).ok_or_else(|| {
            ValidationError::new(*key, format!("Parameter '{}' must be an integer", key))
        })?;
        if parsed < 0 {
            return Err(ValidationError::new(
                *key,
                format!("Parameter '{}' must be >= 0", key),
            ));
        }
        params.insert((*key).to_string(), Value::from(parsed));
    }

    for key in NAME_FIELDS {
        if let Some(Value::String(s)) = params.get(*key) {
            let glob_allowed = *key == "container_name" && s == "*";
            let bare_word = BARE_WORD_FIELDS.contains(key) && !glob_allowed;
            if has_dangerous_chars(s) || (bare_word && has_bare_word_hazard(s)) {
                return Err(ValidationError::new(
                    *key,
                    format!("Invalid characters in {}", key),
                ));
            }
        }
    }

    for key in CPU_FIELDS {
        let Some(value) = params.get(*key).filter(|v| !v.is_null()) else {
            continue;
        };
        let raw = value_to_string(value);
        if !is_valid_cpu_qty(&raw) {
            return Err(ValidationError::new(
                *key,
                format!(
                    "Invalid {}: '{}'. CPU must be a number (cores, e.g., 0.5 or 1) or millicores with 'm' (e.g., 100m).",
                    key, raw
                ),
            ));
        }
    }

    for key in MEMORY_FIELDS {
        let Some(value) = params.get(*key).filter(|v| !v.is_null()) else {
            continue;
        };
        let raw = value_to_string(value);
        if is_valid_mem_qty(&raw) {
            continue;
        }
        let reason = match suggest_mem_fix(&raw) {
            Some(suggestion) => format!(
                "Invalid {}: '{}'. Did you mean '{}'?",
                key, raw, suggestion
            ),
            None => format!(
                "Invalid {}: '{}'. Memory must be a number optionally suffixed with Ki, Mi, Gi, Ti, Pi, Ei (or decimal K, M, G...). E.g., 128Mi, 1Gi.",
                key, raw
            ),
        };
        return Err(ValidationError::new(*key, reason));
    }

    Ok(())
}

fn validate_namespace(ns: &Value) -> Result<(), ValidationError> {
    let Value::String(ns) = ns else {
        return Err(ValidationError::new(
            "namespace",
            format!("Invalid namespace: {}", ns),
        ));
    };

    if !is_namespace_wildcard(ns) && !is_valid_k8s_name(ns) {
        return Err(ValidationError::new(
            "namespace",
            format!("Invalid namespace: {}", ns),
        ));
    }
    if has_dangerous_chars(ns) {
        return Err(ValidationError::new(
            "namespace",
            "Invalid characters in namespace",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_label_grammar() {
        assert!(is_valid_k8s_name("default"));
        assert!(is_valid_k8s_name("kube-system"));
        assert!(is_valid_k8s_name("a1"));
        assert!(!is_valid_k8s_name("-leading"));
        assert!(!is_valid_k8s_name("trailing-"));
        assert!(!is_valid_k8s_name("Upper"));
        assert!(!is_valid_k8s_name(""));
        assert!(!is_valid_k8s_name(&"a".repeat(64)));
        assert!(is_valid_k8s_name(&"a".repeat(63)));
    }

    #[test]
    fn test_suggest_mem_fix() {
        assert_eq!(suggest_mem_fix("4i"), Some("4Mi".to_string()));
        assert_eq!(suggest_mem_fix("512i"), Some("512Mi".to_string()));
        assert_eq!(suggest_mem_fix("4Mi"), None);
        assert_eq!(suggest_mem_fix("abc"), None);
    }

    #[test]
    fn test_bare_word_hazards() {
        assert!(has_bare_word_hazard("*"));
        assert!(has_bare_word_hazard("web-?"));
        assert!(has_bare_word_hazard("[ab]"));
        assert!(has_bare_word_hazard("it's"));
        assert!(has_bare_word_hazard("two words"));
        assert!(!has_bare_word_hazard("web-1"));
        assert!(!has_bare_word_hazard("nginx:1.25"));
        assert!(!has_bare_word_hazard("registry.k8s.io/pause@sha256:abc"));
    }

    #[test]
    fn test_namespace_wildcards() {
        assert!(is_namespace_wildcard("*"));
        assert!(is_namespace_wildcard("all"));
        assert!(is_namespace_wildcard("ALL"));
        assert!(!is_namespace_wildcard("default"));
    }

    #[test]
    fn test_quantities() {
        assert!(is_valid_cpu_qty("100m"));
        assert!(is_valid_cpu_qty("0.5"));
        assert!(is_valid_cpu_qty("2"));
        assert!(!is_valid_cpu_qty("0.5m"));
        assert!(!is_valid_cpu_qty("fast"));
        assert!(is_valid_mem_qty("128Mi"));
        assert!(is_valid_mem_qty("1G"));
        assert!(is_valid_mem_qty("1.5Gi"));
        assert!(is_valid_mem_qty("1024"));
        assert!(!is_valid_mem_qty("4i"));
        assert!(!is_valid_mem_qty("Mi"));
    }
}

//! Static instruction catalog.
//!
//! Every instruction the gateway accepts is registered here with its
//! argument schema, its command builder, and its mutating flag. The same
//! table drives `/instructions`, the reasoning tool list, and execution.
//!
//! Builders are pure: they turn resolved arguments into one shell command
//! line and never touch the cluster.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::CatalogError;
use crate::params::{parse_int, Params};
use crate::validate::is_namespace_wildcard;

/// Prefix of every command that carries an encoded script payload.
pub const ENCODED_SCRIPT_PREFIX: &str = "echo ";
/// Suffix that decodes and runs an encoded script payload.
pub const ENCODED_SCRIPT_SUFFIX: &str = " | base64 -d | sh";
/// What callers see instead of an encoded payload.
pub const ENCODED_DISPLAY: &str = "[encoded script: kubectl apply -f - (YAML embedded)]";

const DNS_IMAGE: &str = "registry.k8s.io/e2e-test-images/jessie-dnsutils:1.3";
const DEFAULT_LOAD_URL: &str = "http://php-apache.default.svc.cluster.local/?load=2000";

/// Default for one argument of an instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgDefault {
    Required,
    Str(&'static str),
    Int(i64),
    Bool(bool),
    /// Optional key/value object, absent by default.
    Map,
}

impl ArgDefault {
    /// How the default is advertised in the instruction listing.
    pub fn advertised(&self) -> Value {
        match self {
            ArgDefault::Required => Value::from("REQUIRED"),
            ArgDefault::Str(s) => Value::from(*s),
            ArgDefault::Int(n) => Value::from(*n),
            ArgDefault::Bool(b) => Value::from(*b),
            ArgDefault::Map => Value::from("None"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Arg {
    pub name: &'static str,
    pub default: ArgDefault,
}

const fn req(name: &'static str) -> Arg {
    Arg { name, default: ArgDefault::Required }
}

const fn text(name: &'static str, value: &'static str) -> Arg {
    Arg { name, default: ArgDefault::Str(value) }
}

const fn int(name: &'static str, value: i64) -> Arg {
    Arg { name, default: ArgDefault::Int(value) }
}

const fn boolean(name: &'static str, value: bool) -> Arg {
    Arg { name, default: ArgDefault::Bool(value) }
}

const fn map(name: &'static str) -> Arg {
    Arg { name, default: ArgDefault::Map }
}

const NS: Arg = text("namespace", "default");

type Builder = fn(&Args) -> Result<String, String>;

/// One registered instruction.
pub struct Instruction {
    pub name: &'static str,
    pub doc: &'static str,
    pub args: &'static [Arg],
    /// Explicit mutating verdict. Authoritative when present.
    pub mutating: Option<bool>,
    build: Builder,
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instruction")
            .field("name", &self.name)
            .field("mutating", &self.mutating)
            .finish()
    }
}

impl Instruction {
    /// Names of arguments the caller must supply.
    pub fn required_args(&self) -> Vec<&'static str> {
        self.args
            .iter()
            .filter(|a| a.default == ArgDefault::Required)
            .map(|a| a.name)
            .collect()
    }

    /// `{arg: "REQUIRED" | default}` as advertised to callers.
    pub fn advertised_args(&self) -> Map<String, Value> {
        self.args
            .iter()
            .map(|a| (a.name.to_string(), a.default.advertised()))
            .collect()
    }

    /// Resolve arguments against the schema and run the builder.
    pub fn synthesize(&self, params: &Params) -> Result<SynthesizedCommand, CatalogError> {
        let args = Args::resolve(self, params)?;
        let command = (self.build)(&args).map_err(|reason| {
            CatalogError::InvalidParameters(format!("{}: {}", self.name, reason))
        })?;
        Ok(SynthesizedCommand::new(command))
    }
}

/// A built command and the form shown to humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedCommand {
    pub command: String,
    pub display_command: String,
}

impl SynthesizedCommand {
    pub fn new(command: String) -> Self {
        let display_command = display_command(&command);
        Self {
            command,
            display_command,
        }
    }

    pub fn is_encoded(&self) -> bool {
        is_encoded_script(&self.command)
    }
}

pub fn is_encoded_script(command: &str) -> bool {
    command.starts_with(ENCODED_SCRIPT_PREFIX) && command.ends_with(ENCODED_SCRIPT_SUFFIX)
}

pub fn display_command(command: &str) -> String {
    if is_encoded_script(command) {
        ENCODED_DISPLAY.to_string()
    } else {
        command.to_string()
    }
}

/// Wrap a multi-line script so the outer shell only ever sees base64.
pub fn encode_script(script: &str) -> String {
    format!(
        "{}{}{}",
        ENCODED_SCRIPT_PREFIX,
        BASE64.encode(script.as_bytes()),
        ENCODED_SCRIPT_SUFFIX
    )
}

/// Recover the script from an encoded command, if it is one.
pub fn decode_script(command: &str) -> Option<String> {
    if !is_encoded_script(command) {
        return None;
    }
    let payload = &command[ENCODED_SCRIPT_PREFIX.len()..command.len() - ENCODED_SCRIPT_SUFFIX.len()];
    let bytes = BASE64.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
}

/// Quote a value for a POSIX shell as a single word.
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ============================================================================
// Argument resolution
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Map(Option<Map<String, Value>>),
}

/// Arguments after defaults and type checks.
pub struct Args {
    values: BTreeMap<&'static str, ArgValue>,
}

impl Args {
    fn resolve(instruction: &Instruction, params: &Params) -> Result<Self, CatalogError> {
        let invalid = |reason: String| {
            CatalogError::InvalidParameters(format!("{}: {}", instruction.name, reason))
        };

        if let Some(unknown) = params
            .keys()
            .find(|k| !instruction.args.iter().any(|a| a.name == k.as_str()))
        {
            return Err(invalid(format!("unexpected argument '{}'", unknown)));
        }

        let mut values = BTreeMap::new();
        for arg in instruction.args {
            let supplied = params.get(arg.name).filter(|v| !v.is_null());
            let value = match (arg.default, supplied) {
                (ArgDefault::Required, None) => {
                    return Err(invalid(format!("missing required argument '{}'", arg.name)));
                }
                (ArgDefault::Required, Some(v)) | (ArgDefault::Str(_), Some(v)) => {
                    ArgValue::Str(scalar_text(v).ok_or_else(|| {
                        invalid(format!("argument '{}' must be a string", arg.name))
                    })?)
                }
                (ArgDefault::Str(d), None) => ArgValue::Str(d.to_string()),
                (ArgDefault::Int(_), Some(v)) => ArgValue::Int(parse_int(v).ok_or_else(|| {
                    invalid(format!("argument '{}' must be an integer", arg.name))
                })?),
                (ArgDefault::Int(d), None) => ArgValue::Int(d),
                (ArgDefault::Bool(_), Some(v)) => ArgValue::Bool(strict_bool(v).ok_or_else(|| {
                    invalid(format!("argument '{}' must be a boolean", arg.name))
                })?),
                (ArgDefault::Bool(d), None) => ArgValue::Bool(d),
                (ArgDefault::Map, Some(v)) => ArgValue::Map(Some(object(v).ok_or_else(|| {
                    invalid(format!("argument '{}' must be an object", arg.name))
                })?)),
                (ArgDefault::Map, None) => ArgValue::Map(None),
            };
            values.insert(arg.name, value);
        }
        Ok(Self { values })
    }

    fn s(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => s,
            _ => "",
        }
    }

    fn i(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(ArgValue::Int(n)) => *n,
            _ => 0,
        }
    }

    fn b(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::Bool(true)))
    }

    /// `-A` for a wildcard namespace, `-n <ns>` otherwise.
    fn scope(&self) -> String {
        let ns = self.s("namespace");
        if is_namespace_wildcard(ns) {
            "-A".to_string()
        } else {
            format!("-n {}", ns)
        }
    }

    /// The namespace of an instruction that targets one namespace.
    fn ns(&self) -> Result<&str, String> {
        let ns = self.s("namespace");
        if is_namespace_wildcard(ns) {
            return Err(format!(
                "namespace '{}' selects every namespace; this instruction needs a single namespace",
                ns
            ));
        }
        Ok(ns)
    }

    fn m(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.values.get(name) {
            Some(ArgValue::Map(Some(m))) => Some(m),
            _ => None,
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn strict_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Objects arrive either as JSON objects or, from the reasoning engine, as
/// JSON text. An empty string means "not given".
fn object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(m) => Some(m.clone()),
        Value::String(s) if s.trim().is_empty() => Some(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s).ok()? {
            Value::Object(m) => Some(m),
            _ => None,
        },
        _ => None,
    }
}

/// Join non-empty command fragments with single spaces.
fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(label_selector: &str) -> String {
    if label_selector.is_empty() {
        String::new()
    } else {
        format!("-l \"{}\"", label_selector)
    }
}

fn with_output(cmd: String, structured: bool) -> String {
    if structured {
        format!("{} -o json", cmd)
    } else {
        cmd
    }
}

/// Values placed inside double quotes on the host shell.
fn check_quotable(name: &str, value: &str) -> Result<(), String> {
    if value.contains(['"', '$', '\\', '`']) {
        return Err(format!("{} must not contain quotes, '$', '\\' or backticks", name));
    }
    Ok(())
}

fn replace_prefix(replace: bool, pod: &str, ns: &str, run: String) -> String {
    if replace {
        format!("kubectl delete pod {} -n {} --ignore-not-found; {}", pod, ns, run)
    } else {
        run
    }
}

// ============================================================================
// Builders: generic resources
// ============================================================================

fn build_get_resources(a: &Args) -> Result<String, String> {
    let rt = a.s("resource_type");
    let name = a.s("resource_name");
    let sel = if name.is_empty() {
        selector(a.s("label_selector"))
    } else {
        String::new()
    };
    let cmd = if a.b("all_namespaces") {
        join(&[&format!("kubectl get {} -A", rt), &sel])
    } else if !name.is_empty() {
        format!("kubectl get {} {} -n {}", rt, name, a.ns()?)
    } else {
        join(&[&format!("kubectl get {}", rt), &a.scope(), &sel])
    };
    Ok(with_output(cmd, a.b("structured_output")))
}

fn build_describe_resource(a: &Args) -> Result<String, String> {
    let (rt, name, ns) = (a.s("resource_type"), a.s("resource_name"), a.ns()?);
    Ok(if a.b("structured_output") {
        format!("kubectl get {} {} -n {} -o json", rt, name, ns)
    } else if a.b("full_yaml") {
        format!("kubectl get {} {} -n {} -o yaml", rt, name, ns)
    } else {
        format!("kubectl describe {} {} -n {}", rt, name, ns)
    })
}

fn build_get_events(a: &Args) -> Result<String, String> {
    let scope = a.scope();
    let watch = if a.b("watch") { "-w" } else { "" };
    let sort = if a.b("sort_by_time") {
        "--sort-by='.lastTimestamp'"
    } else {
        ""
    };
    Ok(join(&["kubectl get events", &scope, watch, sort]))
}

// ============================================================================
// Builders: pods
// ============================================================================

fn build_get_pod_logs(a: &Args) -> Result<String, String> {
    let pod = a.s("pod_name");
    let all_containers = a.b("all_containers");
    let container = if !a.s("container").is_empty() && !all_containers {
        format!("-c {}", a.s("container"))
    } else {
        String::new()
    };
    let sel = if pod.is_empty() {
        selector(a.s("label_selector"))
    } else {
        String::new()
    };
    let base = format!("kubectl logs -n {}", a.ns()?);
    let flags = [
        container.as_str(),
        if all_containers { "--all-containers" } else { "" },
        if a.b("previous") { "-p" } else { "" },
        if a.b("follow") { "-f" } else { "" },
        sel.as_str(),
    ];

    if !sel.is_empty() {
        let mut parts = vec![base.as_str()];
        parts.extend_from_slice(&flags);
        return Ok(join(&parts));
    }
    if pod.is_empty() {
        return Err("Provide 'pod_name' or 'label_selector' to select target pods for logs".into());
    }
    let mut parts = vec![base.as_str(), pod];
    parts.extend_from_slice(&flags);
    Ok(join(&parts))
}

fn build_get_pod_usage(a: &Args) -> Result<String, String> {
    let rt = a.s("resource_type");
    let name = a.s("resource_name");
    let ns = a.s("namespace");
    let mut cmd = format!("kubectl top {}", rt);
    if !name.is_empty() {
        cmd.push_str(&format!(" {}", name));
    }
    if a.b("all_namespaces") {
        cmd.push_str(" -A");
    } else if !ns.is_empty() && name.is_empty() {
        cmd.push_str(&format!(" {}", a.scope()));
    }
    let sort_by = a.s("sort_by");
    if !sort_by.is_empty() {
        if !matches!(sort_by, "cpu" | "memory") {
            return Err(format!("sort_by must be 'cpu' or 'memory', got '{}'", sort_by));
        }
        if rt == "pods" {
            cmd.push_str(&format!(" --sort-by='.{}'", sort_by));
        } else {
            cmd.push_str(&format!(" --sort-by={}", sort_by));
        }
    }
    Ok(cmd)
}

fn build_delete_pod(a: &Args) -> Result<String, String> {
    let grace = format!("--grace-period={}", a.i("grace_period"));
    Ok(join(&[
        "kubectl delete pod",
        a.s("pod_name"),
        &format!("-n {}", a.ns()?),
        if a.b("ignore_not_found") { "--ignore-not-found" } else { "" },
        &grace,
        if a.b("wait") { "" } else { "--wait=false" },
        if a.b("force") { "--force" } else { "" },
    ]))
}

fn build_delete_completed_pods(a: &Args) -> Result<String, String> {
    Ok(join(&[
        "kubectl delete pod",
        &a.scope(),
        &selector(a.s("label_selector")),
        "--field-selector=status.phase=Succeeded",
        if a.b("ignore_not_found") { "--ignore-not-found" } else { "" },
        if a.b("wait") { "" } else { "--wait=false" },
    ]))
}

fn build_dns_lookup(a: &Args) -> Result<String, String> {
    let (pod, ns) = (a.s("pod_name"), a.ns()?);
    let run = format!(
        "kubectl run {} -n {} --image={} --restart=Never -- nslookup {}",
        pod,
        ns,
        DNS_IMAGE,
        a.s("name")
    );
    Ok(replace_prefix(a.b("replace_existing"), pod, ns, run))
}

fn build_curl_test(a: &Args) -> Result<String, String> {
    let (pod, ns, url) = (a.s("pod_name"), a.ns()?, a.s("url"));
    check_quotable("url", url)?;
    let run = format!(
        "kubectl run {} -n {} --image=curlimages/curl --restart=Never -- \
         sh -c \"if curl -s -o /dev/null -f {}; then echo OK; else echo FAIL; fi\"",
        pod, ns, url
    );
    Ok(replace_prefix(a.b("replace_existing"), pod, ns, run))
}

// ============================================================================
// Builders: deployments
// ============================================================================

fn deployment_manifest(a: &Args) -> String {
    let name = a.s("deployment_name");
    let mut yaml = String::new();
    let mut line = |indent: usize, text: &str| {
        yaml.push_str(&" ".repeat(indent));
        yaml.push_str(text);
        yaml.push('\n');
    };
    line(0, "apiVersion: apps/v1");
    line(0, "kind: Deployment");
    line(0, "metadata:");
    line(2, &format!("name: {}", name));
    line(2, &format!("namespace: {}", a.s("namespace")));
    line(2, "labels:");
    line(4, &format!("app: {}", name));
    line(0, "spec:");
    line(2, &format!("replicas: {}", a.i("replicas")));
    line(2, "selector:");
    line(4, "matchLabels:");
    line(6, &format!("app: {}", name));
    line(2, "template:");
    line(4, "metadata:");
    line(6, "labels:");
    line(8, &format!("app: {}", name));
    line(4, "spec:");
    line(6, "containers:");
    line(6, &format!("- name: {}", name));
    line(8, &format!("image: {}", a.s("image")));
    line(8, "ports:");
    line(8, &format!("- containerPort: {}", a.i("container_port")));
    line(8, "resources:");
    line(10, "requests:");
    line(12, &format!("cpu: \"{}\"", a.s("cpu_request")));
    line(12, &format!("memory: \"{}\"", a.s("memory_request")));
    line(10, "limits:");
    line(12, &format!("cpu: \"{}\"", a.s("cpu_limit")));
    line(12, &format!("memory: \"{}\"", a.s("memory_limit")));

    let (claim, mount) = (a.s("pvc_claim_name"), a.s("volume_mount_path"));
    if !claim.is_empty() && !mount.is_empty() {
        line(8, "volumeMounts:");
        line(8, "- name: app-storage");
        line(10, &format!("mountPath: {}", mount));
        line(6, "volumes:");
        line(6, "- name: app-storage");
        line(8, "persistentVolumeClaim:");
        line(10, &format!("claimName: {}", claim));
    }
    yaml
}

fn build_create_deployment_apply(a: &Args) -> Result<String, String> {
    a.ns()?;
    let (claim, mount) = (a.s("pvc_claim_name"), a.s("volume_mount_path"));
    if claim.is_empty() != mount.is_empty() {
        return Err("'pvc_claim_name' and 'volume_mount_path' must be given together".into());
    }
    let script = format!(
        "kubectl apply --wait=false -f - <<'KUBEGATE_YAML'\n{}KUBEGATE_YAML\n",
        deployment_manifest(a)
    );
    Ok(encode_script(&script))
}

fn build_delete_deployment_and_related(a: &Args) -> Result<String, String> {
    let (name, ns) = (a.s("deployment_name"), a.ns()?);
    Ok(if a.b("cleanup_related") {
        format!("kubectl delete deployment,svc,hpa {} -n {} --ignore-not-found", name, ns)
    } else {
        format!("kubectl delete deployment {} -n {}", name, ns)
    })
}

fn build_scale_deployment(a: &Args) -> Result<String, String> {
    // force_manual_scale is advisory only; the command is the same either way.
    Ok(format!(
        "kubectl scale deployment/{} -n {} --replicas={}",
        a.s("deployment_name"),
        a.ns()?,
        a.i("replicas")
    ))
}

fn build_set_deployment_resources(a: &Args) -> Result<String, String> {
    let pairs = |cpu: &str, mem: &str| {
        let mut out = Vec::new();
        if !cpu.is_empty() {
            out.push(format!("cpu={}", cpu));
        }
        if !mem.is_empty() {
            out.push(format!("memory={}", mem));
        }
        out.join(",")
    };
    let requests = pairs(a.s("cpu_request"), a.s("memory_request"));
    let limits = pairs(a.s("cpu_limit"), a.s("memory_limit"));
    if requests.is_empty() && limits.is_empty() {
        return Err("at least one of cpu/memory request/limit is required".into());
    }
    let requests = if requests.is_empty() {
        String::new()
    } else {
        format!("--requests={}", requests)
    };
    let limits = if limits.is_empty() {
        String::new()
    } else {
        format!("--limits={}", limits)
    };
    let container = a.s("container_name");
    // A bare `*` would glob on the host shell.
    let container = if container == "*" {
        "-c '*'".to_string()
    } else {
        format!("-c {}", container)
    };
    Ok(join(&[
        &format!("kubectl set resources deployment/{}", a.s("deployment_name")),
        &format!("-n {}", a.ns()?),
        &container,
        &requests,
        &limits,
    ]))
}

fn build_get_rollout_history(a: &Args) -> Result<String, String> {
    let (name, ns) = (a.s("deployment_name"), a.ns()?);
    Ok(if a.b("watch_status") {
        format!("kubectl rollout status deployment/{} -n {} -w", name, ns)
    } else {
        format!("kubectl rollout history deployment/{} -n {}", name, ns)
    })
}

fn build_undo_rollout(a: &Args) -> Result<String, String> {
    let revision = a.i("revision");
    let to = if revision > 0 {
        format!("--to-revision={}", revision)
    } else {
        String::new()
    };
    Ok(join(&[
        &format!(
            "kubectl rollout undo deployment/{} -n {}",
            a.s("deployment_name"),
            a.ns()?
        ),
        &to,
    ]))
}

// ============================================================================
// Builders: services and autoscaling
// ============================================================================

fn build_expose_deployment(a: &Args) -> Result<String, String> {
    let service_type = a.s("service_type");
    if !crate::validate::ALLOWED_SERVICE_TYPES.contains(&service_type) {
        return Err(format!(
            "Invalid service_type '{}'. Must be one of: {}",
            service_type,
            crate::validate::ALLOWED_SERVICE_TYPES.join(", ")
        ));
    }
    Ok(format!(
        "kubectl expose deployment/{} -n {} --port={} --target-port={} --type={}",
        a.s("deployment_name"),
        a.ns()?,
        a.i("port"),
        a.i("target_port"),
        service_type
    ))
}

fn build_get_service_endpoints(a: &Args) -> Result<String, String> {
    let cmd = format!(
        "kubectl get endpoints {} -n {}",
        a.s("service_name"),
        a.ns()?
    );
    Ok(if a.b("structured_output") {
        format!("{} -o json", cmd)
    } else {
        format!("{} -o wide", cmd)
    })
}

fn build_create_hpa(a: &Args) -> Result<String, String> {
    let (cpu, memory) = (a.i("cpu_utilization"), a.i("memory_utilization"));
    if cpu > 0 && memory > 0 {
        return Err(
            "kubectl autoscale only supports one metric target. Please choose CPU or Memory."
                .into(),
        );
    }
    let metric = if memory > 0 {
        format!("--memory-percent={}", memory)
    } else {
        format!("--cpu-percent={}", cpu)
    };
    Ok(format!(
        "kubectl autoscale deployment/{} -n {} --min={} --max={} {}",
        a.s("deployment_name"),
        a.ns()?,
        a.i("min_replicas"),
        a.i("max_replicas"),
        metric
    ))
}

const HPA_READINESS_SCRIPT: &str = r#"ns='__NS__'
if kubectl top nodes >/dev/null 2>&1; then metrics=true; else metrics=false; fi
deploys=$(kubectl get deploy -n "$ns" -o jsonpath='{range .items[*]}{.metadata.name}{"="}{.spec.template.spec.containers[*].resources.requests.cpu}{"\n"}{end}' 2>/dev/null)
with=0
without=0
items=""
while IFS='=' read -r name cpu; do
  [ -z "$name" ] && continue
  if [ -n "$cpu" ]; then has=true; with=$((with+1)); else has=false; without=$((without+1)); fi
  [ -n "$items" ] && items="$items,"
  items="$items{\"name\":\"$name\",\"hasCpuRequests\":$has}"
done <<KUBEGATE_EOF
$deploys
KUBEGATE_EOF
printf '{"namespace":"%s","metricsServer":%s,"deploymentsWithCpuRequests":%d,"deploymentsMissingCpuRequests":%d,"deployments":[%s]}\n' "$ns" "$metrics" "$with" "$without" "$items"
"#;

fn build_check_hpa_readiness(a: &Args) -> Result<String, String> {
    Ok(encode_script(
        &HPA_READINESS_SCRIPT.replace("__NS__", a.ns()?),
    ))
}

// ============================================================================
// Builders: configmaps and contexts
// ============================================================================

fn build_create_configmap(a: &Args) -> Result<String, String> {
    let (name, ns) = (a.s("configmap_name"), a.ns()?);
    let from_file = a.s("from_file");
    let base = if !from_file.is_empty() {
        format!(
            "kubectl create configmap {} -n {} --from-file={}",
            name,
            ns,
            sh_quote(from_file)
        )
    } else {
        match a.m("data").filter(|d| !d.is_empty()) {
            Some(data) => {
                let literals = data
                    .iter()
                    .map(|(k, v)| {
                        let v = crate::params::value_to_string(v);
                        format!("--from-literal={}", sh_quote(&format!("{}={}", k, v)))
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("kubectl create configmap {} -n {} {}", name, ns, literals)
            }
            None => {
                return Err(format!(
                    "Must provide 'data' (dict) or 'from_file' (str) to create/update configmap {}",
                    name
                ))
            }
        }
    };
    Ok(encode_script(&format!(
        "{} --dry-run=client -o yaml | kubectl apply -f -\n",
        base
    )))
}

fn build_delete_configmap(a: &Args) -> Result<String, String> {
    Ok(format!(
        "kubectl delete configmap {} -n {} --ignore-not-found",
        a.s("configmap_name"),
        a.ns()?
    ))
}

fn build_list_contexts(_: &Args) -> Result<String, String> {
    Ok("kubectl config get-contexts".into())
}

fn build_get_current_context(_: &Args) -> Result<String, String> {
    Ok("kubectl config current-context".into())
}

fn build_use_context(a: &Args) -> Result<String, String> {
    Ok(format!("kubectl config use-context {}", a.s("context_name")))
}

fn build_list_namespaces(_: &Args) -> Result<String, String> {
    Ok("kubectl get ns".into())
}

// ============================================================================
// Builders: load generation
// ============================================================================

fn generator_image(generator: &str) -> Result<bool, String> {
    match generator.to_lowercase().as_str() {
        "" | "curl" => Ok(false),
        "busybox" => Ok(true),
        other => Err(format!("generator must be 'curl' or 'busybox', got '{}'", other)),
    }
}

fn build_start_http_load(a: &Args) -> Result<String, String> {
    let (pod, ns, url) = (a.s("pod_name"), a.ns()?, a.s("url"));
    check_quotable("url", url)?;
    Ok(if generator_image(a.s("generator"))? {
        format!(
            "kubectl run {} -n {} --image=busybox --restart=Never -- \
             /bin/sh -c \"while true; do wget -q -O- {} > /dev/null; done\"",
            pod, ns, url
        )
    } else {
        format!(
            "kubectl run {} -n {} --image=curlimages/curl --restart=Never -- \
             sh -c \"while true; do curl -s {} > /dev/null; done\"",
            pod, ns, url
        )
    })
}

fn build_start_http_load_stats(a: &Args) -> Result<String, String> {
    let (pod, ns, url) = (a.s("pod_name"), a.ns()?, a.s("url"));
    check_quotable("url", url)?;
    let burst = a.i("burst_per_second").max(1);
    // `$` is escaped so the loop runs in the pod, not on the host.
    Ok(if generator_image(a.s("generator"))? {
        format!(
            "kubectl run {} -n {} --image=busybox --restart=Never -- \
             /bin/sh -c \"while true; do c=0; i=0; while [ \\$i -lt {} ]; do wget -q -O- {} > /dev/null && c=\\$((c+1)); i=\\$((i+1)); done; echo \\$(date) hits/s=\\$c; done\"",
            pod, ns, burst, url
        )
    } else {
        format!(
            "kubectl run {} -n {} --image=curlimages/curl --restart=Never -- \
             sh -c \"while true; do c=0; i=0; while [ \\$i -lt {} ]; do curl -s -o /dev/null {} && c=\\$((c+1)); i=\\$((i+1)); done; echo \\$(date) hits/s=\\$c; done\"",
            pod, ns, burst, url
        )
    })
}

fn build_delete_named_pod(a: &Args) -> Result<String, String> {
    Ok(format!(
        "kubectl delete pod {} -n {} --ignore-not-found",
        a.s("pod_name"),
        a.ns()?
    ))
}

// ============================================================================
// Registration table
// ============================================================================

pub static CATALOG: &[Instruction] = &[
    Instruction {
        name: "get_resources",
        doc: "Get one or more resources of a type, optionally by name, label selector, or across all namespaces. structured_output returns JSON with a summary.",
        args: &[
            req("resource_type"),
            text("resource_name", ""),
            NS,
            boolean("all_namespaces", false),
            boolean("structured_output", false),
            text("label_selector", ""),
        ],
        mutating: Some(false),
        build: build_get_resources,
    },
    Instruction {
        name: "describe_resource",
        doc: "Describe a single resource. full_yaml returns the full definition as YAML; structured_output returns JSON.",
        args: &[
            req("resource_type"),
            req("resource_name"),
            NS,
            boolean("full_yaml", false),
            boolean("structured_output", false),
        ],
        mutating: Some(false),
        build: build_describe_resource,
    },
    Instruction {
        name: "get_events",
        doc: "List cluster events in a namespace ('all' for every namespace), sorted by time. watch streams new events.",
        args: &[NS, boolean("watch", false), boolean("sort_by_time", true)],
        mutating: Some(false),
        build: build_get_events,
    },
    Instruction {
        name: "get_pod_logs",
        doc: "Fetch logs for a pod, or for pods matching label_selector. previous reads the last terminated container; follow streams.",
        args: &[
            text("pod_name", ""),
            NS,
            text("container", ""),
            boolean("previous", false),
            boolean("follow", false),
            text("label_selector", ""),
            boolean("all_containers", false),
        ],
        mutating: Some(false),
        build: build_get_pod_logs,
    },
    Instruction {
        name: "get_pod_usage",
        doc: "Current CPU and memory usage for pods or nodes (needs metrics-server). sort_by is 'cpu' or 'memory'.",
        args: &[
            text("resource_type", "pods"),
            text("resource_name", ""),
            NS,
            boolean("all_namespaces", false),
            text("sort_by", ""),
        ],
        mutating: Some(false),
        build: build_get_pod_usage,
    },
    Instruction {
        name: "delete_pod",
        doc: "Delete one pod by name. Meant for short-lived diagnostic pods.",
        args: &[
            req("pod_name"),
            NS,
            boolean("ignore_not_found", true),
            boolean("wait", false),
            boolean("force", false),
            int("grace_period", 0),
        ],
        mutating: Some(true),
        build: build_delete_pod,
    },
    Instruction {
        name: "delete_completed_pods",
        doc: "Delete pods in phase Succeeded, optionally narrowed by label selector. namespace 'all' covers every namespace.",
        args: &[
            NS,
            text("label_selector", ""),
            boolean("ignore_not_found", true),
            boolean("wait", false),
        ],
        mutating: Some(true),
        build: build_delete_completed_pods,
    },
    Instruction {
        name: "dns_lookup",
        doc: "Resolve a DNS name from inside the cluster with a one-shot dnsutils pod. Read the result with get_pod_logs.",
        args: &[
            req("name"),
            NS,
            text("pod_name", "dnscheck"),
            boolean("replace_existing", false),
        ],
        mutating: Some(true),
        build: build_dns_lookup,
    },
    Instruction {
        name: "curl_test",
        doc: "One-shot in-cluster HTTP reachability test. The pod logs OK on 2xx, FAIL otherwise.",
        args: &[
            req("url"),
            NS,
            text("pod_name", "curltest"),
            boolean("replace_existing", false),
        ],
        mutating: Some(true),
        build: build_curl_test,
    },
    Instruction {
        name: "create_deployment_apply",
        doc: "Create or update a Deployment for any image via kubectl apply, with resource requests and limits and an optional PVC mount.",
        args: &[
            req("deployment_name"),
            req("image"),
            int("replicas", 1),
            NS,
            int("container_port", 80),
            text("cpu_request", "100m"),
            text("memory_request", "128Mi"),
            text("cpu_limit", "500m"),
            text("memory_limit", "512Mi"),
            text("volume_mount_path", ""),
            text("pvc_claim_name", ""),
        ],
        mutating: Some(true),
        build: build_create_deployment_apply,
    },
    Instruction {
        name: "delete_deployment_and_related",
        doc: "Delete a Deployment. cleanup_related also removes the Service and HPA of the same name.",
        args: &[req("deployment_name"), NS, boolean("cleanup_related", false)],
        mutating: Some(true),
        build: build_delete_deployment_and_related,
    },
    Instruction {
        name: "scale_deployment",
        doc: "Scale a Deployment to a replica count. An active HPA will override manual scaling.",
        args: &[
            req("deployment_name"),
            NS,
            int("replicas", 1),
            boolean("force_manual_scale", false),
        ],
        mutating: Some(true),
        build: build_scale_deployment,
    },
    Instruction {
        name: "set_deployment_resources",
        doc: "Set CPU and memory requests or limits on a Deployment's containers ('*' for all).",
        args: &[
            req("deployment_name"),
            NS,
            text("container_name", "*"),
            text("cpu_request", ""),
            text("memory_request", ""),
            text("cpu_limit", ""),
            text("memory_limit", ""),
        ],
        mutating: Some(true),
        build: build_set_deployment_resources,
    },
    Instruction {
        name: "get_rollout_history",
        doc: "Show a Deployment's rollout history, or watch the current rollout with watch_status.",
        args: &[req("deployment_name"), NS, boolean("watch_status", false)],
        mutating: Some(false),
        build: build_get_rollout_history,
    },
    Instruction {
        name: "undo_rollout",
        doc: "Roll a Deployment back to a revision (0 means the previous one).",
        args: &[req("deployment_name"), NS, int("revision", 0)],
        mutating: Some(true),
        build: build_undo_rollout,
    },
    Instruction {
        name: "expose_deployment",
        doc: "Create a Service for a Deployment. service_type is ClusterIP, NodePort or LoadBalancer.",
        args: &[
            req("deployment_name"),
            NS,
            int("port", 80),
            int("target_port", 80),
            text("service_type", "ClusterIP"),
        ],
        mutating: Some(true),
        build: build_expose_deployment,
    },
    Instruction {
        name: "get_service_endpoints",
        doc: "Show the Endpoints behind a Service to check traffic reaches ready pods.",
        args: &[req("service_name"), NS, boolean("structured_output", false)],
        mutating: Some(false),
        build: build_get_service_endpoints,
    },
    Instruction {
        name: "create_hpa",
        doc: "Create a HorizontalPodAutoscaler targeting CPU or memory utilization (not both). The Deployment needs resource requests.",
        args: &[
            req("deployment_name"),
            NS,
            int("min_replicas", 1),
            int("max_replicas", 10),
            int("cpu_utilization", 80),
            int("memory_utilization", 0),
        ],
        mutating: Some(true),
        build: build_create_hpa,
    },
    Instruction {
        name: "check_hpa_readiness",
        doc: "Report whether the metrics API is up and which Deployments in a namespace have CPU requests, as JSON.",
        args: &[NS],
        mutating: Some(false),
        build: build_check_hpa_readiness,
    },
    Instruction {
        name: "create_configmap",
        doc: "Create or update a ConfigMap from key/value data or from a file path.",
        args: &[req("configmap_name"), NS, map("data"), text("from_file", "")],
        mutating: Some(true),
        build: build_create_configmap,
    },
    Instruction {
        name: "delete_configmap",
        doc: "Delete a ConfigMap by name. Missing ConfigMaps are ignored.",
        args: &[req("configmap_name"), NS],
        mutating: Some(true),
        build: build_delete_configmap,
    },
    Instruction {
        name: "list_contexts",
        doc: "List kubeconfig contexts.",
        args: &[],
        mutating: Some(false),
        build: build_list_contexts,
    },
    Instruction {
        name: "get_current_context",
        doc: "Show the current kubeconfig context.",
        args: &[],
        mutating: Some(false),
        build: build_get_current_context,
    },
    Instruction {
        name: "use_context",
        doc: "Switch the current kubeconfig context.",
        args: &[req("context_name")],
        mutating: Some(true),
        build: build_use_context,
    },
    Instruction {
        name: "list_namespaces",
        doc: "List namespaces in the cluster.",
        args: &[],
        mutating: Some(false),
        build: build_list_namespaces,
    },
    Instruction {
        name: "start_http_load",
        doc: "Start an in-cluster HTTP load generator pod (curl or busybox) for autoscaling demos.",
        args: &[
            text("pod_name", "curlgen"),
            NS,
            text("url", DEFAULT_LOAD_URL),
            text("generator", "curl"),
        ],
        mutating: Some(true),
        build: build_start_http_load,
    },
    Instruction {
        name: "stop_http_load",
        doc: "Delete the load generator pod started by start_http_load.",
        args: &[text("pod_name", "curlgen"), NS],
        mutating: Some(true),
        build: build_delete_named_pod,
    },
    Instruction {
        name: "start_http_load_stats",
        doc: "Start a pod that sends bursts of requests and logs approximate hits per second.",
        args: &[
            text("pod_name", "curlstats"),
            NS,
            text("url", DEFAULT_LOAD_URL),
            text("generator", "curl"),
            int("burst_per_second", 50),
        ],
        mutating: Some(true),
        build: build_start_http_load_stats,
    },
    Instruction {
        name: "stop_http_load_stats",
        doc: "Delete the stats pod started by start_http_load_stats.",
        args: &[text("pod_name", "curlstats"), NS],
        mutating: Some(true),
        build: build_delete_named_pod,
    },
];

/// Look up an instruction by name.
pub fn lookup(name: &str) -> Result<&'static Instruction, CatalogError> {
    CATALOG
        .iter()
        .find(|i| i.name == name)
        .ok_or_else(|| CatalogError::UnknownInstruction(name.to_string()))
}

/// Synthesize the command for `name` from already-validated params.
pub fn synthesize(name: &str, params: &Params) -> Result<SynthesizedCommand, CatalogError> {
    lookup(name)?.synthesize(params)
}

/// `{name: {doc, arguments}}` for every registered instruction.
pub fn describe_all() -> Map<String, Value> {
    CATALOG
        .iter()
        .map(|i| {
            let entry = serde_json::json!({
                "doc": i.doc,
                "arguments": Value::Object(i.advertised_args()),
            });
            (i.name.to_string(), entry)
        })
        .collect()
}

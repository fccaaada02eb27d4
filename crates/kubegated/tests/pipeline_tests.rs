//! Tests for pipeline.rs
//!
//! Drives the gateway end to end with a spy runner in place of the shell.

mod common;

use common::{gateway, gateway_with, ok, params, SpyRunner};
use kubegate_shared::catalog::ENCODED_DISPLAY;
use kubegate_shared::error::{CatalogError, GateError};
use kubegate_shared::rpc::{ExecuteResponse, CONFIRMATION_MESSAGE, PREVIEW_UNSUPPORTED_MESSAGE};
use kubegated::config::GatewayConfig;
use kubegated::executor::CommandOutput;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn executed(r: ExecuteResponse) -> kubegate_shared::rpc::ExecutionResult {
    match r {
        ExecuteResponse::Executed(r) => r,
        other => panic!("expected a result, got {:?}", other),
    }
}

fn envelope(r: ExecuteResponse) -> kubegate_shared::rpc::ConfirmationEnvelope {
    match r {
        ExecuteResponse::ConfirmationRequired(e) => e,
        other => panic!("expected a confirmation envelope, got {:?}", other),
    }
}

// ============================================================================
// Rejections never spawn
// ============================================================================

#[tokio::test]
async fn test_bad_namespace_rejected_without_spawn() {
    for ns in ["bad;rm -rf /", "Prod", "-leading", "a$(id)"] {
        let spy = Arc::new(SpyRunner::new());
        let gw = gateway(spy.clone());
        let err = gw
            .execute(
                "s1",
                "get_resources",
                params(json!({"resource_type": "pods", "namespace": ns})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Validation(_)), "{}: {:?}", ns, err);
        assert!(spy.commands().is_empty());
        assert_eq!(spy.lookups(), 0);
    }
}

#[tokio::test]
async fn test_resource_type_outside_allowlist() {
    let spy = Arc::new(SpyRunner::new());
    let err = gateway(spy.clone())
        .execute("s1", "get_resources", params(json!({"resource_type": "clusterroles"})))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid resource_type: clusterroles");
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_memory_typo_gets_suggestion() {
    let spy = Arc::new(SpyRunner::new());
    let err = gateway(spy.clone())
        .execute(
            "s1",
            "set_deployment_resources",
            params(json!({"deployment_name": "web", "memory_limit": "512i", "confirm": true})),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Did you mean '512Mi'?"), "{}", err);
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_unknown_instruction() {
    let spy = Arc::new(SpyRunner::new());
    let err = gateway(spy.clone())
        .execute("s1", "drop_cluster", params(json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GateError::Catalog(CatalogError::UnknownInstruction("drop_cluster".into()))
    );
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_missing_required_parameter() {
    let spy = Arc::new(SpyRunner::new());
    let err = gateway(spy.clone())
        .execute("s1", "scale_deployment", params(json!({"replicas": 2})))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Catalog(CatalogError::InvalidParameters(_))));
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_blank_session_is_rejected_first() {
    let spy = Arc::new(SpyRunner::new());
    let err = gateway(spy.clone())
        .execute("  ", "get_resources", params(json!({"namespace": "bad;ns"})))
        .await
        .unwrap_err();
    assert_eq!(err, GateError::MissingSessionId);
}

// ============================================================================
// Read-only execution
// ============================================================================

#[tokio::test]
async fn test_get_pods_scenario() {
    let spy = Arc::new(SpyRunner::new().respond(
        "kubectl get pods",
        ok("NAME    READY   STATUS\nweb-1   1/1     Running"),
    ));
    let r = executed(
        gateway(spy.clone())
            .execute(
                "s1",
                "get_resources",
                params(json!({"resource_type": "pods", "namespace": "default", "request_id": "r-42"})),
            )
            .await
            .unwrap(),
    );
    assert_eq!(r.command, "kubectl get pods -n default");
    assert_eq!(r.display_command, r.command);
    assert_eq!(r.returncode, 0);
    assert!(r.stdout.contains("web-1"));
    assert_eq!(r.request_id.as_deref(), Some("r-42"));
    assert_eq!(r.session_id, "s1");
    let ctx = r.context.unwrap();
    assert_eq!(ctx.current_context.as_deref(), Some("test-ctx"));
    assert_eq!(ctx.default_namespace.as_deref(), Some("default"));
    assert!(r.summary.is_none());
    assert_eq!(spy.commands(), vec!["kubectl get pods -n default"]);
    assert_eq!(spy.timeouts(), vec![Duration::from_secs(60)]);
}

#[tokio::test]
async fn test_structured_output_is_summarized() {
    let pods = json!({
        "kind": "List",
        "items": [{
            "kind": "Pod",
            "metadata": {"name": "web-1", "namespace": "default"},
            "status": {"phase": "Running"}
        }]
    });
    let spy = Arc::new(SpyRunner::new().respond("-o json", ok(&pods.to_string())));
    let r = executed(
        gateway(spy.clone())
            .execute(
                "s1",
                "get_resources",
                params(json!({"resource_type": "pods", "structured_output": "true"})),
            )
            .await
            .unwrap(),
    );
    assert_eq!(r.command, "kubectl get pods -n default -o json");
    assert_eq!(r.structured.unwrap()["kind"], "List");
    assert_eq!(
        r.summary.as_deref(),
        Some("pod/web-1 ns=default ip=- node=- phase=Running ready=0/0 restarts=0 age=-")
    );
}

#[tokio::test]
async fn test_failed_command_is_a_result() {
    let spy = Arc::new(SpyRunner::new().respond(
        "kubectl get pods",
        CommandOutput {
            stderr: "error: the server doesn't have a resource type".into(),
            returncode: 1,
            ..Default::default()
        },
    ));
    let r = executed(
        gateway(spy)
            .execute("s1", "get_resources", params(json!({"resource_type": "pods", "structured_output": true})))
            .await
            .unwrap(),
    );
    assert_eq!(r.returncode, 1);
    assert!(r.structured.is_none());
    assert!(r.stderr.starts_with("error:"));
}

#[tokio::test]
async fn test_timeout_overrides() {
    let spy = Arc::new(SpyRunner::new());
    let gw = gateway(spy.clone());
    gw.execute(
        "s1",
        "get_resources",
        params(json!({"resource_type": "pods", "timeout": "7"})),
    )
    .await
    .unwrap();
    gw.execute(
        "s1",
        "get_events",
        params(json!({"watch": true, "duration": 4})),
    )
    .await
    .unwrap();
    gw.execute(
        "s1",
        "get_pod_logs",
        params(json!({"pod_name": "web-1", "follow": true, "timeout": "soon"})),
    )
    .await
    .unwrap();
    assert_eq!(
        spy.timeouts(),
        vec![
            Duration::from_secs(7),
            Duration::from_secs(4),
            Duration::from_secs(15)
        ]
    );
}

#[tokio::test]
async fn test_timed_out_result_keeps_output() {
    let spy = Arc::new(SpyRunner::new().respond(
        "kubectl get events",
        CommandOutput {
            stdout: "LAST SEEN   TYPE".into(),
            returncode: -9,
            timed_out: true,
            duration_ms: 15_000,
            ..Default::default()
        },
    ));
    let r = executed(
        gateway(spy)
            .execute("s1", "get_events", params(json!({"watch": true})))
            .await
            .unwrap(),
    );
    assert!(r.timed_out);
    assert_eq!(r.returncode, -9);
    assert_eq!(r.stdout, "LAST SEEN   TYPE");
}

// ============================================================================
// Confirmation gate
// ============================================================================

#[tokio::test]
async fn test_scale_requires_confirmation() {
    let spy = Arc::new(SpyRunner::new());
    let e = envelope(
        gateway(spy.clone())
            .execute(
                "s1",
                "scale_deployment",
                params(json!({"deployment_name": "web", "replicas": "3"})),
            )
            .await
            .unwrap(),
    );
    assert!(e.confirmation_required);
    assert_eq!(e.message, CONFIRMATION_MESSAGE);
    assert_eq!(e.command, "kubectl scale deployment/web -n default --replicas=3");
    assert_eq!(e.returncode, 0);
    assert!(!e.preview.supported);
    // Nothing ran: scale has no dry-run form.
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_every_mutating_prefix_is_gated() {
    let cases = [
        ("delete_pod", json!({"pod_name": "web-1"})),
        ("delete_configmap", json!({"configmap_name": "cfg"})),
        ("scale_deployment", json!({"deployment_name": "web"})),
        ("set_deployment_resources", json!({"deployment_name": "web", "cpu_request": "100m"})),
        ("expose_deployment", json!({"deployment_name": "web"})),
        ("undo_rollout", json!({"deployment_name": "web"})),
        ("create_hpa", json!({"deployment_name": "web"})),
        ("stop_http_load", json!({})),
    ];
    for (name, p) in cases {
        let spy = Arc::new(SpyRunner::new());
        let response = gateway(spy.clone())
            .execute("s1", name, params(p))
            .await
            .unwrap();
        let e = envelope(response);
        assert!(e.confirmation_required, "{}", name);
        for cmd in spy.commands() {
            assert!(cmd.contains("--dry-run=client"), "{} ran live: {}", name, cmd);
        }
    }
}

#[tokio::test]
async fn test_expose_envelope_carries_preview() {
    let spy = Arc::new(SpyRunner::new().respond("--dry-run=client", ok("apiVersion: v1\nkind: Service")));
    let e = envelope(
        gateway(spy.clone())
            .execute("s1", "expose_deployment", params(json!({"deployment_name": "web", "port": 8080})))
            .await
            .unwrap(),
    );
    assert!(e.preview.supported);
    assert_eq!(e.preview.dry_run, Some(true));
    assert_eq!(
        e.preview.command,
        "kubectl expose deployment/web -n default --port=8080 --target-port=80 --type=ClusterIP --dry-run=client -o yaml"
    );
    assert!(e.preview.stdout.contains("kind: Service"));
    assert_eq!(spy.commands(), vec![e.preview.command.clone()]);
    assert_eq!(spy.timeouts(), vec![Duration::from_secs(30)]);
}

#[tokio::test]
async fn test_confirmed_scale_runs() {
    let spy = Arc::new(SpyRunner::new().respond("kubectl scale", ok("deployment.apps/web scaled")));
    let r = executed(
        gateway(spy.clone())
            .execute(
                "s1",
                "scale_deployment",
                params(json!({"deployment_name": "web", "replicas": 3, "confirm": "yes"})),
            )
            .await
            .unwrap(),
    );
    assert_eq!(r.stdout, "deployment.apps/web scaled");
    assert!(r.dry_run.is_none());
    assert_eq!(spy.commands(), vec!["kubectl scale deployment/web -n default --replicas=3"]);
}

#[tokio::test]
async fn test_confirmed_command_matches_envelope_for_wildcard_namespace() {
    let spy = Arc::new(SpyRunner::new());
    let gw = gateway(spy.clone());
    let e = envelope(
        gw.execute("s1", "delete_completed_pods", params(json!({"namespace": "*"})))
            .await
            .unwrap(),
    );
    assert_eq!(
        e.command,
        "kubectl delete pod -A --field-selector=status.phase=Succeeded --ignore-not-found --wait=false"
    );
    assert!(spy.commands().is_empty());

    let r = executed(
        gw.execute(
            "s1",
            "delete_completed_pods",
            params(json!({"namespace": "*", "confirm": true})),
        )
        .await
        .unwrap(),
    );
    assert_eq!(r.command, e.command);
    assert_eq!(spy.commands(), vec![e.command]);
}

#[tokio::test]
async fn test_glob_names_rejected_without_spawn() {
    let cases = [
        ("get_resources", json!({"resource_type": "pods", "resource_name": "*"})),
        ("get_pod_logs", json!({"pod_name": "web-1", "container": "*"})),
        ("delete_pod", json!({"pod_name": "web-?", "confirm": true})),
    ];
    for (name, p) in cases {
        let spy = Arc::new(SpyRunner::new());
        let err = gateway(spy.clone())
            .execute("s1", name, params(p))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Validation(_)), "{}: {:?}", name, err);
        assert!(spy.commands().is_empty());
    }
}

#[tokio::test]
async fn test_dry_run_without_preview_form() {
    let spy = Arc::new(SpyRunner::new());
    let r = executed(
        gateway(spy.clone())
            .execute(
                "s1",
                "scale_deployment",
                params(json!({"deployment_name": "web", "dry_run": true})),
            )
            .await
            .unwrap(),
    );
    assert_eq!(r.preview_only, Some(true));
    assert_eq!(r.stderr, PREVIEW_UNSUPPORTED_MESSAGE);
    assert_eq!(r.returncode, 0);
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_encoded_manifest_dry_run() {
    let spy = Arc::new(SpyRunner::new());
    let gw = gateway(spy.clone());
    let request = json!({"deployment_name": "web", "image": "nginx:1.27", "dry_run": "1"});
    let first = executed(gw.execute("s1", "create_deployment_apply", params(request.clone())).await.unwrap());
    let second = executed(gw.execute("s1", "create_deployment_apply", params(request)).await.unwrap());

    assert_eq!(first.display_command, ENCODED_DISPLAY);
    assert!(first.command.ends_with(" | base64 -d | sh"));
    assert_eq!(first.preview_only, Some(true));
    assert_eq!(first.command, second.command);
    assert_eq!(first.display_command, second.display_command);
    assert!(spy.commands().is_empty());
}

#[tokio::test]
async fn test_dry_run_with_preview_form() {
    let spy = Arc::new(SpyRunner::new().respond("--dry-run=client", ok("kind: HorizontalPodAutoscaler")));
    let r = executed(
        gateway(spy.clone())
            .execute(
                "s1",
                "create_hpa",
                params(json!({"deployment_name": "web", "dry_run": true})),
            )
            .await
            .unwrap(),
    );
    assert_eq!(r.dry_run, Some(true));
    assert!(r.command.ends_with("--cpu-percent=80 --dry-run=client -o yaml"));
    assert_eq!(r.stdout, "kind: HorizontalPodAutoscaler");
    assert_eq!(spy.commands().len(), 1);
}

#[tokio::test]
async fn test_policy_off_runs_mutations() {
    let spy = Arc::new(SpyRunner::new());
    let config = GatewayConfig {
        require_confirm_for_mutations: false,
        ..Default::default()
    };
    let r = executed(
        gateway_with(config, spy.clone())
            .execute("s1", "delete_pod", params(json!({"pod_name": "web-1"})))
            .await
            .unwrap(),
    );
    assert_eq!(r.returncode, 0);
    assert_eq!(spy.commands().len(), 1);
    assert!(spy.commands()[0].starts_with("kubectl delete pod web-1"));
}

// ============================================================================
// Context cache
// ============================================================================

#[tokio::test]
async fn test_context_lookups_are_cached() {
    let spy = Arc::new(SpyRunner::new());
    let gw = gateway(spy.clone());
    for _ in 0..3 {
        gw.execute("s1", "list_namespaces", params(json!({})))
            .await
            .unwrap();
    }
    assert_eq!(spy.lookups(), 2);
}

#[tokio::test]
async fn test_use_context_refreshes_snapshot() {
    let spy = Arc::new(SpyRunner::new());
    let gw = gateway(spy.clone());
    gw.execute("s1", "list_namespaces", params(json!({})))
        .await
        .unwrap();
    let r = executed(
        gw.execute(
            "s1",
            "use_context",
            params(json!({"context_name": "staging", "confirm": true})),
        )
        .await
        .unwrap(),
    );
    assert_eq!(r.command, "kubectl config use-context staging");
    assert_eq!(spy.lookups(), 4);
}

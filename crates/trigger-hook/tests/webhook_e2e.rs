//! End-to-end tests for the webhook router.
//!
//! The router is driven directly with `tower::ServiceExt::oneshot`, and
//! trigger launches are captured by `RecordingLauncher` instead of spawning
//! processes.
//!
//! Run with:
//!   cargo test -p trigger-hook --test webhook_e2e

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt as _;
use trigger_hook::mocks::RecordingLauncher;
use trigger_hook::signature::sign;
use trigger_hook::{AppState, ServerConfig, router};
use trigger_types::RoutingTables;

const SECRET: &str = "test-secret";
const NEWLIB_MASTER: &str =
    r#"{"repository":{"full_name":"vitasdk/newlib"},"ref":"refs/heads/master"}"#;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct TestServer {
    app: Router,
    launcher: RecordingLauncher,
}

fn server_with(config: ServerConfig) -> TestServer {
    let launcher = RecordingLauncher::new();
    let app = router(AppState::new(
        config,
        RoutingTables::vitasdk(),
        launcher.clone(),
    ));
    TestServer { app, launcher }
}

fn signed_server() -> TestServer {
    server_with(ServerConfig {
        secret: Some(SECRET.to_string()),
        ..ServerConfig::default()
    })
}

fn unsigned_server() -> TestServer {
    server_with(ServerConfig::default())
}

fn webhook(event: Option<&str>, body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", "application/json")
        .header("X-GitHub-Delivery", "delivery-123");
    if let Some(event) = event {
        builder = builder.header("X-GitHub-Event", event);
    }
    if let Some(signature) = signature {
        builder = builder.header("X-Hub-Signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn signed_webhook(event: &str, body: &str) -> Request<Body> {
    webhook(Some(event), body, Some(sign(SECRET.as_bytes(), body.as_bytes())))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Give any detached dispatch a chance to run before asserting it did not.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// `ping` with no secret configured is acknowledged with `pong`.
#[tokio::test]
async fn ping_without_secret_returns_pong() {
    let server = unsigned_server();

    let (status, body) = send(&server.app, webhook(Some("ping"), r#"{"zen":"hi"}"#, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "pong");
    settle().await;
    assert_eq!(server.launcher.call_count(), 0, "ping must not trigger anything");
}

/// Happy path: a signed branch push from a grouped repository fires the
/// group's endpoint exactly once.
#[tokio::test]
async fn signed_branch_push_triggers_group_endpoint_once() {
    let server = signed_server();

    let (status, _) = send(&server.app, signed_webhook("push", NEWLIB_MASTER)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        server
            .launcher
            .wait_for_calls(1, Duration::from_secs(5))
            .await,
        "trigger was never launched"
    );
    settle().await;
    assert_eq!(server.launcher.calls(), vec!["vitasdk/test"]);
}

/// Tag pushes are acknowledged but trigger nothing while tags are ignored.
#[tokio::test]
async fn tag_push_with_ignore_tags_does_not_trigger() {
    let server = signed_server();
    let body = r#"{"repository":{"full_name":"vitasdk/newlib"},"ref":"refs/tags/v1.0"}"#;

    let (status, _) = send(&server.app, signed_webhook("push", body)).await;

    assert_eq!(status, StatusCode::OK);
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// With tag-ignoring switched off, tag pushes trigger like branches.
#[tokio::test]
async fn tag_push_triggers_when_tags_are_not_ignored() {
    let server = server_with(ServerConfig {
        secret: Some(SECRET.to_string()),
        ignore_tags: false,
        ..ServerConfig::default()
    });
    let body = r#"{"repository":{"full_name":"vitasdk/vita-headers"},"ref":"refs/tags/v1.0"}"#;

    let (status, _) = send(&server.app, signed_webhook("push", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        server
            .launcher
            .wait_for_calls(1, Duration::from_secs(5))
            .await
    );
    assert_eq!(server.launcher.calls(), vec!["vitasdk/test"]);
}

/// Pushes to refs that are neither branches nor tags, including truncated
/// ones, are acknowledged without triggering or faulting.
#[tokio::test]
async fn odd_refs_are_ignored() {
    let server = unsigned_server();

    for git_ref in ["refs/notes/commits", "refs/h", "", "refs/tags"] {
        let body = format!(
            r#"{{"repository":{{"full_name":"vitasdk/newlib"}},"ref":"{git_ref}"}}"#
        );
        let (status, _) = send(&server.app, webhook(Some("push"), &body, None)).await;
        assert_eq!(status, StatusCode::OK, "ref {git_ref:?}");
    }

    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// A push without a `ref` field is acknowledged and triggers nothing.
#[tokio::test]
async fn push_without_ref_does_not_trigger() {
    let server = unsigned_server();
    let body = r#"{"repository":{"full_name":"vitasdk/newlib"}}"#;

    let (status, _) = send(&server.app, webhook(Some("push"), body, None)).await;

    assert_eq!(status, StatusCode::OK);
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// Repositories outside the routing table are acknowledged without triggering.
#[tokio::test]
async fn unknown_repository_push_does_not_trigger() {
    let server = signed_server();
    let body = r#"{"repository":{"full_name":"someone/else"},"ref":"refs/heads/main"}"#;

    let (status, _) = send(&server.app, signed_webhook("push", body)).await;

    assert_eq!(status, StatusCode::OK);
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// Each push dispatches independently: two repositories of the same group
/// pushing in turn fire the endpoint once per push.
#[tokio::test]
async fn each_push_dispatches_its_own_trigger() {
    let server = unsigned_server();
    let newlib = NEWLIB_MASTER;
    let headers = r#"{"repository":{"full_name":"vitasdk/vita-headers"},"ref":"refs/heads/master"}"#;

    send(&server.app, webhook(Some("push"), newlib, None)).await;
    send(&server.app, webhook(Some("push"), headers, None)).await;

    assert!(
        server
            .launcher
            .wait_for_calls(2, Duration::from_secs(5))
            .await
    );
    settle().await;
    assert_eq!(server.launcher.calls(), vec!["vitasdk/test", "vitasdk/test"]);
}

/// A failing trigger never changes the HTTP response.
#[tokio::test]
async fn failing_trigger_still_returns_200() {
    let server = signed_server();
    server.launcher.fail_for("vitasdk/test");

    let (status, body) = send(&server.app, signed_webhook("push", NEWLIB_MASTER)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    assert!(
        server
            .launcher
            .wait_for_calls(1, Duration::from_secs(5))
            .await
    );
}

/// The response is sent without waiting for the trigger to finish.
#[tokio::test]
async fn response_does_not_wait_for_trigger() {
    let server = unsigned_server();
    server
        .launcher
        .delay_for("vitasdk/test", Duration::from_secs(30));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        send(&server.app, webhook(Some("push"), NEWLIB_MASTER, None)),
    )
    .await;

    let (status, _) = result.expect("response waited for the trigger");
    assert_eq!(status, StatusCode::OK);
}

/// `pull_request` is a known event that is deliberately a no-op.
#[tokio::test]
async fn pull_request_is_accepted_without_action() {
    let server = signed_server();
    let body = r#"{"action":"opened","number":42,"repository":{"full_name":"vitasdk/newlib"}}"#;

    let (status, text) = send(&server.app, signed_webhook("pull_request", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "ignored");
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// A secret is configured but `X-Hub-Signature` is absent → 403.
#[tokio::test]
async fn missing_signature_returns_403() {
    let server = signed_server();

    let (status, body) = send(&server.app, webhook(Some("push"), NEWLIB_MASTER, None)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Missing X-Hub-Signature"));
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// A signature computed with the wrong secret → 403, nothing triggered.
#[tokio::test]
async fn invalid_signature_returns_403() {
    let server = signed_server();
    let forged = sign(b"wrong-secret", NEWLIB_MASTER.as_bytes());

    let (status, body) = send(
        &server.app,
        webhook(Some("push"), NEWLIB_MASTER, Some(forged)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("HMAC verification failed"));
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// A valid signature over a different body does not authenticate this one.
#[tokio::test]
async fn signature_for_other_body_returns_403() {
    let server = signed_server();
    let other = sign(SECRET.as_bytes(), b"{}");

    let (status, _) = send(&server.app, webhook(Some("push"), NEWLIB_MASTER, Some(other))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

/// Without a secret, signature headers are not looked at.
#[tokio::test]
async fn signature_ignored_without_secret() {
    let server = unsigned_server();

    let (status, _) = send(
        &server.app,
        webhook(Some("ping"), "{}", Some("sha1=garbage".to_string())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

/// Unknown event types are rejected with 400 naming the type.
#[tokio::test]
async fn unknown_event_returns_400() {
    let server = unsigned_server();

    let (status, body) = send(&server.app, webhook(Some("bogus"), "{}", None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("bogus"));
}

/// Missing `X-GitHub-Event` → 400, even with a valid signature.
#[tokio::test]
async fn missing_event_header_returns_400() {
    let server = signed_server();
    let signature = sign(SECRET.as_bytes(), b"{}");

    let (status, body) = send(&server.app, webhook(None, "{}", Some(signature))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing X-GitHub-Event"));
}

/// Only `POST` is accepted.
#[tokio::test]
async fn get_returns_405() {
    let server = unsigned_server();
    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header("X-GitHub-Event", "ping")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

/// Requests to any path but the configured one → 404.
#[tokio::test]
async fn wrong_path_returns_404() {
    let server = unsigned_server();
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-GitHub-Event", "ping")
        .body(Body::from("{}"))
        .unwrap();

    let (status, _) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// A custom route path replaces `/` entirely.
#[tokio::test]
async fn custom_path_is_honoured() {
    let server = server_with(ServerConfig {
        path: "/hooks/github".to_string(),
        ..ServerConfig::default()
    });

    let at_custom = Request::builder()
        .method("POST")
        .uri("/hooks/github")
        .header("X-GitHub-Event", "ping")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&server.app, at_custom).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "pong");

    let (status, _) = send(&server.app, webhook(Some("ping"), "{}", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Bodies that are not JSON → 500.
#[tokio::test]
async fn invalid_json_returns_500() {
    let server = signed_server();

    let (status, _) = send(&server.app, signed_webhook("push", "not json")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

/// A push whose payload lacks `repository.full_name` → 500.
#[tokio::test]
async fn push_without_repository_name_returns_500() {
    let server = signed_server();
    let body = r#"{"ref":"refs/heads/master"}"#;

    let (status, body) = send(&server.app, signed_webhook("push", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("repository name"));
    settle().await;
    assert_eq!(server.launcher.call_count(), 0);
}

/// Bodies beyond the configured limit fail to read → 500.
#[tokio::test]
async fn oversized_body_returns_500() {
    let server = server_with(ServerConfig {
        max_body_bytes: 16,
        ..ServerConfig::default()
    });

    let (status, _) = send(&server.app, webhook(Some("push"), NEWLIB_MASTER, None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

/// A body stream that errors mid-read → 500.
#[tokio::test]
async fn body_read_error_returns_500() {
    let server = unsigned_server();
    let error_stream = futures_util::stream::once(async {
        Err::<bytes::Bytes, std::io::Error>(std::io::Error::other("simulated body read failure"))
    });
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("X-GitHub-Event", "ping")
        .body(Body::from_stream(error_stream))
        .unwrap();

    let (status, _) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

/// Routing tables supplied at startup replace the built-in ones.
#[tokio::test]
async fn custom_routing_tables_are_used() {
    let routing = RoutingTables::from_json(
        r#"{
            "repositories": { "acme/api": "backend", "acme/db": "backend" },
            "groups": { "backend": "deploy/backend" }
        }"#,
    )
    .unwrap();
    let launcher = RecordingLauncher::new();
    let app = router(AppState::new(
        ServerConfig::default(),
        routing,
        launcher.clone(),
    ));
    let body = r#"{"repository":{"full_name":"acme/db"},"ref":"refs/heads/main"}"#;

    let (status, _) = send(&app, webhook(Some("push"), body, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(launcher.wait_for_calls(1, Duration::from_secs(5)).await);
    assert_eq!(launcher.calls(), vec!["deploy/backend"]);
}

/// Concurrent deliveries are handled independently.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pushes_each_trigger() {
    let server = signed_server();

    let requests = (0..8).map(|_| send(&server.app, signed_webhook("push", NEWLIB_MASTER)));
    let results = futures_util::future::join_all(requests).await;

    assert!(results.iter().all(|(status, _)| *status == StatusCode::OK));
    assert!(
        server
            .launcher
            .wait_for_calls(8, Duration::from_secs(5))
            .await
    );
    settle().await;
    assert_eq!(server.launcher.call_count(), 8);
}

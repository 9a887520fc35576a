//! HTTP surface tests: scan routes, validator provisioning, admin API.
//!
//! Runs the full router in-process through `tower::ServiceExt::oneshot`
//! against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use gatepass::config::Config;
use gatepass::store::memory::MemoryStore;
use gatepass::{router, AppState};

const ADMIN_KEY: &str = "test-admin-key-0123";
const VALIDATOR_KEY: &str = "test-validator-key-4567";

fn app() -> Router {
    let config = Config {
        admin_key: ADMIN_KEY.into(),
        validator_key: VALIDATOR_KEY.into(),
        base_url: Some("https://gate.example".into()),
        database_url: "memory".into(),
        ..Config::default()
    };
    router(Arc::new(AppState::new(Arc::new(MemoryStore::new()), config)))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

async fn issue(app: &Router, payload: Value) -> Vec<String> {
    let req = Request::post("/api/v1/tokens")
        .header("x-admin-key", ADMIN_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    json_body(&body)["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["token"].as_str().unwrap().to_string())
        .collect()
}

fn scan(token: &str, validator: bool) -> Request<Body> {
    let mut req = Request::get(format!("/t/{}", token));
    if validator {
        req = req.header(header::COOKIE, format!("validator_key={}", VALIDATOR_KEY));
    }
    req.body(Body::empty()).unwrap()
}

fn admin_get(path: &str) -> Request<Body> {
    Request::get(path)
        .header("x-admin-key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap()
}

// ── Scan routes ────────────────────────────────────────────────

#[tokio::test]
async fn test_public_scan_body_is_identical_across_states() {
    let app = app();
    let tokens = issue(&app, json!({ "count": 2 })).await;
    let (_, _, _) = send(&app, scan(&tokens[1], true)).await;

    let mut bodies = Vec::new();
    for t in [tokens[0].as_str(), tokens[1].as_str(), "no-such-ticket"] {
        let (status, _, body) = send(&app, scan(t, false)).await;
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(json_body(&bodies[0]), json!({ "status": "neutral" }));
}

#[tokio::test]
async fn test_validator_scan_consumes_once() {
    let app = app();
    let token = issue(&app, json!({ "count": 1, "label": "VIP" })).await.remove(0);

    let (status, _, body) = send(&app, scan(&token, true)).await;
    assert_eq!(status, StatusCode::OK);
    let first = json_body(&body);
    assert_eq!(first["status"], "validated");
    assert_eq!(first["label"], "VIP");

    let (_, _, body) = send(&app, scan(&token, true)).await;
    let second = json_body(&body);
    assert_eq!(second["status"], "already_used");
    assert_eq!(second["used_at"], first["used_at"]);
}

#[tokio::test]
async fn test_validator_header_and_unknown_token() {
    let app = app();
    let req = Request::get("/t/nonexistent-token")
        .header("x-validator-key", VALIDATOR_KEY)
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(&app, req).await;
    assert_eq!(
        json_body(&body),
        json!({ "status": "not_found", "token": "nonexistent-token" })
    );
}

#[tokio::test]
async fn test_wrong_validator_cookie_is_public() {
    let app = app();
    let token = issue(&app, json!({ "count": 1 })).await.remove(0);
    let req = Request::get(format!("/t/{}", token))
        .header(header::COOKIE, "validator_key=guess")
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(&app, req).await;
    assert_eq!(json_body(&body)["status"], "neutral");

    // Still unused: a real validator gets the success path.
    let (_, _, body) = send(&app, scan(&token, true)).await;
    assert_eq!(json_body(&body)["status"], "validated");
}

#[tokio::test]
async fn test_scan_responses_are_not_cacheable() {
    let app = app();
    let (_, headers, _) = send(&app, scan("anything", false)).await;
    assert_eq!(headers["cache-control"], "no-store");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert!(headers.contains_key("x-request-id"));
}

// ── Validator provisioning ─────────────────────────────────────

#[tokio::test]
async fn test_set_validator_requires_key() {
    let app = app();
    let (status, _, _) = send(&app, Request::get("/set-validator").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, headers, _) = send(
        &app,
        Request::get("/set-validator?key=wrong").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!headers.contains_key(header::SET_COOKIE));
}

#[tokio::test]
async fn test_set_validator_sets_cookie_and_redirects() {
    let app = app();
    let (status, headers, _) = send(
        &app,
        Request::get(format!("/set-validator?key={}", VALIDATOR_KEY))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(status.is_redirection());
    assert_eq!(headers[header::LOCATION], "/");
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("validator_key={};", VALIDATOR_KEY)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn test_logout_validator_clears_cookie() {
    let app = app();
    let (status, headers, _) = send(
        &app,
        Request::get("/logout-validator").body(Body::empty()).unwrap(),
    )
    .await;
    assert!(status.is_redirection());
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

// ── Admin API ──────────────────────────────────────────────────

#[tokio::test]
async fn test_admin_api_requires_key() {
    let app = app();
    let (status, _, _) = send(&app, Request::get("/api/v1/stats").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/api/v1/stats")
        .header("authorization", "Bearer not-the-key")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_issue_returns_urls_and_clamps_count() {
    let app = app();
    let req = Request::post("/api/v1/tokens")
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "count": 0, "prefix": "EVT-" }).to_string()))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let tokens = json_body(&body)["tokens"].as_array().unwrap().clone();
    assert_eq!(tokens.len(), 1);
    let token = tokens[0]["token"].as_str().unwrap();
    assert!(token.starts_with("EVT-"));
    assert_eq!(
        tokens[0]["url"].as_str().unwrap(),
        format!("https://gate.example/t/{}", token)
    );
}

#[tokio::test]
async fn test_issue_rejects_unsafe_prefix() {
    let app = app();
    let req = Request::post("/api/v1/tokens")
        .header("x-admin-key", ADMIN_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "count": 2, "prefix": "a/b" }).to_string()))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_stats_and_export_json() {
    let app = app();
    let tokens = issue(&app, json!({ "count": 3, "prefix": "EVT-", "label": "Door A" })).await;
    send(&app, scan(&tokens[0], true)).await;

    let (status, _, body) = send(&app, admin_get("/api/v1/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "total": 3, "used": 1, "unused": 2 }));

    let (_, _, body) = send(&app, admin_get("/api/v1/export")).await;
    let export = json_body(&body);
    assert_eq!(export["stats"], json!({ "total": 3, "used": 1 }));
    let rows = export["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    // Newest first: the first issued (and consumed) token comes last.
    assert_eq!(rows[2]["token"], tokens[0].as_str());
    assert!(rows[2]["used_at"].is_string());
    assert!(rows[0]["used_at"].is_null());
    assert_eq!(rows[0]["label"], "Door A");
}

#[tokio::test]
async fn test_list_tokens_respects_limit() {
    let app = app();
    issue(&app, json!({ "count": 5 })).await;
    let (status, _, body) = send(&app, admin_get("/api/v1/tokens?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_export_csv_attachment() {
    let app = app();
    let tokens = issue(&app, json!({ "count": 2, "label": "Row, 1" })).await;

    let (status, headers, body) = send(&app, admin_get("/api/v1/export.csv")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("tokens.csv"));

    let csv = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines[0], "token,url,label,created_at,used_at");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with(&format!(
        "{},https://gate.example/t/{},\"Row, 1\",",
        tokens[1], tokens[1]
    )));
}

// ── Probes ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_readiness() {
    let app = app();
    for path in ["/healthz", "/readyz"] {
        let (status, _, body) = send(&app, Request::get(path).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}

#[tokio::test]
async fn test_metrics_exposes_scan_counter() {
    let app = app();
    send(&app, scan("whatever", false)).await;
    let (status, _, body) = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("gatepass_scans_total"));
}

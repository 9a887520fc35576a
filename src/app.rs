use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::lifecycle::{Exporter, LifecycleEngine, TokenGenerator, UrlBuilder};
use crate::store::TokenStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub engine: LifecycleEngine,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn TokenStore>, config: Config) -> Self {
        let generator = TokenGenerator::new(config.token_bytes, config.generation_attempts);
        let engine = LifecycleEngine::new(store, generator, config.max_issue);
        Self { engine, config }
    }

    /// URL builder for the current request: `GATEPASS_BASE_URL` when set,
    /// otherwise the scheme and host the client used to reach us.
    pub fn url_builder(&self, headers: &HeaderMap) -> UrlBuilder {
        let base = match &self.config.base_url {
            Some(base) => base.clone(),
            None => {
                let host = headers
                    .get(axum::http::header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("localhost");
                let scheme = headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .filter(|p| *p == "https" || *p == "http")
                    .unwrap_or("http");
                format!("{}://{}", scheme, host)
            }
        };
        ticket_url_builder(&base)
    }

    pub fn exporter(&self, headers: &HeaderMap) -> Exporter {
        Exporter::new(self.engine.store().clone(), self.url_builder(headers))
    }
}

/// `base` joined with `t/<token>`. A base path is preserved:
/// `https://h/events` -> `https://h/events/t/<token>`.
pub fn ticket_url_builder(base: &str) -> UrlBuilder {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };

    let parsed = url::Url::parse(&normalized);
    match parsed {
        Ok(base_url) => Arc::new(move |token: &str| {
            base_url
                .join(&format!("t/{}", token))
                .map(String::from)
                .unwrap_or_else(|_| format!("{}t/{}", base_url, token))
        }),
        Err(e) => {
            tracing::warn!("invalid base URL '{}': {}; using it verbatim", base, e);
            Arc::new(move |token: &str| format!("{}t/{}", normalized, token))
        }
    }
}

/// Full HTTP surface: public scan routes, admin API under `/api/v1`, probes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(|| async { crate::metrics::encode_metrics() }))
        .merge(api::scan::scan_router())
        .nest("/api/v1", api::api_router(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
}

async fn readiness_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.engine.store().ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!("readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::http::HeaderValue;

    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));

    // Scan results must never be served from a cache.
    headers.insert("cache-control", HeaderValue::from_static("no-store"));

    // Ticket URLs carry the token; keep them out of Referer.
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));

    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    headers.remove("server");

    resp
}

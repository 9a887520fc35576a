use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};

use crate::errors::AppError;
use crate::AppState;

pub mod auth;
pub mod handlers;
pub mod scan;

/// Build the admin API router.
/// All routes are relative: the caller mounts this under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/tokens",
            get(handlers::list_tokens).post(handlers::issue_tokens),
        )
        .route("/stats", get(handlers::get_stats))
        .route("/export", get(handlers::export_json))
        .route("/export.csv", get(handlers::export_csv))
        .layer(middleware::from_fn_with_state(state, admin_auth))
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: validates `X-Admin-Key` (or `Authorization: Bearer`) against
/// the configured admin key. Returns 401 if missing or invalid.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verdict = match auth::admin_key(req.headers()) {
        Some(k) if auth::keys_match(k, &state.config.admin_key) => Ok(()),
        Some(k) => {
            // SECURITY: Never log the expected key or the full provided key
            tracing::warn!("admin API: invalid key (provided: '{}')", auth::mask_key(k));
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("admin API: missing X-Admin-Key header");
            Err(AppError::Unauthorized)
        }
    };
    verdict?;
    Ok(next.run(req).await)
}

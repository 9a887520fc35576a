use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::auth;
use crate::errors::AppError;
use crate::models::ViewResult;
use crate::AppState;

/// Public routes: the ticket URL itself and validator device provisioning.
pub fn scan_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/t/:token", get(view_token))
        .route("/set-validator", get(set_validator))
        .route("/logout-validator", get(logout_validator))
}

#[derive(Deserialize)]
pub struct SetValidatorParams {
    pub key: Option<String>,
}

/// GET /: lets a device check whether it is provisioned as a validator.
async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let validator = auth::is_validator(&headers, &state.config.validator_key);
    Json(json!({ "service": "gatepass", "validator": validator }))
}

/// GET /t/:token: one scan.
///
/// Public devices always receive the neutral view. A validator device
/// consumes the ticket on its first scan.
async fn view_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ViewResult>, AppError> {
    let is_validator = auth::is_validator(&headers, &state.config.validator_key);
    let view = state.engine.resolve(&token, is_validator).await?;
    Ok(Json(view))
}

/// GET /set-validator?key=...: provision this device once.
async fn set_validator(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SetValidatorParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = params.key.unwrap_or_default();
    if key.is_empty() {
        return Err(AppError::BadRequest("key required as query param".into()));
    }
    if !auth::keys_match(&key, &state.config.validator_key) {
        tracing::warn!("set-validator: invalid key (provided: '{}')", auth::mask_key(&key));
        return Err(AppError::Forbidden);
    }

    let secure = state
        .config
        .base_url
        .as_deref()
        .is_some_and(|b| b.starts_with("https://"));
    let cookie = auth::validator_cookie(&state.config.validator_key, secure);

    tracing::info!("validator device provisioned");
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")))
}

/// GET /logout-validator: drop validator status on this device.
async fn logout_validator() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, auth::clear_validator_cookie())],
        Redirect::to("/"),
    )
}

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, TicketError};
use crate::lifecycle::{Export, ExportRow};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize, Default)]
pub struct IssueRequest {
    pub count: Option<i64>,
    pub prefix: Option<String>,
    pub label: Option<String>,
}

#[derive(Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct IssueResponse {
    pub tokens: Vec<IssuedToken>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub used: i64,
    pub unused: i64,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Out-of-range counts are clamped rather than rejected, matching the admin form.
fn clamp_count(requested: Option<i64>, max: usize) -> usize {
    requested.unwrap_or(1).clamp(1, max as i64) as usize
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/v1/tokens: issue a batch of tickets
pub async fn issue_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssueResponse>), AppError> {
    let count = clamp_count(payload.count, state.engine.max_issue());
    let prefix = payload.prefix.as_deref().map(str::trim).unwrap_or("");

    let tokens = state
        .engine
        .issue(count, prefix, payload.label.as_deref())
        .await?;

    let url = state.url_builder(&headers);
    let tokens = tokens
        .into_iter()
        .map(|token| IssuedToken {
            url: url(&token),
            token,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(IssueResponse { tokens })))
}

/// GET /api/v1/tokens: newest tickets first, capped at the export limit
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ExportRow>>, AppError> {
    let cap = state.config.export_limit;
    let limit = params.limit.unwrap_or(cap).clamp(1, cap);

    let records = state
        .engine
        .store()
        .list_all(limit as i64, true)
        .await
        .map_err(TicketError::from)?;

    let url = state.url_builder(&headers);
    Ok(Json(
        records
            .into_iter()
            .map(|r| ExportRow::from_record(r, &*url))
            .collect(),
    ))
}

/// GET /api/v1/stats: total / used / unused counts
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.exporter(&headers).stats().await?;
    Ok(Json(StatsResponse {
        total: stats.total,
        used: stats.used,
        unused: stats.unused(),
    }))
}

/// GET /api/v1/export: stats plus the newest rows as JSON
pub async fn export_json(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Export>, AppError> {
    let export = state
        .exporter(&headers)
        .snapshot(state.config.export_limit)
        .await?;
    Ok(Json(export))
}

/// GET /api/v1/export.csv: every ticket as a CSV attachment
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let exporter = state.exporter(&headers);

    // Probe the store first so an outage is a 503, not a truncated download.
    exporter.stats().await?;

    let body = Body::from_stream(exporter.csv().inspect_err(|e| {
        tracing::error!("CSV export aborted mid-stream: {}", e);
    }));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"tokens.csv\"",
            ),
        ],
        body,
    ))
}

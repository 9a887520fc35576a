use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures reported by a `TokenStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The token value already exists. Recoverable: generate a new value and retry.
    #[error("duplicate token")]
    DuplicateToken,

    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::DuplicateToken;
            }
        }
        StoreError::Unavailable(e.into())
    }
}

/// Failures of the ticket lifecycle operations.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("token generation exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("issued {} of {requested} tokens: {cause}", issued.len())]
    PartialIssue {
        issued: Vec<String>,
        requested: usize,
        #[source]
        cause: Box<TicketError>,
    },

    #[error("count must be between 1 and {max}, got {count}")]
    InvalidCount { count: usize, max: usize },

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
}

impl From<StoreError> for TicketError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(source) => TicketError::StoreUnavailable(source),
            // Only reachable if a caller bypasses the generator retry loop.
            StoreError::DuplicateToken => {
                TicketError::StoreUnavailable(anyhow::anyhow!("unexpected duplicate token"))
            }
        }
    }
}

/// Errors surfaced over HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut issued: Option<Vec<String>> = None;

        let (status, error_type, code, msg) = match &self {
            AppError::Ticket(TicketError::StoreUnavailable(e)) => {
                tracing::error!("Store error: {:#}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable_error",
                    "store_unavailable",
                    "service temporarily unavailable".to_string(),
                )
            }
            AppError::Ticket(TicketError::GenerationExhausted { attempts }) => {
                tracing::error!(attempts, "token generation exhausted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "generation_exhausted",
                    "could not generate a unique token".to_string(),
                )
            }
            AppError::Ticket(TicketError::PartialIssue {
                issued: done,
                requested,
                cause,
            }) => {
                tracing::error!(
                    issued = done.len(),
                    requested,
                    "partial issuance: {}",
                    cause
                );
                issued = Some(done.clone());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "partial_issue",
                    format!("issued {} of {} tokens", done.len(), requested),
                )
            }
            AppError::Ticket(e @ TicketError::InvalidCount { .. })
            | AppError::Ticket(e @ TicketError::InvalidPrefix(_)) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                e.to_string(),
            ),
            AppError::BadRequest(m) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                m.clone(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                "invalid or missing key".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "forbidden",
                "invalid key".to_string(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        });
        if let Some(issued) = issued {
            body["issued"] = json!(issued);
        }

        (status, Json(body)).into_response()
    }
}

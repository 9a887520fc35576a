// Observer views returned by `LifecycleEngine::resolve`.
//
// Only validators ever see a variant other than `Neutral`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewResult {
    /// First validator scan. The token was consumed by this call.
    Validated {
        token: String,
        label: Option<String>,
        used_at: DateTime<Utc>,
    },
    /// Validator scan of a token consumed earlier.
    AlreadyUsed {
        token: String,
        label: Option<String>,
        used_at: DateTime<Utc>,
    },
    /// Validator scan of a token the store has never seen.
    NotFound { token: String },
    /// Public scan. Identical for absent, unused and used tokens.
    Neutral,
}

impl ViewResult {
    /// Stable outcome name, used for metrics labels and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            ViewResult::Validated { .. } => "validated",
            ViewResult::AlreadyUsed { .. } => "already_used",
            ViewResult::NotFound { .. } => "not_found",
            ViewResult::Neutral => "neutral",
        }
    }
}

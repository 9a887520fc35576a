use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row from the `tokens` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: i64,
    pub token: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn state(&self) -> TokenState {
        if self.used_at.is_some() {
            TokenState::Used
        } else {
            TokenState::Unused
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Lifecycle state of a ticket. `Used` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unused,
    Used,
}

/// Values needed to persist a freshly generated ticket.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub token: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the atomic unused -> used transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResult {
    /// This caller won the transition. The record carries the new `used_at`.
    Consumed(TokenRecord),
    /// Someone consumed the token earlier. The record carries the original `used_at`.
    AlreadyUsed(TokenRecord),
    NotFound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: i64,
    pub used: i64,
}

impl Stats {
    pub fn unused(&self) -> i64 {
        self.total - self.used
    }
}

/// Keyset page request over the `id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub newest_first: bool,
    /// Exclusive cursor: only rows strictly past this id in the chosen direction.
    pub after: Option<i64>,
}

impl Page {
    pub fn first(limit: i64, newest_first: bool) -> Self {
        Self {
            limit,
            newest_first,
            after: None,
        }
    }

    pub fn next(self, last_id: i64) -> Self {
        Self {
            after: Some(last_id),
            ..self
        }
    }
}

/// Empty or whitespace-only labels are stored as NULL.
pub fn normalize_label(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
}

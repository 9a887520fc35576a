use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::generator::{validate_prefix, TokenGenerator};
use crate::errors::{StoreError, TicketError};
use crate::metrics;
use crate::models::token::normalize_label;
use crate::models::{ConsumeResult, NewToken, ViewResult};
use crate::store::TokenStore;

pub const DEFAULT_MAX_ISSUE: usize = 1000;

/// Owns the unused -> used state machine.
///
/// Every mutation is a single `TokenStore::try_consume` call. The engine
/// holds no locks and never retries a consume.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn TokenStore>,
    generator: Arc<TokenGenerator>,
    max_issue: usize,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn TokenStore>, generator: TokenGenerator, max_issue: usize) -> Self {
        Self {
            store,
            generator: Arc::new(generator),
            max_issue: max_issue.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn max_issue(&self) -> usize {
        self.max_issue
    }

    /// Issue `count` fresh tickets sharing one `created_at`.
    ///
    /// Tickets are inserted one by one. If ticket K fails, the K-1 already
    /// persisted stay valid and are returned inside `PartialIssue`.
    pub async fn issue(
        &self,
        count: usize,
        prefix: &str,
        label: Option<&str>,
    ) -> Result<Vec<String>, TicketError> {
        if count == 0 || count > self.max_issue {
            return Err(TicketError::InvalidCount {
                count,
                max: self.max_issue,
            });
        }
        validate_prefix(prefix)?;

        let label = normalize_label(label);
        let created_at = Utc::now();
        let mut issued = Vec::with_capacity(count);

        for _ in 0..count {
            match self.issue_one(prefix, label.clone(), created_at).await {
                Ok(token) => issued.push(token),
                Err(cause) if issued.is_empty() => return Err(cause),
                Err(cause) => {
                    metrics::record_issued(issued.len());
                    return Err(TicketError::PartialIssue {
                        issued,
                        requested: count,
                        cause: Box::new(cause),
                    });
                }
            }
        }

        metrics::record_issued(issued.len());
        tracing::info!(count = issued.len(), prefix, "issued tickets");
        Ok(issued)
    }

    async fn issue_one(
        &self,
        prefix: &str,
        label: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<String, TicketError> {
        let attempts = self.generator.max_attempts();
        for attempt in 1..=attempts {
            let candidate = NewToken {
                token: self.generator.generate(prefix),
                label: label.clone(),
                created_at,
            };
            match self.store.insert(&candidate).await {
                Ok(_) => return Ok(candidate.token),
                Err(StoreError::DuplicateToken) => {
                    tracing::warn!(attempt, attempts, "token collision, regenerating");
                }
                Err(StoreError::Unavailable(e)) => {
                    metrics::record_store_error("insert");
                    return Err(TicketError::StoreUnavailable(e));
                }
            }
        }
        Err(TicketError::GenerationExhausted { attempts })
    }

    /// Resolve one scan.
    ///
    /// Public callers always get `Neutral` without the store being consulted,
    /// so neither the body nor the latency depends on the ticket's state.
    /// Callers must only pass `is_validator = true` for authenticated requests.
    pub async fn resolve(&self, token: &str, is_validator: bool) -> Result<ViewResult, TicketError> {
        if !is_validator {
            metrics::record_scan(ViewResult::Neutral.outcome());
            return Ok(ViewResult::Neutral);
        }

        let result = self.store.try_consume(token, Utc::now()).await.map_err(|e| {
            metrics::record_store_error("try_consume");
            TicketError::from(e)
        })?;

        let view = match result {
            ConsumeResult::Consumed(record) => ViewResult::Validated {
                used_at: record.used_at.unwrap_or_else(Utc::now),
                token: record.token,
                label: record.label,
            },
            ConsumeResult::AlreadyUsed(record) => ViewResult::AlreadyUsed {
                used_at: record.used_at.unwrap_or(record.created_at),
                token: record.token,
                label: record.label,
            },
            ConsumeResult::NotFound => ViewResult::NotFound {
                token: token.to_string(),
            },
        };

        metrics::record_scan(view.outcome());
        tracing::debug!(token = %mask_token(token), outcome = view.outcome(), "validator scan");
        Ok(view)
    }
}

/// Show only the first few characters of a token in logs.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(6).collect();
    if visible.len() < token.len() {
        format!("{}…", visible)
    } else {
        "****".to_string()
    }
}

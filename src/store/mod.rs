pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::models::{ConsumeResult, NewToken, Page, Stats, TokenRecord};

/// Abstraction over ticket persistence backends.
/// Implementations: PgStore (PostgreSQL, multi-instance), MemoryStore (single process).
///
/// All mutation goes through `try_consume`, which must be atomic in the
/// backend itself: concurrent calls for one token yield exactly one `Consumed`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a new ticket. Returns the surrogate id, or `DuplicateToken`
    /// if the token value already exists. Never overwrites.
    async fn insert(&self, token: &NewToken) -> Result<i64, StoreError>;

    async fn get(&self, token: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Atomically stamp `used_at` if and only if the token is still unused.
    async fn try_consume(
        &self,
        token: &str,
        used_at: DateTime<Utc>,
    ) -> Result<ConsumeResult, StoreError>;

    async fn count(&self) -> Result<Stats, StoreError>;

    async fn list_page(&self, page: Page) -> Result<Vec<TokenRecord>, StoreError>;

    async fn list_all(
        &self,
        limit: i64,
        newest_first: bool,
    ) -> Result<Vec<TokenRecord>, StoreError> {
        self.list_page(Page::first(limit, newest_first)).await
    }

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Open the backend named by `database_url`.
/// `memory` selects the in-process store; anything else is treated as a PostgreSQL URL.
pub async fn connect(database_url: &str) -> anyhow::Result<Arc<dyn TokenStore>> {
    if database_url == "memory" {
        tracing::warn!("using in-memory token store; tickets will not survive a restart");
        return Ok(Arc::new(memory::MemoryStore::new()));
    }

    let db = postgres::PgStore::connect(database_url).await?;
    tracing::info!("Running migrations...");
    db.migrate().await?;
    Ok(Arc::new(db))
}

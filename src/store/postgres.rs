use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::TokenStore;
use crate::errors::StoreError;
use crate::models::{ConsumeResult, NewToken, Page, Stats, TokenRecord};

const TOKEN_COLUMNS: &str = "id, token, label, created_at, used_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, token: &NewToken) -> Result<i64, StoreError> {
        // A unique violation on `token` surfaces as StoreError::DuplicateToken.
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tokens (token, label, created_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&token.token)
        .bind(&token.label)
        .bind(token.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn try_consume(
        &self,
        token: &str,
        used_at: DateTime<Utc>,
    ) -> Result<ConsumeResult, StoreError> {
        // Row-level lock on UPDATE: exactly one concurrent caller matches
        // `used_at IS NULL`, the rest see zero rows.
        let consumed = sqlx::query_as::<_, TokenRecord>(&format!(
            "UPDATE tokens SET used_at = $2 WHERE token = $1 AND used_at IS NULL RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(token)
        .bind(used_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = consumed {
            return Ok(ConsumeResult::Consumed(record));
        }

        // Records are never deleted and never revert, so a miss above means
        // the row is either absent or already used.
        match self.get(token).await? {
            Some(record) => Ok(ConsumeResult::AlreadyUsed(record)),
            None => Ok(ConsumeResult::NotFound),
        }
    }

    async fn count(&self) -> Result<Stats, StoreError> {
        let (total, used) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(used_at) FROM tokens",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(Stats { total, used })
    }

    async fn list_page(&self, page: Page) -> Result<Vec<TokenRecord>, StoreError> {
        let sql = match (page.newest_first, page.after.is_some()) {
            (true, false) => format!("SELECT {TOKEN_COLUMNS} FROM tokens ORDER BY id DESC LIMIT $1"),
            (true, true) => format!(
                "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id < $2 ORDER BY id DESC LIMIT $1"
            ),
            (false, false) => format!("SELECT {TOKEN_COLUMNS} FROM tokens ORDER BY id ASC LIMIT $1"),
            (false, true) => format!(
                "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id > $2 ORDER BY id ASC LIMIT $1"
            ),
        };

        let mut query = sqlx::query_as::<_, TokenRecord>(&sql).bind(page.limit.max(0));
        if let Some(after) = page.after {
            query = query.bind(after);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::TokenStore;
use crate::errors::StoreError;
use crate::models::{ConsumeResult, NewToken, Page, Stats, TokenRecord};

/// In-process ticket store keyed by token value.
///
/// The shard write lock taken by `entry` / `get_mut` is the compare-and-swap
/// primitive, so the consume-once invariant holds across tasks of one process.
/// Not suitable for multi-instance deployments.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, TokenRecord>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &NewToken) -> Result<i64, StoreError> {
        match self.records.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateToken),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                slot.insert(TokenRecord {
                    id,
                    token: token.token.clone(),
                    label: token.label.clone(),
                    created_at: token.created_at,
                    used_at: None,
                });
                Ok(id)
            }
        }
    }

    async fn get(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.get(token).map(|r| r.value().clone()))
    }

    async fn try_consume(
        &self,
        token: &str,
        used_at: DateTime<Utc>,
    ) -> Result<ConsumeResult, StoreError> {
        let Some(mut record) = self.records.get_mut(token) else {
            return Ok(ConsumeResult::NotFound);
        };

        if record.used_at.is_some() {
            return Ok(ConsumeResult::AlreadyUsed(record.clone()));
        }

        record.used_at = Some(used_at);
        Ok(ConsumeResult::Consumed(record.clone()))
    }

    async fn count(&self) -> Result<Stats, StoreError> {
        let mut stats = Stats::default();
        for entry in self.records.iter() {
            stats.total += 1;
            if entry.used_at.is_some() {
                stats.used += 1;
            }
        }
        Ok(stats)
    }

    async fn list_page(&self, page: Page) -> Result<Vec<TokenRecord>, StoreError> {
        let mut rows: Vec<TokenRecord> = self
            .records
            .iter()
            .filter(|r| match (page.after, page.newest_first) {
                (None, _) => true,
                (Some(after), true) => r.id < after,
                (Some(after), false) => r.id > after,
            })
            .map(|r| r.value().clone())
            .collect();

        if page.newest_first {
            rows.sort_by(|a, b| b.id.cmp(&a.id));
        } else {
            rows.sort_by_key(|r| r.id);
        }
        rows.truncate(page.limit.max(0) as usize);
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

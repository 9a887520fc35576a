//! Read-only reporting over the token table.
//!
//! `rows()` is a keyset scan in pages of `page_size`, newest first. Every call
//! starts a fresh scan, so the sequence can be re-read as often as needed.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::errors::TicketError;
use crate::models::{Page, Stats, TokenRecord};
use crate::store::TokenStore;

pub const DEFAULT_PAGE_SIZE: i64 = 200;

pub const CSV_HEADER: &str = "token,url,label,created_at,used_at\r\n";

/// Maps a token to its public URL. Supplied by the presentation layer.
pub type UrlBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub token: String,
    pub url: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl ExportRow {
    pub fn from_record(record: TokenRecord, url: &(dyn Fn(&str) -> String + Send + Sync)) -> Self {
        Self {
            url: url(&record.token),
            token: record.token,
            label: record.label,
            created_at: record.created_at,
            used_at: record.used_at,
        }
    }

    /// One RFC 4180 line. Missing label / used_at render as empty fields.
    pub fn to_csv_line(&self) -> String {
        let fields = [
            csv_field(&self.token),
            csv_field(&self.url),
            csv_field(self.label.as_deref().unwrap_or("")),
            format_timestamp(&self.created_at),
            self.used_at.as_ref().map(format_timestamp).unwrap_or_default(),
        ];
        let mut line = fields.join(",");
        line.push_str("\r\n");
        line
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub stats: Stats,
    pub rows: Vec<ExportRow>,
}

#[derive(Clone)]
pub struct Exporter {
    store: Arc<dyn TokenStore>,
    url: UrlBuilder,
    page_size: i64,
}

impl Exporter {
    pub fn new(store: Arc<dyn TokenStore>, url: UrlBuilder) -> Self {
        Self {
            store,
            url,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn stats(&self) -> Result<Stats, TicketError> {
        Ok(self.store.count().await?)
    }

    /// All rows, newest first.
    pub fn rows(&self) -> BoxStream<'static, Result<ExportRow, TicketError>> {
        let store = self.store.clone();
        let url = self.url.clone();

        let pages = stream::try_unfold(
            Some(Page::first(self.page_size, true)),
            move |page| {
                let store = store.clone();
                async move {
                    let Some(page) = page else {
                        return Ok(None);
                    };
                    let records = store.list_page(page).await?;
                    let next = match records.last() {
                        Some(last) if records.len() as i64 >= page.limit => Some(page.next(last.id)),
                        _ => None,
                    };
                    Ok::<_, TicketError>(if records.is_empty() {
                        None
                    } else {
                        Some((records, next))
                    })
                }
            },
        );

        pages
            .map_ok(move |records| {
                let url = url.clone();
                stream::iter(
                    records
                        .into_iter()
                        .map(move |r| Ok::<_, TicketError>(ExportRow::from_record(r, &*url))),
                )
            })
            .try_flatten()
            .boxed()
    }

    /// Stats plus at most `limit` newest rows.
    pub async fn snapshot(&self, limit: usize) -> Result<Export, TicketError> {
        let stats = self.stats().await?;
        let rows = self.rows().take(limit).try_collect().await?;
        Ok(Export { stats, rows })
    }

    /// CSV document as a stream of chunks: header first, then one line per row.
    pub fn csv(&self) -> BoxStream<'static, Result<String, TicketError>> {
        stream::once(async { Ok::<_, TicketError>(CSV_HEADER.to_string()) })
            .chain(self.rows().map_ok(|row| row.to_csv_line()))
            .boxed()
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\r', '\n'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

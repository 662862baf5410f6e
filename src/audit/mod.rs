//! Audit trail of completed exchanges.
//!
//! One [`TrafficRecord`] per exchange, read back newest-first in pages.

pub mod memory;
pub mod sqlite;

pub use self::memory::MemoryAuditLog;
pub use self::sqlite::SqliteAuditLog;

use crate::error::AuditError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A record ready to be appended; the id is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficEntry {
    pub timestamp: String,
    pub client_ip: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub is_blocked: bool,
}

impl TrafficEntry {
    pub fn new(
        client_ip: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        status_code: u16,
        is_blocked: bool,
    ) -> Self {
        Self {
            timestamp: format_timestamp(Utc::now()),
            client_ip: client_ip.into(),
            method: method.into(),
            url: url.into(),
            status_code,
            is_blocked,
        }
    }
}

/// A stored record, as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficRecord {
    pub id: i64,
    pub timestamp: String,
    pub client_ip: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub is_blocked: bool,
}

impl TrafficRecord {
    fn from_entry(id: i64, entry: TrafficEntry) -> Self {
        Self {
            id,
            timestamp: entry.timestamp,
            client_ip: entry.client_ip,
            method: entry.method,
            url: entry.url,
            status_code: entry.status_code,
            is_blocked: entry.is_blocked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPage {
    #[serde(rename = "logs")]
    pub records: Vec<TrafficRecord>,
    pub total_pages: u64,
    pub current_page: u32,
}

pub trait AuditLog: Send + Sync {
    fn append(&self, entry: TrafficEntry) -> Result<(), AuditError>;

    /// 1-based page of records, newest first. Pages past the end are empty.
    fn page(&self, page: u32, page_size: u32) -> Result<LogPage, AuditError>;

    /// Deletes records whose timestamp sorts before `cutoff`.
    fn prune_before(&self, cutoff: &str) -> Result<usize, AuditError>;

    fn count(&self) -> Result<u64, AuditError>;
}

/// ISO-8601 UTC with microseconds; sorts lexicographically in time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamp `retention_hours` before now; records older than it are pruned.
/// An unrepresentable window yields "", which nothing sorts before.
pub fn retention_cutoff(retention_hours: u64) -> String {
    i64::try_from(retention_hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .map(format_timestamp)
        .unwrap_or_default()
}

pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64)
}

fn check_page(page: u32, page_size: u32) -> Result<u64, AuditError> {
    if page == 0 || page_size == 0 {
        return Err(AuditError::InvalidPage { page, page_size });
    }
    Ok((page as u64 - 1) * page_size as u64)
}

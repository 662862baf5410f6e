use super::{check_page, total_pages, AuditLog, LogPage, TrafficEntry};
use crate::db::DbClient;
use crate::error::AuditError;
use std::path::PathBuf;

/// Audit log persisted in SQLite.
pub struct SqliteAuditLog {
    db: DbClient,
}

impl SqliteAuditLog {
    /// Opens the database and creates the schema if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let db = DbClient::new(path);
        db.initialize()?;
        Ok(Self { db })
    }

    pub fn client(&self) -> &DbClient {
        &self.db
    }
}

impl AuditLog for SqliteAuditLog {
    fn append(&self, entry: TrafficEntry) -> Result<(), AuditError> {
        self.db.insert_record(&entry)?;
        Ok(())
    }

    fn page(&self, page: u32, page_size: u32) -> Result<LogPage, AuditError> {
        let offset = check_page(page, page_size)?;
        let (total, records) = self.db.select_page(page_size, offset)?;
        Ok(LogPage {
            records,
            total_pages: total_pages(total, page_size),
            current_page: page,
        })
    }

    fn prune_before(&self, cutoff: &str) -> Result<usize, AuditError> {
        Ok(self.db.prune_before(cutoff)?)
    }

    fn count(&self) -> Result<u64, AuditError> {
        Ok(self.db.count()?)
    }
}

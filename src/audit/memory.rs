use super::{check_page, total_pages, AuditLog, LogPage, TrafficEntry, TrafficRecord};
use crate::error::AuditError;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Bounded in-memory audit log, used when no database is configured.
/// Oldest records are evicted first; ids keep increasing across evictions.
pub struct MemoryAuditLog {
    inner: RwLock<Inner>,
    capacity: usize,
}

struct Inner {
    records: VecDeque<TrafficRecord>,
    next_id: i64,
}

impl MemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(capacity.min(1024)),
                next_id: 1,
            }),
            capacity,
        }
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: TrafficEntry) -> Result<(), AuditError> {
        let mut inner = self.inner.write();
        if inner.records.len() >= self.capacity {
            inner.records.pop_front();
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.records.push_back(TrafficRecord::from_entry(id, entry));
        Ok(())
    }

    fn page(&self, page: u32, page_size: u32) -> Result<LogPage, AuditError> {
        let offset = check_page(page, page_size)?;
        let inner = self.inner.read();
        let total = inner.records.len() as u64;

        let records = inner
            .records
            .iter()
            .rev()
            .skip(offset.min(total) as usize)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok(LogPage {
            records,
            total_pages: total_pages(total, page_size),
            current_page: page,
        })
    }

    fn prune_before(&self, cutoff: &str) -> Result<usize, AuditError> {
        let mut inner = self.inner.write();
        let before = inner.records.len();
        inner.records.retain(|r| r.timestamp.as_str() >= cutoff);
        Ok(before - inner.records.len())
    }

    fn count(&self) -> Result<u64, AuditError> {
        Ok(self.inner.read().records.len() as u64)
    }
}

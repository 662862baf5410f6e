use crate::audit::{TrafficEntry, TrafficRecord};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite access for the `traffic_logs` table.
///
/// Every call opens its own connection, so concurrent appends are serialized
/// by SQLite's locking rather than by a lock held in this process.
pub struct DbClient {
    db_path: PathBuf,
}

impl DbClient {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS traffic_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                client_ip TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                is_blocked BOOLEAN NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_traffic_timestamp ON traffic_logs(timestamp)",
            [],
        )?;

        info!("SQLite database initialized at {}", self.db_path.display());
        Ok(())
    }

    pub fn insert_record(&self, entry: &TrafficEntry) -> Result<i64> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "INSERT INTO traffic_logs (
                timestamp, client_ip, method, url, status_code, is_blocked
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        stmt.execute(params![
            entry.timestamp,
            entry.client_ip,
            entry.method,
            entry.url,
            entry.status_code,
            entry.is_blocked,
        ])?;

        Ok(conn.last_insert_rowid())
    }

    /// Total row count and one page of rows, newest id first, read under a
    /// single transaction so both agree.
    pub fn select_page(&self, limit: u32, offset: u64) -> Result<(u64, Vec<TrafficRecord>)> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let total: i64 = tx.query_row("SELECT COUNT(*) FROM traffic_logs", [], |r| r.get(0))?;

        // Offsets past the last row, including ones too large for SQLite's
        // signed OFFSET, yield an empty page.
        let offset = match i64::try_from(offset) {
            Ok(offset) if offset < total => offset,
            _ => {
                tx.commit()?;
                return Ok((total.max(0) as u64, Vec::new()));
            }
        };

        let records = {
            let mut stmt = tx.prepare(
                "SELECT id, timestamp, client_ip, method, url, status_code, is_blocked
                 FROM traffic_logs ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![limit as i64, offset], |row| {
                Ok(TrafficRecord {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    client_ip: row.get(2)?,
                    method: row.get(3)?,
                    url: row.get(4)?,
                    status_code: row.get(5)?,
                    is_blocked: row.get(6)?,
                })
            })?;
            rows.collect::<Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok((total.max(0) as u64, records))
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM traffic_logs", [], |r| r.get(0))?;
        Ok(total.max(0) as u64)
    }

    pub fn latest_id(&self) -> Result<Option<i64>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id FROM traffic_logs ORDER BY id DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()
    }

    pub fn prune_before(&self, cutoff: &str) -> Result<usize> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("DELETE FROM traffic_logs WHERE timestamp < ?1")?;
        stmt.execute(params![cutoff])
    }
}

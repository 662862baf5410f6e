use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

#[derive(Debug, Default)]
pub struct FilterStats {
    exchanges: AtomicU64,
    blocked: AtomicU64,
    audit_failures: AtomicU64,
    rule_reloads: AtomicU64,
    state_reloads: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub exchanges: u64,
    pub blocked: u64,
    pub audit_failures: u64,
    pub rule_reloads: u64,
    pub state_reloads: u64,
}

impl FilterStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_exchanges(&self) {
        self.exchanges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_audit_failures(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rule_reloads(&self) {
        self.rule_reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_state_reloads(&self) {
        self.state_reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            exchanges: self.exchanges.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            rule_reloads: self.rule_reloads.load(Ordering::Relaxed),
            state_reloads: self.state_reloads.load(Ordering::Relaxed),
        }
    }

    /// Logs a stats line every `log_interval`. Runs until the task is aborted.
    pub async fn run_logger(self: Arc<Self>, log_interval: Duration) {
        let mut interval = time::interval(log_interval);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    pub fn dump_stats(&self) {
        let s = self.snapshot();
        info!(
            "STATS DUMP: Exchanges: {}, Blocked: {} ({:.1}%), AuditFailures: {}, Reloads: rules={} state={}",
            s.exchanges,
            s.blocked,
            if s.exchanges > 0 {
                (s.blocked as f64 / s.exchanges as f64) * 100.0
            } else {
                0.0
            },
            s.audit_failures,
            s.rule_reloads,
            s.state_reloads
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = FilterStats::new();
        stats.inc_exchanges();
        stats.inc_exchanges();
        stats.inc_blocked();
        stats.inc_audit_failures();
        stats.inc_rule_reloads();

        let s = stats.snapshot();
        assert_eq!(s.exchanges, 2);
        assert_eq!(s.blocked, 1);
        assert_eq!(s.audit_failures, 1);
        assert_eq!(s.rule_reloads, 1);
        assert_eq!(s.state_reloads, 0);
        stats.dump_stats();
    }
}

//! Initialization helpers for the application startup.

use crate::audit::{retention_cutoff, AuditLog, MemoryAuditLog, SqliteAuditLog};
use crate::block_page::BlockPageRenderer;
use crate::config::Config;
use crate::engine::rules::ensure_rules_file;
use crate::engine::state::ensure_state_file;
use crate::engine::{FilterEngine, FilterStateStore, RuleStore};
use crate::notifier::ChangeNotifier;
use crate::stats::FilterStats;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    let result = if config.logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Creates the rule and state files with their defaults when absent.
pub fn bootstrap_files(config: &Config) -> Result<()> {
    if ensure_rules_file(&config.rules_path)? {
        info!("Created empty rule file at {}", config.rules_path.display());
    }
    if ensure_state_file(&config.state_path)? {
        info!(
            "Created state file at {} (filtering enabled)",
            config.state_path.display()
        );
    }
    Ok(())
}

/// Opens the configured audit sink.
pub fn init_audit_log(config: &Config) -> Result<Arc<dyn AuditLog>> {
    if config.uses_sqlite() {
        let log = SqliteAuditLog::open(&config.audit.sqlite_path).with_context(|| {
            format!(
                "Failed to open audit database {}",
                config.audit.sqlite_path.display()
            )
        })?;
        info!("Using SQLite audit log.");
        Ok(Arc::new(log))
    } else {
        info!(
            "Using in-memory audit log (capacity {}).",
            config.audit.memory_capacity
        );
        Ok(Arc::new(MemoryAuditLog::new(config.audit.memory_capacity)))
    }
}

/// Wires every component into one engine.
pub fn build_engine(config: &Config) -> Result<FilterEngine> {
    let notifier = ChangeNotifier::new();
    let rules = Arc::new(RuleStore::open(&config.rules_path));
    let state = Arc::new(FilterStateStore::open(&config.state_path, notifier));
    let renderer = Arc::new(BlockPageRenderer::load(&config.block_page_path));
    let audit = init_audit_log(config)?;

    info!(
        "Filter engine ready: {} domains, filtering {}.",
        rules.snapshot().len(),
        if state.snapshot().enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    Ok(FilterEngine::new(
        rules,
        state,
        renderer,
        audit,
        FilterStats::new(),
    ))
}

/// Deletes audit records older than the retention window once per hour.
pub fn spawn_retention_task(audit: Arc<dyn AuditLog>, retention_hours: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let audit = audit.clone();
            let cutoff = retention_cutoff(retention_hours);
            match tokio::task::spawn_blocking(move || audit.prune_before(&cutoff)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => info!("Pruned {} audit records older than {}h", n, retention_hours),
                Ok(Err(e)) => error!("Failed to prune old audit records: {}", e),
                Err(e) => error!("Retention task failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.rules_path = dir.join("config").join("blocked_domains.txt");
        config.state_path = dir.join("config").join("state.json");
        config.block_page_path = dir.join("templates").join("blocked_page.html");
        config.audit.sqlite_path = dir.join("argus.db");
        config
    }

    #[test]
    fn test_bootstrap_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        bootstrap_files(&config).unwrap();
        assert!(config.rules_path.exists());
        assert!(config.state_path.exists());

        let engine = build_engine(&config).unwrap();
        assert!(engine.rules().snapshot().is_empty());
        assert!(engine.state().snapshot().enabled);
    }

    #[test]
    fn test_memory_sink_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.audit.sink = "memory".to_string();

        let audit = init_audit_log(&config).unwrap();
        assert_eq!(audit.count().unwrap(), 0);
        assert!(!config.audit.sqlite_path.exists());
    }
}

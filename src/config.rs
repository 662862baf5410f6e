use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,

    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    #[serde(default = "default_block_page_path")]
    pub block_page_path: PathBuf,

    #[serde(default)]
    pub reload: ReloadConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReloadConfig {
    /// Background refresh period. Requests also refresh lazily.
    #[serde(default = "default_reload_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_audit_sink")]
    pub sink: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_rules_path() -> PathBuf {
    PathBuf::from("config/blocked_domains.txt")
}
fn default_state_path() -> PathBuf {
    PathBuf::from("config/state.json")
}
fn default_block_page_path() -> PathBuf {
    PathBuf::from("templates/blocked_page.html")
}
fn default_reload_interval_ms() -> u64 {
    1000
}
fn default_audit_sink() -> String {
    "sqlite".to_string()
}
fn default_sqlite_path() -> PathBuf {
    PathBuf::from("argus.db")
}
fn default_retention_hours() -> u64 {
    168 // 7 days
}
fn default_memory_capacity() -> usize {
    10_000
}
fn default_page_size() -> u32 {
    50
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_path: default_rules_path(),
            state_path: default_state_path(),
            block_page_path: default_block_page_path(),
            reload: ReloadConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_reload_interval_ms(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: default_audit_sink(),
            sqlite_path: default_sqlite_path(),
            retention_hours: default_retention_hours(),
            memory_capacity: default_memory_capacity(),
            page_size: default_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload.interval_ms.max(1))
    }

    pub fn uses_sqlite(&self) -> bool {
        self.audit.sink != "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_empty_document() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.rules_path, PathBuf::from("config/blocked_domains.txt"));
        assert_eq!(config.state_path, PathBuf::from("config/state.json"));
        assert_eq!(config.audit.page_size, 50);
        assert!(config.uses_sqlite());
        assert_eq!(config.reload_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            rules_path = "/etc/argus/rules.txt"

            [audit]
            sink = "memory"
            memory_capacity = 10

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.rules_path, PathBuf::from("/etc/argus/rules.txt"));
        assert!(!config.uses_sqlite());
        assert_eq!(config.audit.memory_capacity, 10);
        assert_eq!(config.audit.retention_hours, 168);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }
}

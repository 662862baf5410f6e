//! Read/write contract consumed by the dashboard.
//!
//! Rule edits rewrite the whole rule file and reload the rule store in this
//! process. Other processes pick the change up through the mtime check.

use crate::audit::{AuditLog, LogPage};
use crate::engine::rules::{normalize_domain, read_rules_file, write_rules_file};
use crate::engine::{FilterEngine, FilterStateStore, RuleStore};
use crate::error::{FilterError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

pub struct ControlPlane {
    rules: Arc<RuleStore>,
    state: Arc<FilterStateStore>,
    audit: Arc<dyn AuditLog>,
    // Serializes read-modify-write of the rule file within this process.
    rules_edit: Mutex<()>,
}

impl ControlPlane {
    pub fn new(
        rules: Arc<RuleStore>,
        state: Arc<FilterStateStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            rules,
            state,
            audit,
            rules_edit: Mutex::new(()),
        }
    }

    pub fn for_engine(engine: &FilterEngine) -> Self {
        Self::new(
            engine.rules().clone(),
            engine.state().clone(),
            engine.audit().clone(),
        )
    }

    /// Domains currently in the rule file, sorted.
    pub fn domains(&self) -> Result<Vec<String>> {
        read_rules_file(self.rules.path())
    }

    /// Adds a domain. Returns the normalized form that was stored.
    pub fn add_domain(&self, raw: &str) -> Result<String> {
        let domain = normalize_domain(raw).ok_or(FilterError::EmptyDomain)?;

        let _guard = self.rules_edit.lock();
        let mut domains = read_rules_file(self.rules.path())?;
        if domains.contains(&domain) {
            return Err(FilterError::DomainExists(domain));
        }
        domains.push(domain.clone());
        write_rules_file(self.rules.path(), &domains)?;
        self.rules.reload();

        info!("Domain added to block list: {}", domain);
        Ok(domain)
    }

    /// Removes a domain. Returns the normalized form that was removed.
    pub fn remove_domain(&self, raw: &str) -> Result<String> {
        let domain = normalize_domain(raw).ok_or(FilterError::EmptyDomain)?;

        let _guard = self.rules_edit.lock();
        let mut domains = read_rules_file(self.rules.path())?;
        let before = domains.len();
        domains.retain(|d| d != &domain);
        if domains.len() == before {
            return Err(FilterError::DomainNotFound(domain));
        }
        write_rules_file(self.rules.path(), &domains)?;
        self.rules.reload();

        info!("Domain removed from block list: {}", domain);
        Ok(domain)
    }

    pub fn filtering_enabled(&self) -> bool {
        self.state.state().enabled
    }

    pub fn set_filtering(&self, enabled: bool) -> Result<()> {
        self.state.set(enabled)
    }

    pub fn logs(&self, page: u32, per_page: u32) -> Result<LogPage> {
        Ok(self.audit.page(page, per_page)?)
    }
}

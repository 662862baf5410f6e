use super::matcher::HashedMatcher;
use super::source::{self, FileVersion};
use super::traits::DomainMatcher;
use crate::error::{FilterError, Result};
use arc_swap::ArcSwap;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info, warn};

const RULES_HEADER: &str =
    "# A.R.G.U.S. Blocked Domains List\n# This file is managed by the control plane.\n";

/// Immutable set of blocked domains plus the file revision it was read from.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    matcher: HashedMatcher,
    source: Option<FileVersion>,
}

impl RuleSnapshot {
    pub fn new(domains: FxHashSet<Box<str>>, source: Option<FileVersion>) -> Self {
        Self {
            matcher: HashedMatcher::new(domains),
            source,
        }
    }

    /// Modification time of the rule file this snapshot came from, if any.
    pub fn source_version(&self) -> Option<SystemTime> {
        self.source.map(|v| v.modified)
    }

    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.matcher.contains(domain)
    }

    pub fn domains(&self) -> Vec<String> {
        self.matcher.sorted()
    }

    /// Returns the rule that blocks `host`, if any.
    pub fn find_match(&self, host: &str) -> Option<&str> {
        self.matcher.check(host)
    }
}

/// Owns the current [`RuleSnapshot`] and swaps in a new one whenever the
/// rule file changes on disk.
pub struct RuleStore {
    path: PathBuf,
    current: ArcSwap<RuleSnapshot>,
}

impl RuleStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            current: ArcSwap::from_pointee(RuleSnapshot::default()),
        };
        store.refresh();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Refreshes from disk if needed and returns the current snapshot.
    pub fn rules(&self) -> Arc<RuleSnapshot> {
        self.refresh();
        self.current.load_full()
    }

    /// Current snapshot without touching the file system.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }

    /// Reloads the rule file when its fingerprint changed. Returns true if a
    /// new snapshot was published.
    pub fn refresh(&self) -> bool {
        self.reload_if(false)
    }

    /// Re-reads the rule file unconditionally.
    pub fn reload(&self) -> bool {
        self.reload_if(true)
    }

    fn reload_if(&self, force: bool) -> bool {
        let current = self.current.load();

        let version = match source::probe(&self.path) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to stat rule file {}: {}", self.path.display(), e);
                return false;
            }
        };

        let Some(version) = version else {
            return self.clear_if_loaded(&current);
        };

        if !force && current.source == Some(version) {
            return false;
        }

        match load_rules_file(&self.path) {
            Ok(domains) => {
                let snapshot = RuleSnapshot::new(domains, Some(version));
                info!("Rules reloaded. {} domains loaded.", snapshot.len());
                self.current.store(Arc::new(snapshot));
                true
            }
            Err(FilterError::ConfigMissing { .. }) => self.clear_if_loaded(&current),
            Err(e) => {
                // Keep the previous domains but remember this revision, so the
                // file is retried only after it changes again.
                error!("Failed to reload rules: {}", e);
                let snapshot = RuleSnapshot {
                    matcher: current.matcher.clone(),
                    source: Some(version),
                };
                self.current.store(Arc::new(snapshot));
                false
            }
        }
    }

    fn clear_if_loaded(&self, current: &RuleSnapshot) -> bool {
        if current.source.is_none() && current.is_empty() {
            return false;
        }
        warn!(
            "Rule file {} not found; no domains are blocked.",
            self.path.display()
        );
        self.current.store(Arc::new(RuleSnapshot::default()));
        true
    }
}

/// Normalizes a domain: trimmed, lowercase, no leading/trailing dots.
/// Returns `None` for anything that would be empty.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_matches('.').to_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

fn parse_line(line: &str) -> Option<Box<str>> {
    let line = line.trim();
    // Skip comments and empty lines
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    normalize_domain(line).map(String::into_boxed_str)
}

pub fn parse_rules(text: &str) -> FxHashSet<Box<str>> {
    text.lines().filter_map(parse_line).collect()
}

pub fn load_rules_file(path: &Path) -> Result<FxHashSet<Box<str>>> {
    let text = fs::read_to_string(path).map_err(|e| FilterError::from_read(path, e))?;
    Ok(parse_rules(&text))
}

/// Rules currently on disk, sorted. A missing file reads as empty.
pub fn read_rules_file(path: &Path) -> Result<Vec<String>> {
    match load_rules_file(path) {
        Ok(domains) => {
            let mut list: Vec<String> = domains.into_iter().map(String::from).collect();
            list.sort();
            Ok(list)
        }
        Err(FilterError::ConfigMissing { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Rewrites the whole rule file: header, then sorted, deduplicated, lowercase domains.
pub fn write_rules_file<I, S>(path: &Path, domains: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = domains
        .into_iter()
        .filter_map(|d| normalize_domain(d.as_ref()))
        .collect();

    let mut out = String::from(RULES_HEADER);
    for domain in &unique {
        out.push_str(domain);
        out.push('\n');
    }

    source::write_atomic(path, out.as_bytes()).map_err(|e| FilterError::io(path, e))?;
    Ok(())
}

/// Creates the rule file with only the comment header if it does not exist.
pub fn ensure_rules_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    source::write_atomic(path, RULES_HEADER.as_bytes()).map_err(|e| FilterError::io(path, e))?;
    Ok(true)
}

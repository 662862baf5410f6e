use super::source::{self, FileVersion};
use crate::error::{FilterError, Result};
use crate::notifier::{ChangeNotifier, FilteringStatusChanged};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info, warn};

/// On-disk shape of the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(default = "default_enabled")]
    filtering_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Immutable filtering flag plus the file revision it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterState {
    pub enabled: bool,
    source: Option<FileVersion>,
}

impl FilterState {
    fn new(enabled: bool, source: Option<FileVersion>) -> Self {
        Self { enabled, source }
    }

    pub fn source_version(&self) -> Option<SystemTime> {
        self.source.map(|v| v.modified)
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(true, None)
    }
}

/// Owns the global filtering-enabled flag, backed by a small JSON file.
pub struct FilterStateStore {
    path: PathBuf,
    current: ArcSwap<FilterState>,
    notifier: ChangeNotifier,
}

impl FilterStateStore {
    pub fn open(path: impl Into<PathBuf>, notifier: ChangeNotifier) -> Self {
        let store = Self {
            path: path.into(),
            current: ArcSwap::from_pointee(FilterState::default()),
            notifier,
        };
        store.refresh();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Refreshes from disk if needed and returns the current state.
    pub fn state(&self) -> FilterState {
        self.refresh();
        **self.current.load()
    }

    /// Current state without touching the file system.
    pub fn snapshot(&self) -> FilterState {
        **self.current.load()
    }

    /// Persists the flag, publishes it in memory immediately and notifies
    /// subscribers.
    pub fn set(&self, enabled: bool) -> Result<()> {
        let body = serde_json::to_string_pretty(&StateFile {
            filtering_enabled: enabled,
        })
        .map_err(|e| FilterError::ConfigParse {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let version = source::write_atomic(&self.path, body.as_bytes())
            .map_err(|e| FilterError::io(&self.path, e))?;

        self.current
            .store(Arc::new(FilterState::new(enabled, Some(version))));
        info!("Filtering state set. Enabled: {}", enabled);

        self.notifier.publish(FilteringStatusChanged {
            is_enabled: enabled,
        });
        Ok(())
    }

    /// Reloads the state file when its fingerprint changed. Returns true if a
    /// new state was published.
    pub fn refresh(&self) -> bool {
        let current = self.current.load();

        let version = match source::probe(&self.path) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to stat state file {}: {}", self.path.display(), e);
                return false;
            }
        };

        if current.source == version && version.is_some() {
            return false;
        }

        let next = match version {
            None => FilterState::default(),
            Some(version) => match load_state_file(&self.path) {
                Ok(enabled) => FilterState::new(enabled, Some(version)),
                Err(FilterError::ConfigMissing { .. }) => FilterState::default(),
                Err(e) => {
                    warn!("{}; filtering stays enabled.", e);
                    FilterState::new(true, Some(version))
                }
            },
        };

        if **current == next {
            return false;
        }
        info!("Filtering state reloaded. Enabled: {}", next.enabled);
        self.current.store(Arc::new(next));
        true
    }
}

/// Reads the flag from a state file. Missing keys default to enabled.
pub fn load_state_file(path: &Path) -> Result<bool> {
    let text = fs::read_to_string(path).map_err(|e| FilterError::from_read(path, e))?;
    parse_state(path, &text)
}

fn parse_state(path: &Path, text: &str) -> Result<bool> {
    serde_json::from_str::<StateFile>(text)
        .map(|s| s.filtering_enabled)
        .map_err(|e| FilterError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Creates the state file with filtering enabled if it does not exist.
pub fn ensure_state_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let body = serde_json::to_string_pretty(&StateFile {
        filtering_enabled: true,
    })
    .map_err(|e| FilterError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    source::write_atomic(path, body.as_bytes()).map_err(|e| FilterError::io(path, e))?;
    Ok(true)
}

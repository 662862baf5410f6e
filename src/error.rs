//! Error taxonomy for the filtering core.
//!
//! Configuration problems on the decision path (`ConfigMissing`, `ConfigParse`)
//! are produced by the file loaders and resolved to defaults by the stores.
//! Only control-plane writes and audit storage surface errors to callers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by rule/state handling and the control-plane write path.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A backing file (rules, state, template) does not exist.
    #[error("configuration file not found: {}", .path.display())]
    ConfigMissing { path: PathBuf },

    /// A backing file exists but could not be understood.
    #[error("failed to parse {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    /// Reading or writing a backing file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("domain '{0}' is already on the block list")]
    DomainExists(String),

    #[error("domain '{0}' is not on the block list")]
    DomainNotFound(String),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl FilterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FilterError::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a read error, turning `NotFound` into [`FilterError::ConfigMissing`].
    pub(crate) fn from_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            FilterError::ConfigMissing { path }
        } else {
            FilterError::Io { path, source }
        }
    }
}

/// Errors raised by audit storage.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Page number and page size are both 1-based and must be at least 1.
    #[error("invalid page request: page={page}, page_size={page_size}")]
    InvalidPage { page: u32, page_size: u32 },

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = FilterError> = std::result::Result<T, E>;

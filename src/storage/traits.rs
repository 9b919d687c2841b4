//! Storage traits and error types

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during artifact storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Identity of one artifact: `(site, logical name, date)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub site: String,
    pub logical_name: String,
    pub date: NaiveDate,
}

impl ArtifactKey {
    pub fn new(site: &str, logical_name: &str, date: NaiveDate) -> Self {
        Self {
            site: site.to_string(),
            logical_name: logical_name.to_string(),
            date,
        }
    }

    /// `<logical-name>_<YYYY-MM-DD>.html`
    pub fn file_name(&self) -> String {
        format!("{}_{}.html", self.logical_name, self.date.format("%Y-%m-%d"))
    }

    /// Rejects keys that would escape the artifact directory
    pub fn check(&self) -> StorageResult<()> {
        for part in [&self.site, &self.logical_name] {
            if part.is_empty()
                || part == "."
                || part == ".."
                || part.contains(['/', '\\', '\0'])
            {
                return Err(StorageError::InvalidKey(self.to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site, self.file_name())
    }
}

/// Trait for artifact store implementations
///
/// Keys are unique per page and run date, so implementations do not need to
/// lock: two writers never race on the same key within one run, and a key
/// that already exists is never overwritten.
pub trait ArtifactStore: Send + Sync {
    /// Cheap existence check; gates every fetch
    fn contains(&self, key: &ArtifactKey) -> bool;

    /// Reads an artifact, `None` if it was never written
    fn load(&self, key: &ArtifactKey) -> StorageResult<Option<String>>;

    /// Writes an artifact unless one already exists
    ///
    /// Returns `false` when an artifact was already present. A failed write
    /// must not leave a partial artifact behind.
    fn store(&self, key: &ArtifactKey, content: &str) -> StorageResult<bool>;
}

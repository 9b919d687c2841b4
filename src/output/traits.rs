//! Record sink trait and error types

use crate::model::Item;
use thiserror::Error;

/// Errors that can occur while writing records
///
/// Any of these aborts the run: dropping a scraped record silently is worse
/// than stopping.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Record writer lock poisoned")]
    Poisoned,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Append-only destination for items of one (site, date)
///
/// Implementations serialize concurrent appends so that rows never
/// interleave, and make each row durable before returning.
pub trait RecordSink: Send + Sync {
    /// Appends one record
    fn append(&self, item: &Item) -> SinkResult<()>;

    /// Number of records appended through this handle
    fn written(&self) -> u64;
}

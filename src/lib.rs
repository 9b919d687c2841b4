//! Shelfscan: a daily e-commerce listing crawler
//!
//! This crate discovers category pages from a site's top page, follows their
//! pagination, extracts product records with per-site selector rules and
//! appends them to a per-day CSV file. Raw pages are kept on disk so that an
//! interrupted run can be restarted without fetching anything twice.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Shelfscan operations
///
/// Only failures that make a run meaningless end up here. A page that cannot
/// be fetched is logged and counted in the run summary instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Seed page for site '{site}' could not be fetched after {attempts} attempts: {reason}")]
    SeedFetch {
        site: String,
        attempts: u32,
        reason: String,
    },

    #[error("Record sink failure: {0}")]
    Persistence(#[from] output::SinkError),

    #[error("Artifact storage failure: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch session error: {0}")]
    Session(#[from] crawler::FetchError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Unknown site: {0}")]
    UnknownSite(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid selector for {site}.{field}: {message}")]
    InvalidSelector {
        site: String,
        field: String,
        message: String,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Shelfscan operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::run_crawl;
pub use model::{Item, PageDescriptor};
pub use output::RunSummary;
pub use state::{CrawlRun, PageState};
pub use url::{logical_name, normalize_url};

//! Configuration module for Shelfscan
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration names the crawl limits, the output directories and one
//! `[[site]]` table per crawled site with its selector rules.
//!
//! # Example
//!
//! ```no_run
//! use shelfscan::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sites.toml")).unwrap();
//! println!("Crawling {} sites", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryRules, Config, CrawlerConfig, FieldRule, ItemRules, NextPageRules, OutputConfig,
    PaginationMode, SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

//! Per-run state for the crawler
//!
//! This module defines the outcome of each frontier entry and the `CrawlRun`
//! context that is handed to every operation of a run instead of process-wide
//! globals.

mod page_state;
mod run;

pub use page_state::PageState;
pub use run::CrawlRun;

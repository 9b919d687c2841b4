//! Output module for scraped records and run summaries
//!
//! This module handles:
//! - Appending product records to the per-site, per-day CSV file
//! - Tallying and printing the outcome of a crawl run

mod csv_sink;
mod summary;
mod traits;

pub use csv_sink::CsvRecordSink;
pub use summary::{print_summary, RunSummary};
pub use traits::{RecordSink, SinkError, SinkResult};

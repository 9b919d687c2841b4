//! Crawler module for page fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - The frontier of pages still to visit
//! - Fetching with bounded retries and artifact reuse
//! - Selector-driven extraction of categories, items and pagination
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;

pub use coordinator::{run_crawl, run_crawl_until, Coordinator};
pub use extractor::{Extractor, NextPage};
pub use fetcher::{
    build_http_client, ContentSource, FetchClient, FetchError, FetchFailure, FetchSession,
    FetchedPage, HttpFetchClient, HttpSession, ReadyCheck, RetryingFetcher,
};
pub use frontier::Frontier;

//! Crawler coordinator - main crawl orchestration logic
//!
//! This module runs one crawl of one site for one date:
//! - Fetching the top-level page and seeding the frontier with its categories
//! - Driving a pool of workers, each with its own fetch session
//! - Appending extracted items to the record sink
//! - Following pagination, by link or by activating a control
//! - Stopping on cancellation or at the run deadline
//!
//! A page that cannot be fetched is logged and counted, and the run goes on.
//! A failing record sink or artifact store ends the run with an error.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::{Extractor, NextPage};
use crate::crawler::fetcher::{
    FetchClient, FetchError, FetchFailure, FetchSession, FetchedPage, HttpFetchClient,
    RetryingFetcher,
};
use crate::model::PageDescriptor;
use crate::output::{CsvRecordSink, RecordSink, RunSummary};
use crate::state::{CrawlRun, PageState};
use crate::storage::{ArtifactStore, FsArtifactCache};
use crate::CrawlError;
use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
///
/// A coordinator performs a single run; its frontier is not reset between
/// calls to [`Coordinator::run`].
pub struct Coordinator<C: FetchClient> {
    crawler: CrawlerConfig,
    run: CrawlRun,
    client: C,
    extractor: Arc<Extractor>,
    store: Arc<dyn ArtifactStore>,
    sink: Arc<dyn RecordSink>,
    records_path: PathBuf,
    artifacts_dir: PathBuf,
    cancel: CancellationToken,
    processed: AtomicU64,
    click_unsupported: AtomicBool,
}

impl<C: FetchClient> Coordinator<C> {
    /// Prepares a run of `site_name` for `date`
    ///
    /// Compiles the site's rules and opens the record file of the day; the
    /// artifact cache lives under the configured HTML directory.
    pub fn new(config: &Config, site_name: &str, date: NaiveDate, client: C) -> Result<Self, CrawlError> {
        let site = config
            .site(site_name)
            .ok_or_else(|| CrawlError::UnknownSite(site_name.to_string()))?
            .clone();
        let extractor = Arc::new(Extractor::new(&site)?);

        let cache = FsArtifactCache::new(&config.output.html_dir);
        let artifacts_dir = cache.site_dir(&site.name);
        let sink = CsvRecordSink::open(Path::new(&config.output.csv_dir), &site.name, date)?;
        let records_path = sink.path().to_path_buf();

        Ok(Self {
            crawler: config.crawler.clone(),
            run: CrawlRun::new(Arc::new(site), date),
            client,
            extractor,
            store: Arc::new(cache),
            sink: Arc::new(sink),
            records_path,
            artifacts_dir,
            cancel: CancellationToken::new(),
            processed: AtomicU64::new(0),
            click_unsupported: AtomicBool::new(false),
        })
    }

    /// Sends records to `sink` instead of the CSV file
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Stops the run when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// State of the run, including its frontier
    pub fn crawl_run(&self) -> &CrawlRun {
        &self.run
    }

    /// Runs the crawl until the frontier is drained or the run is stopped
    pub async fn run(&self) -> Result<RunSummary, CrawlError> {
        let site = self.run.site();
        let date = self.run.date();
        // Deadline cancellation stays local to this run
        let cancel = self.cancel.child_token();
        let written_before = self.sink.written();

        tracing::info!("Starting crawl of {} for {}", site.name, date);

        let watchdog = self.crawler.run_deadline_secs.map(|secs| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!("Run deadline of {}s reached, stopping", secs);
                token.cancel();
            })
        });

        let result = self.crawl(&cancel).await;
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let (states, categories_discovered) = result?;

        let mut summary = RunSummary {
            site: site.name.clone(),
            date,
            items_written: self.sink.written().saturating_sub(written_before),
            pages_by_state: HashMap::new(),
            categories_discovered,
            cancelled: cancel.is_cancelled(),
            elapsed: self.run.started().elapsed(),
            records_path: self.records_path.clone(),
            artifacts_dir: self.artifacts_dir.clone(),
        };
        for state in states {
            summary.record(state);
        }

        tracing::info!(
            "Crawl of {} finished: {} items, {} pages visited, {} failed in {:?}",
            summary.site,
            summary.items_written,
            summary.pages_visited(),
            summary.pages_failed(),
            summary.elapsed
        );

        Ok(summary)
    }

    /// Seeds the frontier and drains it with the worker pool
    ///
    /// Returns the final state of every page taken from the frontier and
    /// the number of categories found on the top-level page.
    async fn crawl(&self, cancel: &CancellationToken) -> Result<(Vec<PageState>, usize), CrawlError> {
        let site = self.run.site();
        let frontier = self.run.frontier();

        let ready = Arc::clone(&self.extractor);
        let fetcher = RetryingFetcher::new(
            Arc::clone(&self.store),
            &site.name,
            self.run.date(),
            Duration::from_millis(self.crawler.fetch_timeout_ms),
            Duration::from_millis(self.crawler.retry_delay_ms),
        )
        .with_ready_check(move |content| ready.is_ready(content))
        .with_cancellation(cancel.clone());

        let mut sessions = Vec::new();
        for _ in 0..self.crawler.max_workers.max(1) {
            sessions.push(self.client.open_session().await?);
        }

        let seed = PageDescriptor::seed(&site.base_url, &site.seed_name)?;
        frontier.reserve_name(&seed);
        let top_page = match fetcher
            .fetch(&mut sessions[0], &seed, self.crawler.seed_attempt_limit)
            .await
        {
            Ok(page) => page,
            Err(FetchFailure::Exhausted {
                attempts,
                last_error,
                ..
            }) => {
                return Err(CrawlError::SeedFetch {
                    site: site.name.clone(),
                    attempts,
                    reason: last_error.to_string(),
                })
            }
            Err(FetchFailure::Cancelled { .. }) => {
                tracing::warn!("Crawl of {} cancelled before categories were known", site.name);
                return Ok((Vec::new(), 0));
            }
            Err(FetchFailure::Storage(e)) => return Err(e.into()),
        };

        let categories = frontier.seed(&top_page.content, &self.extractor);
        if categories.is_empty() {
            tracing::warn!("No categories found on the top-level page of {}", site.name);
        } else {
            tracing::info!("Discovered {} categories on {}", categories.len(), site.name);
        }

        let workers = sessions
            .into_iter()
            .enumerate()
            .map(|(id, session)| self.worker(id, session, &fetcher, cancel));
        let results = join_all(workers).await;

        let mut states = Vec::new();
        for result in results {
            states.extend(result?);
        }

        let leftover = frontier.drain_pending();
        if !leftover.is_empty() {
            tracing::warn!("{} pages of {} were never visited", leftover.len(), site.name);
            states.extend(leftover.iter().map(|_| PageState::Abandoned));
        }

        Ok((states, categories.len()))
    }

    /// Takes pages from the frontier until it is drained or closed
    async fn worker(
        &self,
        id: usize,
        mut session: C::Session,
        fetcher: &RetryingFetcher,
        cancel: &CancellationToken,
    ) -> Result<Vec<PageState>, CrawlError> {
        let frontier = self.run.frontier();
        let mut states = Vec::new();

        while let Some(page) = frontier.next_task().await {
            if cancel.is_cancelled() {
                frontier.close();
                frontier.complete();
                states.push(PageState::Abandoned);
                break;
            }

            tracing::debug!("Worker {} processing {}", id, page);
            let outcome = self.process_page(&mut session, &page, fetcher).await;

            match outcome {
                Ok(state) => {
                    if state == PageState::Abandoned {
                        frontier.close();
                    }
                    frontier.complete();
                    states.push(state);
                }
                Err(e) => {
                    tracing::error!("Stopping crawl of {}: {}", self.run.site_name(), e);
                    frontier.close();
                    frontier.complete();
                    cancel.cancel();
                    return Err(e);
                }
            }

            let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
            if processed % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages processed, {} in frontier",
                    processed,
                    frontier.pending_len()
                );
            }
        }

        Ok(states)
    }

    /// Fetches one page, records its items and queues its continuation
    async fn process_page(
        &self,
        session: &mut C::Session,
        page: &PageDescriptor,
        fetcher: &RetryingFetcher,
    ) -> Result<PageState, CrawlError> {
        let fetched = match fetcher.fetch(session, page, self.crawler.attempt_limit).await {
            Ok(fetched) => fetched,
            Err(FetchFailure::Exhausted {
                attempts,
                last_error,
                ..
            }) => {
                tracing::warn!(
                    "Cannot download {} after {} attempts: {}",
                    page,
                    attempts,
                    last_error
                );
                return Ok(PageState::Failed);
            }
            Err(FetchFailure::Cancelled { .. }) => return Ok(PageState::Abandoned),
            Err(FetchFailure::Storage(e)) => return Err(e.into()),
        };

        let items = self
            .extractor
            .extract_items(&fetched.content, page, self.run.date());
        for item in &items {
            self.sink.append(item)?;
        }
        tracing::debug!("{} items from {}", items.len(), page);

        match self.extractor.extract_next_page(&fetched.content, page) {
            Some(NextPage::Page(next)) => self.enqueue(next),
            Some(NextPage::Control { selector, dismiss }) => {
                if let Some(next) = self
                    .follow_control(session, page, &fetched, &selector, dismiss.as_deref())
                    .await
                {
                    self.enqueue(next);
                }
            }
            None => {}
        }

        Ok(if fetched.from_cache() {
            PageState::Reused
        } else {
            PageState::Fetched
        })
    }

    fn enqueue(&self, next: PageDescriptor) {
        let description = next.to_string();
        if self.run.frontier().enqueue_if_new(next) {
            tracing::debug!("Queued {}", description);
        } else {
            tracing::debug!("Already visited {}", description);
        }
    }

    /// Activates the next-page control in the session that shows `page`
    ///
    /// Returns the continuation if the session moved to a new URL.
    async fn follow_control(
        &self,
        session: &mut C::Session,
        page: &PageDescriptor,
        fetched: &FetchedPage,
        selector: &str,
        dismiss: Option<&str>,
    ) -> Option<PageDescriptor> {
        let timeout = Duration::from_millis(self.crawler.fetch_timeout_ms);

        // Content reused from the cache was never loaded into this session
        if fetched.from_cache() {
            match tokio::time::timeout(timeout, session.render(&page.fetch_url)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.report_click_failure(page, &e);
                    return None;
                }
                Err(_) => {
                    tracing::warn!("Timed out reloading {} for pagination", page);
                    return None;
                }
            }
        }

        if let Some(dismiss) = dismiss {
            if let Ok(Err(e)) = tokio::time::timeout(timeout, session.click_control(dismiss)).await {
                tracing::debug!("No overlay dismissed on {}: {}", page, e);
            }
        }

        let url = match tokio::time::timeout(timeout, session.click_control(selector)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                self.report_click_failure(page, &e);
                return None;
            }
            Err(_) => {
                tracing::warn!("Timed out activating '{}' on {}", selector, page);
                return None;
            }
        };

        let next = match page.continuation(url) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("Pagination of {} led to an unusable URL: {}", page, e);
                return None;
            }
        };

        if next.key() == page.key() {
            tracing::debug!("Last page reached at {}", page);
            return None;
        }
        if !self.extractor.is_on_site(&next.canonical_url) {
            tracing::warn!("Pagination of {} left the site: {}", page, next.canonical_url);
            return None;
        }

        Some(next)
    }

    fn report_click_failure(&self, page: &PageDescriptor, error: &FetchError) {
        if matches!(error, FetchError::Unsupported(_)) {
            if !self.click_unsupported.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    "{} paginates by clicking, which this fetch client cannot do: {}",
                    self.run.site_name(),
                    error
                );
            }
        } else {
            tracing::warn!("Cannot paginate past {}: {}", page, error);
        }
    }
}

/// Runs one crawl of `site_name` for `date` over plain HTTP
pub async fn run_crawl(config: &Config, site_name: &str, date: NaiveDate) -> Result<RunSummary, CrawlError> {
    run_crawl_until(config, site_name, date, CancellationToken::new()).await
}

/// Like [`run_crawl`], stopping early when `cancel` fires
pub async fn run_crawl_until(
    config: &Config,
    site_name: &str,
    date: NaiveDate,
    cancel: CancellationToken,
) -> Result<RunSummary, CrawlError> {
    let client = HttpFetchClient::new(
        &config.user_agent,
        Duration::from_millis(config.crawler.fetch_timeout_ms),
    )?;

    Coordinator::new(config, site_name, date, client)?
        .with_cancellation(cancel)
        .run()
        .await
}

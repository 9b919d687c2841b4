//! Page fetching
//!
//! This module handles everything between a page descriptor and its markup:
//! - The fetch-client seam: sessions that render a URL and, for interactive
//!   sites, activate controls on the loaded page
//! - A plain HTTP client for sites that render server side
//! - The retrying fetcher, which consults the artifact cache, bounds every
//!   attempt by a timeout and stores successful fetches

use crate::config::UserAgentConfig;
use crate::model::PageDescriptor;
use crate::storage::{ArtifactKey, ArtifactStore, StorageError};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A single fetch attempt failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("{url} did not render within {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("{url} rendered an empty document")]
    EmptyDocument { url: String },

    #[error("{url} rendered without the expected root element")]
    MissingRoot { url: String },

    #[error("Not supported by this fetch client: {0}")]
    Unsupported(String),

    #[error("Session error: {0}")]
    Session(String),
}

/// One browsing context
///
/// A session keeps the state of the page it loaded last; interactive
/// pagination clicks through the page the same session rendered.
#[async_trait]
pub trait FetchSession: Send {
    /// Loads a URL and returns the markup of its root document
    async fn render(&mut self, url: &Url) -> Result<String, FetchError>;

    /// Activates the control matching `selector` on the loaded page
    ///
    /// Returns the URL the session shows afterwards.
    async fn click_control(&mut self, selector: &str) -> Result<Url, FetchError> {
        Err(FetchError::Unsupported(format!(
            "cannot activate '{}' without a rendering session",
            selector
        )))
    }
}

/// Opens fetch sessions
#[async_trait]
pub trait FetchClient: Send + Sync {
    type Session: FetchSession;

    async fn open_session(&self) -> Result<Self::Session, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound for a whole request
///
/// # Example
///
/// ```no_run
/// use shelfscan::config::UserAgentConfig;
/// use shelfscan::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "Shelfscan".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch client for sites whose listings render server side
#[derive(Debug, Clone)]
pub struct HttpFetchClient {
    client: Client,
}

impl HttpFetchClient {
    pub fn new(config: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, timeout)?,
        })
    }
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    type Session = HttpSession;

    async fn open_session(&self) -> Result<HttpSession, FetchError> {
        Ok(HttpSession {
            client: self.client.clone(),
        })
    }
}

/// Session over a shared HTTP connection pool
///
/// Controls cannot be activated; sites paginated by clicking need a
/// rendering fetch client.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn render(&mut self, url: &Url) -> Result<String, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Where the content of a fetched page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Network,
    Cache,
}

/// Markup of a page, fresh or reused
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub content: String,
    pub source: ContentSource,

    /// Attempts spent on the network; 0 when reused from the cache
    pub attempts: u32,
}

impl FetchedPage {
    pub fn from_cache(&self) -> bool {
        self.source == ContentSource::Cache
    }
}

/// Why the retrying fetcher gave up on a page
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// Every attempt failed; the page is skipped for this run
    #[error("{url} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: FetchError,
    },

    /// The run was cancelled while the page was being fetched
    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },

    /// The artifact cache could not be read or written
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Validates fetched markup before it is accepted
pub type ReadyCheck = dyn Fn(&str) -> bool + Send + Sync;

/// Fetches pages with bounded retries, reusing artifacts of the same date
pub struct RetryingFetcher {
    store: Arc<dyn ArtifactStore>,
    site: String,
    date: NaiveDate,
    timeout: Duration,
    retry_delay: Duration,
    ready: Box<ReadyCheck>,
    cancel: CancellationToken,
}

impl RetryingFetcher {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        site: &str,
        date: NaiveDate,
        timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            site: site.to_string(),
            date,
            timeout,
            retry_delay,
            ready: Box::new(|content| !content.trim().is_empty()),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the check a rendered document has to pass
    pub fn with_ready_check(mut self, ready: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.ready = Box::new(ready);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn artifact_key(&self, page: &PageDescriptor) -> ArtifactKey {
        ArtifactKey::new(&self.site, &page.logical_name, self.date)
    }

    /// Returns the markup of `page`, from the cache or the network
    ///
    /// An artifact already stored for the page and date is returned without
    /// contacting the session. Otherwise up to `attempt_limit` attempts are
    /// made, each bounded by the fetch timeout; the first complete document
    /// is stored before it is returned.
    pub async fn fetch<S>(
        &self,
        session: &mut S,
        page: &PageDescriptor,
        attempt_limit: u32,
    ) -> Result<FetchedPage, FetchFailure>
    where
        S: FetchSession + ?Sized,
    {
        let key = self.artifact_key(page);
        if self.store.contains(&key) {
            if let Some(content) = self.store.load(&key)? {
                tracing::debug!("Already downloaded {}", key);
                return Ok(FetchedPage {
                    content,
                    source: ContentSource::Cache,
                    attempts: 0,
                });
            }
        }

        let url = page.fetch_url.as_str().to_string();
        let attempt_limit = attempt_limit.max(1);
        let mut last_error = FetchError::Session("no attempt made".to_string());

        for attempt in 1..=attempt_limit {
            let rendered = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(FetchFailure::Cancelled { url });
                }
                rendered = tokio::time::timeout(self.timeout, session.render(&page.fetch_url)) => rendered,
            };

            let outcome = match rendered {
                Ok(Ok(content)) => self.check(&url, content),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(FetchError::Timeout {
                    url: url.clone(),
                    after: self.timeout,
                }),
            };

            match outcome {
                Ok(content) => {
                    if !self.store.store(&key, &content)? {
                        tracing::debug!("Artifact {} appeared during the fetch, kept existing", key);
                    }
                    tracing::info!("Downloaded {} (attempt {}/{})", key, attempt, attempt_limit);
                    return Ok(FetchedPage {
                        content,
                        source: ContentSource::Network,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    tracing::warn!("Attempt {}/{} for {} failed: {}", attempt, attempt_limit, url, e);
                    last_error = e;
                }
            }

            if attempt < attempt_limit && !self.retry_delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        return Err(FetchFailure::Cancelled { url });
                    }
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        Err(FetchFailure::Exhausted {
            url,
            attempts: attempt_limit,
            last_error,
        })
    }

    fn check(&self, url: &str, content: String) -> Result<String, FetchError> {
        if content.trim().is_empty() {
            return Err(FetchError::EmptyDocument { url: url.to_string() });
        }
        if !(self.ready)(&content) {
            return Err(FetchError::MissingRoot { url: url.to_string() });
        }
        Ok(content)
    }
}

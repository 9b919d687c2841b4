use serde::Deserialize;

/// Main configuration structure for Shelfscan
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Looks up a site by name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Attempts per category or pagination page
    #[serde(rename = "attempt-limit", default = "default_attempt_limit")]
    pub attempt_limit: u32,

    /// Attempts for the top-level page categories are discovered from
    #[serde(rename = "seed-attempt-limit", default = "default_seed_attempt_limit")]
    pub seed_attempt_limit: u32,

    /// Pause between two attempts on the same page (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout of a single fetch attempt (milliseconds)
    #[serde(rename = "fetch-timeout-ms", default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Wall-clock budget for a whole run (seconds)
    #[serde(rename = "run-deadline-secs", default)]
    pub run_deadline_secs: Option<u64>,

    /// Number of workers, each with its own fetch session
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            attempt_limit: default_attempt_limit(),
            seed_attempt_limit: default_seed_attempt_limit(),
            retry_delay_ms: default_retry_delay_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            run_deadline_secs: None,
            max_workers: default_max_workers(),
        }
    }
}

fn default_attempt_limit() -> u32 {
    5
}

fn default_seed_attempt_limit() -> u32 {
    25
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_max_workers() -> u32 {
    1
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for raw page artifacts
    #[serde(rename = "html-dir")]
    pub html_dir: String,

    /// Root directory for per-day record files
    #[serde(rename = "csv-dir")]
    pub csv_dir: String,
}

/// One crawled site and its extraction rules
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Short identifier used in file names (e.g. "dichonhanh")
    pub name: String,

    /// Top-level page categories are discovered from
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Host pattern discovered links must match (e.g. "*.lazada.vn")
    #[serde(default)]
    pub domain: Option<String>,

    /// Element that must be present for a fetched page to count as rendered
    #[serde(rename = "ready-selector", default)]
    pub ready_selector: Option<String>,

    /// Logical name of the top-level page artifact
    #[serde(rename = "seed-name", default = "default_seed_name")]
    pub seed_name: String,

    pub categories: CategoryRules,

    pub items: ItemRules,

    #[serde(rename = "next-page", default)]
    pub next_page: Option<NextPageRules>,
}

fn default_seed_name() -> String {
    "All_cat".to_string()
}

/// How category links are found on the top-level page
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRules {
    /// Selector matching the category `<a>` elements
    pub selector: String,

    /// Attribute holding the human-readable label; element text otherwise
    #[serde(rename = "label-attr", default)]
    pub label_attr: Option<String>,
}

/// How product blocks and their fields are found on a listing page
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRules {
    /// Wrapper that must exist for the page to have a product list at all
    #[serde(default)]
    pub container: Option<String>,

    /// Selector matching one product block
    pub selector: String,

    #[serde(default)]
    pub name: Option<FieldRule>,

    #[serde(default)]
    pub price: Option<FieldRule>,

    #[serde(rename = "old-price", default)]
    pub old_price: Option<FieldRule>,

    #[serde(default)]
    pub id: Option<FieldRule>,
}

/// A single field inside a product block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldRule {
    /// Sub-selector relative to the block; the block itself when absent
    #[serde(default)]
    pub selector: Option<String>,

    /// Attribute to read; trimmed text content when absent
    #[serde(default)]
    pub attr: Option<String>,
}

/// How the continuation of a listing is found
#[derive(Debug, Clone, Deserialize)]
pub struct NextPageRules {
    /// Selector matching the "next page" control
    pub selector: String,

    #[serde(default)]
    pub mode: PaginationMode,

    /// Overlay to close before activating the control
    #[serde(default)]
    pub dismiss: Option<String>,
}

/// Pagination styles supported by the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// The control is a link; its `href` is resolved against the current page
    #[default]
    Link,
    /// The control must be activated in the fetch session to reveal the URL
    Click,
}

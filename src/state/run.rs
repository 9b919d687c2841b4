use crate::config::SiteConfig;
use crate::crawler::Frontier;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;

/// One execution for one site on one calendar date
///
/// The date is fixed when the run is created and never re-read from the
/// clock, so a run that crosses midnight keeps writing to the same files. The
/// frontier is the only mutable part and is owned here.
#[derive(Debug)]
pub struct CrawlRun {
    site: Arc<SiteConfig>,
    date: NaiveDate,
    frontier: Frontier,
    started: Instant,
}

impl CrawlRun {
    /// Creates a run with an empty frontier
    pub fn new(site: Arc<SiteConfig>, date: NaiveDate) -> Self {
        Self {
            site,
            date,
            frontier: Frontier::new(),
            started: Instant::now(),
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn site_name(&self) -> &str {
        &self.site.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

//! Run summary
//!
//! This module tallies the outcome of a crawl run and prints it.

use crate::state::PageState;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of one crawl run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub site: String,
    pub date: NaiveDate,

    /// Records appended to the record file during this run
    pub items_written: u64,

    /// Count of frontier entries by final state
    pub pages_by_state: HashMap<PageState, u64>,

    /// Distinct category pages found on the top-level page
    pub categories_discovered: usize,

    /// True if the run stopped early (Ctrl-C or deadline)
    pub cancelled: bool,

    pub elapsed: Duration,

    /// Record file written by this run
    pub records_path: PathBuf,

    /// Directory holding this site's artifacts
    pub artifacts_dir: PathBuf,
}

impl RunSummary {
    pub fn count(&self, state: PageState) -> u64 {
        self.pages_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Pages whose content reached extraction, fresh or reused
    pub fn pages_visited(&self) -> u64 {
        self.pages_by_state
            .iter()
            .filter(|(state, _)| state.is_visited())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn pages_failed(&self) -> u64 {
        self.count(PageState::Failed)
    }

    pub fn pages_reused(&self) -> u64 {
        self.count(PageState::Reused)
    }

    pub(crate) fn record(&mut self, state: PageState) {
        *self.pages_by_state.entry(state).or_insert(0) += 1;
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== {} ({}) ===", summary.site, summary.date);

    println!("  Categories discovered: {}", summary.categories_discovered);
    println!("  Items written: {}", summary.items_written);
    println!(
        "  Pages visited: {} ({} from cache)",
        summary.pages_visited(),
        summary.pages_reused()
    );
    println!("  Pages failed: {}", summary.pages_failed());

    for state in PageState::all_states() {
        let count = summary.count(state);
        if count > 0 {
            println!("    {}: {}", state, count);
        }
    }
    if summary.cancelled {
        println!("  Run stopped before the frontier was drained");
    }

    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Records: {}", summary.records_path.display());
    println!("  Artifacts: {}", summary.artifacts_dir.display());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut summary = RunSummary {
            site: "dichonhanh".to_string(),
            date: NaiveDate::from_ymd_opt(2018, 6, 1).unwrap(),
            items_written: 3,
            pages_by_state: HashMap::new(),
            categories_discovered: 1,
            cancelled: false,
            elapsed: Duration::from_secs(2),
            records_path: PathBuf::from("csv/dichonhanh/dichonhanh_2018-06-01.csv"),
            artifacts_dir: PathBuf::from("html/dichonhanh"),
        };

        summary.record(PageState::Fetched);
        summary.record(PageState::Reused);
        summary.record(PageState::Reused);
        summary.record(PageState::Failed);

        assert_eq!(summary.pages_visited(), 3);
        assert_eq!(summary.pages_reused(), 2);
        assert_eq!(summary.pages_failed(), 1);
        assert_eq!(summary.count(PageState::Abandoned), 0);
    }
}

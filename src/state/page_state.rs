use std::fmt;

/// Outcome of one frontier entry
///
/// Every descriptor popped from the frontier ends in exactly one of these
/// states; the run summary is a tally of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    /// Fetched from the network and extracted
    Fetched,

    /// Served from an artifact written earlier the same day, then extracted
    Reused,

    /// Every attempt failed; the page and anything reachable only through it
    /// were skipped
    Failed,

    /// Left unprocessed, dequeued or still queued, because the run was
    /// cancelled or ran out of time
    Abandoned,
}

impl PageState {
    /// Returns true if the page's content reached the extraction pipeline
    pub fn is_visited(&self) -> bool {
        matches!(self, Self::Fetched | Self::Reused)
    }

    /// Short lowercase name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Reused => "reused",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> [Self; 4] {
        [Self::Fetched, Self::Reused, Self::Failed, Self::Abandoned]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Frontier manager
//!
//! The frontier is the set of pages a run still has to visit plus the set of
//! canonical URLs it has ever accepted. A URL is accepted at most once per
//! run, so a pagination cycle cannot keep a run alive.
//!
//! Pending pages are handed out in discovery order (FIFO). Workers take pages
//! with [`Frontier::next_task`] and report back with [`Frontier::complete`];
//! the frontier counts pages in flight so that an idle worker waits while
//! another one may still discover continuation pages.
//!
//! Each logical name belongs to one canonical URL per run. A page whose name
//! is already taken is renamed with a digest of its canonical URL before it
//! is queued, so two pages never share an artifact.

use crate::crawler::Extractor;
use crate::model::PageDescriptor;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct FrontierState {
    /// Canonical URLs ever accepted, in acceptance order
    accepted: Vec<String>,
    visited: HashSet<String>,
    /// Logical name to the canonical URL that owns it
    names: HashMap<String, String>,
    pending: VecDeque<PageDescriptor>,
    in_flight: usize,
    closed: bool,
}

/// Pending pages and the visited set of one crawl run
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // The state stays consistent across a panicking holder
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds the frontier from a site's top-level page
    ///
    /// Returns the category pages that were newly accepted, in the order they
    /// appear on the page.
    pub fn seed(&self, top_page: &str, extractor: &Extractor) -> Vec<PageDescriptor> {
        extractor
            .extract_categories(top_page)
            .into_iter()
            .filter(|page| self.enqueue_if_new(page.clone()))
            .collect()
    }

    /// Accepts a page unless its canonical URL was accepted before
    ///
    /// Returns true if the page was added to the pending queue.
    pub fn enqueue_if_new(&self, page: PageDescriptor) -> bool {
        let mut state = self.lock();
        if state.closed || state.visited.contains(page.key()) {
            return false;
        }

        let key = page.key().to_string();
        let page = match state.names.get(&page.logical_name) {
            Some(owner) if *owner != key => {
                let renamed = page.with_qualified_name();
                tracing::debug!(
                    "Name clash with {}, storing {} as {}",
                    owner,
                    key,
                    renamed.logical_name
                );
                renamed
            }
            _ => page,
        };
        state.names.insert(page.logical_name.clone(), key.clone());
        state.visited.insert(key.clone());
        state.accepted.push(key);
        state.pending.push_back(page);
        drop(state);

        self.changed.notify_waiters();
        true
    }

    /// Claims the logical name of a page that is fetched outside the queue
    ///
    /// The top-level page is stored under a fixed name; claiming it keeps a
    /// category from landing on the same artifact.
    pub fn reserve_name(&self, page: &PageDescriptor) {
        self.lock()
            .names
            .insert(page.logical_name.clone(), page.key().to_string());
    }

    /// Takes the oldest pending page without tracking it as in flight
    pub fn next(&self) -> Option<PageDescriptor> {
        self.lock().pending.pop_front()
    }

    /// Waits for the next page to process
    ///
    /// Returns `None` once the queue is empty and no page is in flight, or
    /// after the frontier was closed. Every page returned here must be
    /// reported back with [`Frontier::complete`].
    pub async fn next_task(&self) -> Option<PageDescriptor> {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            // Register before inspecting the state so no wakeup is lost
            changed.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(page) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(page);
                }
                if state.in_flight == 0 {
                    drop(state);
                    self.changed.notify_waiters();
                    return None;
                }
            }

            changed.await;
        }
    }

    /// Reports that a page handed out by [`Frontier::next_task`] is done
    pub fn complete(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.changed.notify_waiters();
    }

    /// Stops handing out pages and rejects further discoveries
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Removes and returns every page that was never handed out
    pub fn drain_pending(&self) -> Vec<PageDescriptor> {
        self.lock().pending.drain(..).collect()
    }

    /// True if the canonical URL was accepted during this run
    pub fn contains(&self, key: &str) -> bool {
        self.lock().visited.contains(key)
    }

    /// Canonical URLs accepted so far, in acceptance order
    pub fn visited(&self) -> Vec<String> {
        self.lock().accepted.clone()
    }

    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }
}

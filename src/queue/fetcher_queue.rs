use super::ScoredItem;
use crate::grouping::{CrawlDelay, TargetKey};
use crate::policy::FetchPolicy;
use std::collections::BinaryHeap;
use std::mem;
use std::sync::Arc;

/// Lifecycle of a queue at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepting items, nothing releasable yet
    Filling,
    /// A batch may be drawn now
    Ready,
    /// No more input; waiting for delay or claims to finish
    Draining,
    /// No more input, empty and unclaimed
    Done,
}

/// Work handed to a worker by one claim
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub key: TargetKey,
    /// Items to fetch, most urgent first
    pub items: Vec<ScoredItem>,
    /// Items over the per-server quota, reported without fetching
    pub skipped: Vec<ScoredItem>,
    /// Items still pending when the crawl end time passed
    pub expired: Vec<ScoredItem>,
}

impl FetchBatch {
    fn new(key: TargetKey) -> Self {
        Self {
            key,
            items: Vec::new(),
            skipped: Vec::new(),
            expired: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len() + self.skipped.len() + self.expired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Concurrent claims a queue allows for its delay
///
/// One claim for a real delay; `threads_per_host` when the delay is ignored.
pub fn max_in_flight(crawl_delay: CrawlDelay, threads_per_host: u32) -> usize {
    match crawl_delay {
        CrawlDelay::Delay(_) => 1,
        CrawlDelay::Ignore => threads_per_host.max(1) as usize,
    }
}

/// Bounded, priority-ordered pending work for one target
pub struct FetcherQueue {
    key: TargetKey,
    policy: Arc<dyn FetchPolicy>,
    max_size: usize,
    max_in_flight: usize,
    items: BinaryHeap<ScoredItem>,
    skipped: Vec<ScoredItem>,
    /// Items accepted for fetching over the queue's lifetime
    accepted: usize,
    next_fetch_time: i64,
    last_fetch_time: Option<i64>,
    in_flight: usize,
    input_finished: bool,
}

impl FetcherQueue {
    pub fn new(
        key: TargetKey,
        policy: Arc<dyn FetchPolicy>,
        max_size: usize,
        max_in_flight: usize,
    ) -> Self {
        Self {
            key,
            policy,
            max_size: max_size.max(1),
            max_in_flight: max_in_flight.max(1),
            items: BinaryHeap::new(),
            skipped: Vec::new(),
            accepted: 0,
            next_fetch_time: 0,
            last_fetch_time: None,
            in_flight: 0,
            input_finished: false,
        }
    }

    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    /// Adds an item; false when the queue is at capacity
    ///
    /// Items beyond the per-server quota are accepted but will be reported as
    /// skipped instead of fetched.
    pub fn offer(&mut self, item: ScoredItem) -> bool {
        if self.len() >= self.max_size {
            return false;
        }
        if self.accepted >= self.policy.max_urls_per_server() {
            self.skipped.push(item);
        } else {
            self.accepted += 1;
            self.items.push(item);
        }
        true
    }

    /// Draws the next batch
    ///
    /// Fetchable items are released only once `now` reaches the next fetch
    /// time. Skipped items are flushed whenever no fetchable items remain.
    /// After the crawl end time every pending item is returned as expired.
    pub fn next_batch(&mut self, now: i64) -> FetchBatch {
        let mut batch = FetchBatch::new(self.key.clone());

        if self.is_expired(now) {
            batch.expired = mem::take(&mut self.items).into_sorted_vec();
            batch.expired.reverse();
            batch.skipped = mem::take(&mut self.skipped);
            return batch;
        }

        if !self.items.is_empty() && now >= self.next_fetch_time {
            let request = self
                .policy
                .fetch_request(now, self.key.crawl_delay, self.items.len());
            for _ in 0..request.num_items {
                match self.items.pop() {
                    Some(item) => batch.items.push(item),
                    None => break,
                }
            }
            if !batch.items.is_empty() {
                self.last_fetch_time = Some(now);
            }
            self.next_fetch_time = self.next_fetch_time.max(request.next_request_time);
        }

        if self.items.is_empty() {
            batch.skipped = mem::take(&mut self.skipped);
        }
        batch
    }

    /// Checks if a claim would receive a non-empty batch now
    pub fn is_ready(&self, now: i64) -> bool {
        if self.in_flight >= self.max_in_flight {
            return false;
        }
        if self.is_expired(now) {
            return !self.is_empty();
        }
        if self.items.is_empty() {
            !self.skipped.is_empty()
        } else {
            now >= self.next_fetch_time
        }
    }

    pub fn state(&self, now: i64) -> QueueState {
        if self.is_done() {
            QueueState::Done
        } else if self.is_ready(now) {
            QueueState::Ready
        } else if self.input_finished {
            QueueState::Draining
        } else {
            QueueState::Filling
        }
    }

    /// Signals that no more items will be offered
    pub fn finish_input(&mut self) {
        self.input_finished = true;
    }

    pub fn is_done(&self) -> bool {
        self.input_finished && self.is_empty() && self.in_flight == 0
    }

    /// Pending items, skipped ones included
    pub fn len(&self) -> usize {
        self.items.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if `count` more items fit
    pub fn has_room_for(&self, count: usize) -> bool {
        self.len().saturating_add(count) <= self.max_size
    }

    /// Earliest time (epoch ms) the next batch may be drawn
    pub fn next_fetch_time(&self) -> i64 {
        self.next_fetch_time
    }

    pub fn last_fetch_time(&self) -> Option<i64> {
        self.last_fetch_time
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub(crate) fn claim(&mut self) {
        self.in_flight += 1;
    }

    pub(crate) fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Consumes the queue, returning its pending items
    pub(crate) fn into_items(self) -> Vec<ScoredItem> {
        let mut items = self.items.into_vec();
        items.extend(self.skipped);
        items
    }

    fn is_expired(&self, now: i64) -> bool {
        self.policy
            .crawl_end_time()
            .is_some_and(|end| now >= end)
    }
}

impl std::fmt::Debug for FetcherQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherQueue")
            .field("key", &self.key)
            .field("items", &self.items.len())
            .field("skipped", &self.skipped.len())
            .field("accepted", &self.accepted)
            .field("next_fetch_time", &self.next_fetch_time)
            .field("in_flight", &self.in_flight)
            .field("input_finished", &self.input_finished)
            .finish()
    }
}

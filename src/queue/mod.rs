//! Per-target queues and the shared queue registry
//!
//! A [`FetcherQueue`] holds the pending items of one target and decides,
//! through its fetch policy, when a batch may be drawn. The
//! [`FetcherQueueManager`] is the hand-off point between producers and the
//! worker pool and applies global backpressure.

mod fetcher_queue;
mod manager;
mod scored_item;

pub use fetcher_queue::{max_in_flight, FetchBatch, FetcherQueue, QueueState};
pub use manager::{FetcherQueueManager, POLL_INTERVAL};
pub use scored_item::ScoredItem;

/// Current wall-clock time in epoch milliseconds
pub fn current_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

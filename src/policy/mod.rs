//! Batch-sizing and rate-limiting policies
//!
//! A [`FetchPolicy`] decides, for one queue at one instant, how many items to
//! release and when the queue may release again. Policies are pure: they keep
//! no state between calls, and all time math is in epoch milliseconds with
//! saturating arithmetic.

mod adaptive;
mod default;

pub use adaptive::AdaptiveFetchPolicy;
pub use default::DefaultFetchPolicy;

use crate::config::{FetcherConfig, PolicyKind};
use crate::grouping::CrawlDelay;
use std::sync::Arc;
use std::time::Duration;

/// One admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Items to release now
    pub num_items: usize,
    /// Earliest time (epoch ms) the queue may release again
    pub next_request_time: i64,
}

impl FetchRequest {
    /// Nothing to release; the queue may ask again immediately
    pub fn empty(now: i64) -> Self {
        Self {
            num_items: 0,
            next_request_time: now,
        }
    }
}

/// Computes admission decisions for a queue
pub trait FetchPolicy: Send + Sync {
    fn fetch_request(&self, now: i64, crawl_delay: CrawlDelay, items_available: usize)
        -> FetchRequest;

    /// Items a single queue may fetch over the run; the rest are skipped
    fn max_urls_per_server(&self) -> usize;

    /// Hard deadline (epoch ms) after which nothing more is fetched
    fn crawl_end_time(&self) -> Option<i64>;
}

/// Builds the policy selected by `fetch-policy`
pub fn build_policy(config: &FetcherConfig) -> Arc<dyn FetchPolicy> {
    match config.fetch_policy {
        PolicyKind::Default => Arc::new(DefaultFetchPolicy::from_config(config)),
        PolicyKind::Adaptive => Arc::new(AdaptiveFetchPolicy::from_config(config)),
    }
}

/// Milliseconds in a duration, saturating at `i64::MAX`
pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// `count * delay` added to `now`, saturating
pub(crate) fn release_time(now: i64, count: usize, delay: i64) -> i64 {
    let count = i64::try_from(count).unwrap_or(i64::MAX);
    now.saturating_add(count.saturating_mul(delay))
}

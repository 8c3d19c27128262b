use super::{duration_millis, release_time, FetchPolicy, FetchRequest};
use crate::config::FetcherConfig;
use crate::grouping::CrawlDelay;
use std::time::Duration;

/// Fixed-size batches, one item per crawl delay
///
/// Releases up to `max_urls_per_set` items and holds the queue until each of
/// them has had its delay slot. With a crawl end time set the batch shrinks
/// so it fits before the deadline.
#[derive(Debug, Clone)]
pub struct DefaultFetchPolicy {
    max_urls_per_set: usize,
    max_urls_per_server: usize,
    min_crawl_delay: Duration,
    crawl_end_time: Option<i64>,
}

impl DefaultFetchPolicy {
    pub fn new(
        max_urls_per_set: usize,
        max_urls_per_server: usize,
        min_crawl_delay: Duration,
        crawl_end_time: Option<i64>,
    ) -> Self {
        Self {
            max_urls_per_set: max_urls_per_set.max(1),
            max_urls_per_server: max_urls_per_server.max(1),
            min_crawl_delay,
            crawl_end_time,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            config.max_urls_per_set,
            config.max_urls_per_server,
            config.min_crawl_delay(),
            config.crawl_end_millis(),
        )
    }

    fn effective_delay(&self, crawl_delay: CrawlDelay) -> i64 {
        match crawl_delay {
            CrawlDelay::Ignore => 0,
            CrawlDelay::Delay(delay) => duration_millis(delay.max(self.min_crawl_delay)),
        }
    }
}

impl FetchPolicy for DefaultFetchPolicy {
    fn fetch_request(
        &self,
        now: i64,
        crawl_delay: CrawlDelay,
        items_available: usize,
    ) -> FetchRequest {
        if items_available == 0 {
            return FetchRequest::empty(now);
        }

        let delay = self.effective_delay(crawl_delay);
        let mut num_items = items_available.min(self.max_urls_per_set);

        if let (Some(end), true) = (self.crawl_end_time, delay > 0) {
            let remaining = end.saturating_sub(now).max(0);
            let fit = usize::try_from(remaining / delay).unwrap_or(usize::MAX);
            num_items = num_items.min(fit.max(1));
        }

        FetchRequest {
            num_items,
            next_request_time: release_time(now, num_items, delay),
        }
    }

    fn max_urls_per_server(&self) -> usize {
        self.max_urls_per_server
    }

    fn crawl_end_time(&self) -> Option<i64> {
        self.crawl_end_time
    }
}

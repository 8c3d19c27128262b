use super::{duration_millis, release_time, FetchPolicy, FetchRequest};
use crate::config::FetcherConfig;
use crate::grouping::CrawlDelay;
use std::time::Duration;

/// Sizes batches to fill a time window
///
/// Releases as many items as fit in `min(deadline - now, fetch_window)` when
/// fetching one item per effective delay, so a queue drains at its allowed
/// rate without overshooting the crawl end time.
#[derive(Debug, Clone)]
pub struct AdaptiveFetchPolicy {
    crawl_end_time: Option<i64>,
    min_crawl_delay: Duration,
    fetch_window: Duration,
    max_urls_per_server: usize,
}

impl AdaptiveFetchPolicy {
    pub fn new(
        crawl_end_time: Option<i64>,
        min_crawl_delay: Duration,
        fetch_window: Duration,
        max_urls_per_server: usize,
    ) -> Self {
        Self {
            crawl_end_time,
            min_crawl_delay,
            fetch_window,
            max_urls_per_server: max_urls_per_server.max(1),
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            config.crawl_end_millis(),
            config.min_crawl_delay(),
            config.fetch_window(),
            config.max_urls_per_server,
        )
    }

    fn effective_delay(&self, crawl_delay: CrawlDelay) -> i64 {
        match crawl_delay {
            CrawlDelay::Ignore => duration_millis(self.min_crawl_delay),
            CrawlDelay::Delay(delay) => duration_millis(delay.max(self.min_crawl_delay)),
        }
    }
}

impl FetchPolicy for AdaptiveFetchPolicy {
    fn fetch_request(
        &self,
        now: i64,
        crawl_delay: CrawlDelay,
        items_available: usize,
    ) -> FetchRequest {
        if items_available == 0 {
            return FetchRequest::empty(now);
        }

        let window = duration_millis(self.fetch_window);
        let span = match self.crawl_end_time {
            Some(end) if end <= now => {
                return FetchRequest {
                    num_items: 0,
                    next_request_time: i64::MAX,
                }
            }
            Some(end) => end.saturating_sub(now).min(window),
            None => window,
        };

        let delay = self.effective_delay(crawl_delay);
        let num_items = if delay == 0 {
            items_available
        } else {
            let fit = usize::try_from(span / delay).unwrap_or(usize::MAX);
            fit.max(1).min(items_available)
        };

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

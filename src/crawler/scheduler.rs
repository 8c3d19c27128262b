//! The scheduler facade handed to the orchestration layer
//!
//! Candidate URLs enter through [`FetchScheduler::submit`], are grouped by
//! target, and are offered to the queue manager with backpressure. The worker
//! pool drains the queues until [`FetchScheduler::run_until_done`] observes
//! that every queue is done.

use super::manager::FetcherManager;
use super::report::Reporter;
use crate::config::Config;
use crate::fetch::{FetchFailure, FetchFailureKind, FetchLimits, Fetcher};
use crate::grouping::{GroupingKey, GroupingKeyGenerator, HostResolver};
use crate::output::{Counter, Counters, ResultSink};
use crate::policy::{build_policy, FetchPolicy};
use crate::queue::{max_in_flight, FetcherQueue, FetcherQueueManager, ScoredItem};
use crate::robots::RobotsCache;
use crate::{Result, SumiError};
use std::sync::Arc;
use tracing::{debug, info};

/// Politeness-aware fetch scheduler for one run
///
/// The robots cache, the bad-host set and the queue registry all live for
/// the lifetime of this value. `submit` may be called concurrently from many
/// producer tasks.
pub struct FetchScheduler<F, R> {
    generator: GroupingKeyGenerator<F, R>,
    queues: Arc<FetcherQueueManager>,
    manager: FetcherManager<F>,
    policy: Arc<dyn FetchPolicy>,
    reporter: Reporter,
    max_queue_size: usize,
    threads_per_host: u32,
}

impl<F: Fetcher, R: HostResolver> FetchScheduler<F, R> {
    /// Builds the scheduler and its collaborators from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `fetcher` - Transport for robots.txt and page fetches
    /// * `resolver` - Host resolver used by IP grouping
    /// * `sink` - Receives one record per submitted URL
    /// * `counters` - Progress counters
    pub fn new(
        config: &Config,
        fetcher: Arc<F>,
        resolver: Arc<R>,
        sink: Arc<dyn ResultSink>,
        counters: Arc<dyn Counters>,
    ) -> Self {
        let fetcher_config = &config.fetcher;
        let cache = Arc::new(RobotsCache::new(fetcher_config.robots_cache_capacity));
        let queues = Arc::new(FetcherQueueManager::new(fetcher_config.max_queued_items));

        let generator = GroupingKeyGenerator::new(
            config,
            Arc::clone(&fetcher),
            resolver,
            cache,
            Arc::clone(&counters),
        );
        let manager = FetcherManager::new(
            Arc::clone(&queues),
            fetcher,
            Arc::clone(&sink),
            Arc::clone(&counters),
            FetchLimits::from_config(fetcher_config),
            fetcher_config.worker_count as usize,
        );

        Self {
            generator,
            queues,
            manager,
            policy: build_policy(fetcher_config),
            reporter: Reporter::new(sink, counters),
            max_queue_size: fetcher_config.max_queue_size,
            threads_per_host: fetcher_config.threads_per_host,
        }
    }

    /// Starts the worker pool so fetching overlaps with submission
    pub fn start(&self) -> Result<()> {
        self.manager.start()
    }

    /// Enqueues one candidate URL
    ///
    /// URLs with a terminal grouping key are reported as skipped right away.
    /// Otherwise the call waits while the queue manager is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`SumiError::InputClosed`] once input has finished or the run
    /// was shut down; the URL is then reported as cancelled.
    pub async fn submit(&self, url: &str, score: f64) -> Result<()> {
        let cancel = self.manager.cancel_token();
        if self.queues.is_input_finished() || cancel.is_cancelled() {
            return Err(SumiError::InputClosed);
        }

        let target = match self.generator.grouping_key(url).await {
            GroupingKey::Target(target) => target,
            sentinel => {
                if let Some(kind) = sentinel.skip_reason() {
                    self.reporter.failure(&FetchFailure::new(
                        url,
                        kind,
                        format!("grouped as {}", sentinel),
                    ));
                }
                return Ok(());
            }
        };

        let in_flight = max_in_flight(target.crawl_delay, self.threads_per_host);
        let mut queue = FetcherQueue::new(
            target,
            Arc::clone(&self.policy),
            self.max_queue_size,
            in_flight,
        );
        queue.offer(ScoredItem::new(url, score));

        if self.queues.offer(queue, cancel).await {
            debug!(url, score, "Queued");
            self.reporter.counters().increment(Counter::Queued, 1);
            Ok(())
        } else {
            self.reporter.failure(&FetchFailure::new(
                url,
                FetchFailureKind::UserRequested,
                "scheduler stopped accepting input",
            ));
            Err(SumiError::InputClosed)
        }
    }

    /// Finishes input and blocks until every queue is drained
    ///
    /// Starts the worker pool if [`start`](Self::start) was not called.
    /// Fatal worker failures are returned here.
    pub async fn run_until_done(&self) -> Result<()> {
        self.queues.finish_input();
        if !self.manager.is_started() {
            self.manager.start()?;
        }
        info!(
            queued = self.queues.total_items(),
            queues = self.queues.num_queues(),
            "Input finished, draining queues"
        );
        self.manager.wait_until_done().await
    }

    /// Cancels the run; pending items are reported as cancelled
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    pub fn is_done(&self) -> bool {
        self.manager.is_done()
    }

    /// Items currently held across all queues
    pub fn queued_items(&self) -> usize {
        self.queues.total_items()
    }

    pub fn robots_cache(&self) -> &Arc<RobotsCache> {
        self.generator.cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetcherConfig, OutputConfig, UserAgentConfig};
    use crate::fetch::FetchedContent;
    use crate::output::{CrawlStats, MemorySink, NoopCounters};
    use crate::state::FetchStatus;
    use std::io;
    use std::net::IpAddr;
    use std::time::Duration;
    use url::Url;

    /// Serves a robots.txt blocking /private and a tiny page for everything else
    struct OpenFetcher;

    fn text(url: &Url, body: &[u8]) -> FetchedContent {
        FetchedContent {
            url: url.to_string(),
            final_url: url.to_string(),
            status_code: 200,
            content_type: "text/plain".to_string(),
            headers: Vec::new(),
            content: body.to_vec(),
            elapsed: Duration::from_millis(1),
            bytes_per_sec: 0,
            truncated: false,
        }
    }

    impl Fetcher for OpenFetcher {
        async fn fetch(&self, url: &Url, _budget: Duration) -> std::result::Result<FetchedContent, FetchFailure> {
            Ok(text(url, b"ok"))
        }

        async fn fetch_robots(&self, url: &Url, _budget: Duration) -> std::result::Result<FetchedContent, FetchFailure> {
            Ok(text(url, b"User-agent: *\nDisallow: /private\n"))
        }
    }

    struct NoResolver;

    impl HostResolver for NoResolver {
        async fn resolve(&self, host: &str, _port: u16) -> io::Result<IpAddr> {
            Err(io::Error::new(io::ErrorKind::NotFound, host.to_string()))
        }
    }

    fn config() -> Config {
        Config {
            fetcher: FetcherConfig {
                worker_count: 2,
                default_crawl_delay: 0,
                min_crawl_delay: 0,
                min_response_rate: 0,
                ..FetcherConfig::default()
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestBot".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "bot@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: ":memory:".to_string(),
            },
        }
    }

    fn scheduler(sink: &Arc<MemorySink>) -> FetchScheduler<OpenFetcher, NoResolver> {
        FetchScheduler::new(
            &config(),
            Arc::new(OpenFetcher),
            Arc::new(NoResolver),
            sink.clone(),
            Arc::new(NoopCounters),
        )
    }

    #[tokio::test]
    async fn test_sentinels_are_reported_immediately() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = scheduler(&sink);

        scheduler.submit("not a url", 1.0).await.unwrap();
        scheduler
            .submit("http://example.com/private/page", 1.0)
            .await
            .unwrap();

        assert_eq!(sink.count_status(FetchStatus::SkippedInvalidUrl), 1);
        assert_eq!(sink.count_status(FetchStatus::SkippedBlocked), 1);
        assert_eq!(scheduler.queued_items(), 0);
    }

    #[tokio::test]
    async fn test_run_until_done_fetches_everything() {
        let sink = Arc::new(MemorySink::new());
        let stats = Arc::new(CrawlStats::new());
        let scheduler = FetchScheduler::new(
            &config(),
            Arc::new(OpenFetcher),
            Arc::new(NoResolver),
            sink.clone(),
            stats.clone(),
        );

        for path in ["a", "b", "c"] {
            scheduler
                .submit(&format!("http://example.com/{}", path), 1.0)
                .await
                .unwrap();
        }
        scheduler.run_until_done().await.unwrap();

        assert!(scheduler.is_done());
        assert_eq!(sink.fetched().len(), 3);
        assert_eq!(stats.get(Counter::Queued), 3);
        assert_eq!(stats.get(Counter::Fetched), 3);
        assert_eq!(stats.get(Counter::RobotsFetched), 1);
    }

    #[tokio::test]
    async fn test_submit_after_finish_is_rejected() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = scheduler(&sink);
        scheduler.run_until_done().await.unwrap();

        let result = scheduler.submit("http://example.com/late", 1.0).await;
        assert!(matches!(result, Err(SumiError::InputClosed)));
    }
}

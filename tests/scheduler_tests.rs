//! End-to-end tests for the fetch scheduler
//!
//! A scripted fetcher stands in for the network so politeness and quota
//! behaviour can be observed directly.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sumi_fetch::config::{Config, FetcherConfig, OutputConfig, UserAgentConfig};
use sumi_fetch::grouping::HostResolver;
use sumi_fetch::output::{Counter, CrawlStats, MemorySink};
use sumi_fetch::{FetchFailure, FetchFailureKind, FetchScheduler, FetchStatus, FetchedContent, Fetcher};
use url::Url;

/// Serves scripted robots.txt responses and records every page fetch
#[derive(Default)]
struct ScriptedFetcher {
    robots: Mutex<HashMap<String, Result<String, FetchFailureKind>>>,
    page_delay: Duration,
    fetches: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedFetcher {
    fn with_robots(self, host: &str, response: Result<&str, FetchFailureKind>) -> Self {
        self.robots
            .lock()
            .insert(host.to_string(), response.map(str::to_string));
        self
    }

    fn page_fetches(&self) -> Vec<(String, Instant)> {
        self.fetches.lock().clone()
    }
}

fn content(url: &Url, body: &str) -> FetchedContent {
    FetchedContent {
        url: url.to_string(),
        final_url: url.to_string(),
        status_code: 200,
        content_type: "text/plain".to_string(),
        headers: Vec::new(),
        content: body.as_bytes().to_vec(),
        elapsed: Duration::from_millis(1),
        bytes_per_sec: 0,
        truncated: false,
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _budget: Duration) -> Result<FetchedContent, FetchFailure> {
        self.fetches.lock().push((url.to_string(), Instant::now()));
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        Ok(content(url, "page"))
    }

    async fn fetch_robots(&self, url: &Url, _budget: Duration) -> Result<FetchedContent, FetchFailure> {
        let host = url.host_str().unwrap_or_default().to_string();
        let response = self.robots.lock().get(&host).cloned();
        match response {
            Some(Ok(body)) => Ok(content(url, &body)),
            Some(Err(kind)) => Err(FetchFailure::new(url.as_str(), kind, "scripted failure")),
            None => Err(FetchFailure::new(
                url.as_str(),
                FetchFailureKind::Http { status: 404 },
                "no robots.txt",
            )),
        }
    }
}

struct LoopbackResolver;

impl HostResolver for LoopbackResolver {
    async fn resolve(&self, _host: &str, _port: u16) -> io::Result<IpAddr> {
        Ok(IpAddr::from([127, 0, 0, 1]))
    }
}

fn create_test_config(fetcher: FetcherConfig) -> Config {
    Config {
        fetcher,
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

/// No delays, no rate checks
fn fast_config() -> FetcherConfig {
    FetcherConfig {
        worker_count: 2,
        default_crawl_delay: 0,
        min_crawl_delay: 0,
        min_response_rate: 0,
        ..FetcherConfig::default()
    }
}

struct Harness {
    scheduler: FetchScheduler<ScriptedFetcher, LoopbackResolver>,
    fetcher: Arc<ScriptedFetcher>,
    sink: Arc<MemorySink>,
    stats: Arc<CrawlStats>,
}

fn harness(config: FetcherConfig, fetcher: ScriptedFetcher) -> Harness {
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(MemorySink::new());
    let stats = Arc::new(CrawlStats::new());
    let scheduler = FetchScheduler::new(
        &create_test_config(config),
        Arc::clone(&fetcher),
        Arc::new(LoopbackResolver),
        sink.clone(),
        stats.clone(),
    );
    Harness {
        scheduler,
        fetcher,
        sink,
        stats,
    }
}

#[tokio::test]
async fn test_three_urls_same_host_fetched_in_one_batch() {
    let config = FetcherConfig {
        max_urls_per_server: 3,
        max_urls_per_set: 10,
        ..fast_config()
    };
    let h = harness(config, ScriptedFetcher::default());

    for path in ["a", "b", "c"] {
        h.scheduler
            .submit(&format!("http://example.com/{}", path), 1.0)
            .await
            .unwrap();
    }
    h.scheduler.run_until_done().await.unwrap();

    assert!(h.scheduler.is_done());
    assert_eq!(h.sink.fetched().len(), 3);
    assert_eq!(h.sink.count_status(FetchStatus::SkippedOverQuota), 0);
    assert_eq!(h.stats.get(Counter::Fetched), 3);
}

#[tokio::test]
async fn test_per_server_quota_skips_the_rest() {
    let config = FetcherConfig {
        max_urls_per_server: 1,
        ..fast_config()
    };
    let h = harness(config, ScriptedFetcher::default());

    for path in ["1", "2", "3"] {
        h.scheduler
            .submit(&format!("http://example.com/{}", path), 1.0)
            .await
            .unwrap();
    }
    h.scheduler.run_until_done().await.unwrap();

    assert_eq!(h.sink.fetched().len(), 1);
    assert_eq!(h.sink.count_status(FetchStatus::SkippedOverQuota), 2);
    assert_eq!(h.fetcher.page_fetches().len(), 1);
}

#[tokio::test]
async fn test_robots_crawl_delay_spaces_fetches() {
    let config = FetcherConfig {
        max_urls_per_set: 1,
        ..fast_config()
    };
    let fetcher = ScriptedFetcher::default()
        .with_robots("example.com", Ok("User-agent: *\nCrawl-delay: 0.2\n"));
    let h = harness(config, fetcher);

    for path in ["1", "2", "3"] {
        h.scheduler
            .submit(&format!("http://example.com/{}", path), 1.0)
            .await
            .unwrap();
    }
    h.scheduler.run_until_done().await.unwrap();

    let mut times: Vec<Instant> = h.fetcher.page_fetches().into_iter().map(|(_, t)| t).collect();
    times.sort();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        // Millisecond clock granularity allows a little slack
        assert!(pair[1] - pair[0] >= Duration::from_millis(190));
    }
}

#[tokio::test]
async fn test_higher_scores_fetched_first() {
    let config = FetcherConfig {
        max_urls_per_set: 1,
        worker_count: 1,
        ..fast_config()
    };
    let h = harness(config, ScriptedFetcher::default());

    h.scheduler.submit("http://example.com/low", 1.0).await.unwrap();
    h.scheduler.submit("http://example.com/high", 9.0).await.unwrap();
    h.scheduler.submit("http://example.com/mid", 5.0).await.unwrap();
    h.scheduler.run_until_done().await.unwrap();

    let order: Vec<String> = h.fetcher.page_fetches().into_iter().map(|(url, _)| url).collect();
    assert_eq!(
        order,
        vec![
            "http://example.com/high",
            "http://example.com/mid",
            "http://example.com/low"
        ]
    );
}

#[tokio::test]
async fn test_terminal_keys_are_reported_without_fetching() {
    let fetcher = ScriptedFetcher::default()
        .with_robots("blocked.com", Ok("User-agent: *\nDisallow: /\n"))
        .with_robots("down.com", Err(FetchFailureKind::Http { status: 503 }));
    let h = harness(fast_config(), fetcher);

    h.scheduler.submit("::not a url::", 1.0).await.unwrap();
    h.scheduler.submit("ftp://example.com/file", 1.0).await.unwrap();
    h.scheduler.submit("http://blocked.com/page", 1.0).await.unwrap();
    h.scheduler.submit("http://down.com/page", 1.0).await.unwrap();
    h.scheduler.run_until_done().await.unwrap();

    assert_eq!(h.sink.count_status(FetchStatus::SkippedInvalidUrl), 2);
    assert_eq!(h.sink.count_status(FetchStatus::SkippedBlocked), 1);
    assert_eq!(h.sink.count_status(FetchStatus::SkippedDeferred), 1);
    assert!(h.fetcher.page_fetches().is_empty());
    assert_eq!(h.stats.get(Counter::Queued), 0);
}

#[tokio::test]
async fn test_page_named_robots_txt_is_fetched_as_a_page() {
    let fetcher = ScriptedFetcher::default()
        .with_robots("example.com", Ok("User-agent: *\nDisallow:\n"));
    let h = harness(fast_config(), fetcher);

    h.scheduler.submit("http://example.com/robots.txt", 1.0).await.unwrap();
    h.scheduler.run_until_done().await.unwrap();

    let fetched: Vec<String> = h.fetcher.page_fetches().into_iter().map(|(url, _)| url).collect();
    assert_eq!(fetched, vec!["http://example.com/robots.txt"]);
    assert_eq!(h.sink.fetched().len(), 1);
    assert_eq!(h.stats.get(Counter::RobotsFetched), 1);
}

#[tokio::test]
async fn test_small_capacity_still_drains_many_hosts() {
    let config = FetcherConfig {
        max_queued_items: 1,
        max_queue_size: 1,
        worker_count: 1,
        ..fast_config()
    };
    let h = Arc::new(harness(config, ScriptedFetcher::default()));
    h.scheduler.start().unwrap();

    let mut producers = Vec::new();
    for host in ["a.com", "b.com", "c.com", "d.com"] {
        let h = Arc::clone(&h);
        producers.push(tokio::spawn(async move {
            for path in ["1", "2"] {
                h.scheduler
                    .submit(&format!("http://{}/{}", host, path), 1.0)
                    .await
                    .unwrap();
                assert!(h.scheduler.queued_items() <= 1);
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    h.scheduler.run_until_done().await.unwrap();

    assert_eq!(h.sink.fetched().len(), 8);
}

#[tokio::test]
async fn test_shutdown_reports_unfetched_items() {
    let config = FetcherConfig {
        max_urls_per_set: 1,
        worker_count: 1,
        ..fast_config()
    };
    let fetcher = ScriptedFetcher {
        page_delay: Duration::from_secs(30),
        ..ScriptedFetcher::default()
    };
    let h = harness(config, fetcher);
    h.scheduler.start().unwrap();

    for path in ["1", "2", "3"] {
        h.scheduler
            .submit(&format!("http://example.com/{}", path), 1.0)
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.scheduler.shutdown().await;

    assert!(h.sink.fetched().is_empty());
    assert_eq!(h.sink.count_status(FetchStatus::AbortedUserRequested), 3);

    let late = h.scheduler.submit("http://example.com/4", 1.0).await;
    assert!(late.is_err());
}

#[tokio::test]
async fn test_interrupted_run_still_reports_claimed_items() {
    let config = FetcherConfig {
        worker_count: 1,
        ..fast_config()
    };
    let fetcher = ScriptedFetcher {
        page_delay: Duration::from_secs(30),
        ..ScriptedFetcher::default()
    };
    let h = harness(config, fetcher);
    h.scheduler.start().unwrap();

    for path in ["1", "2", "3"] {
        h.scheduler
            .submit(&format!("http://example.com/{}", path), 1.0)
            .await
            .unwrap();
    }
    let run = tokio::time::timeout(Duration::from_millis(200), h.scheduler.run_until_done()).await;
    assert!(run.is_err());

    h.scheduler.shutdown().await;

    assert_eq!(h.fetcher.page_fetches().len(), 1);
    assert!(h.sink.fetched().is_empty());
    assert_eq!(h.sink.count_status(FetchStatus::AbortedUserRequested), 3);
}

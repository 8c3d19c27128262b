use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Fetch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// How URLs are partitioned into fetch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// One queue per resolved IP address
    Ip,
    /// One queue per pay-level domain
    #[serde(rename = "pld")]
    PayLevelDomain,
}

/// Which batch-sizing policy drives the per-target queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Default,
    Adaptive,
}

/// Scheduler and fetch behaviour configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Number of fetch workers in the pool
    #[serde(rename = "worker-count")]
    pub worker_count: u32,

    /// Backpressure capacity: items held across all queues
    #[serde(rename = "max-queued-items")]
    pub max_queued_items: usize,

    /// Items held by a single target queue
    #[serde(rename = "max-queue-size")]
    pub max_queue_size: usize,

    /// Items released per batch
    #[serde(rename = "max-urls-per-set")]
    pub max_urls_per_set: usize,

    /// Items fetched per target over the whole run; the rest are skipped
    #[serde(rename = "max-urls-per-server")]
    pub max_urls_per_server: usize,

    /// Concurrent batches per target; above 1 the crawl delay is ignored
    #[serde(rename = "threads-per-host")]
    pub threads_per_host: u32,

    /// Crawl delay when robots.txt sets none (milliseconds)
    #[serde(rename = "default-crawl-delay")]
    pub default_crawl_delay: u64,

    /// Floor applied to every crawl delay by the fetch policy (milliseconds)
    #[serde(rename = "min-crawl-delay")]
    pub min_crawl_delay: u64,

    /// Redirects followed for page fetches
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Redirects followed when fetching robots.txt
    #[serde(rename = "max-robots-redirects")]
    pub max_robots_redirects: u32,

    /// Minimum acceptable transfer rate in bytes per second (0 disables)
    #[serde(rename = "min-response-rate")]
    pub min_response_rate: u64,

    /// Maximum content bytes kept per fetch
    #[serde(rename = "max-content-size")]
    pub max_content_size: u64,

    /// Window used by the adaptive policy when sizing batches (milliseconds)
    #[serde(rename = "fetch-window")]
    pub fetch_window: u64,

    /// Hard deadline after which pending items are aborted
    #[serde(rename = "crawl-end-time")]
    pub crawl_end_time: Option<DateTime<Utc>>,

    #[serde(rename = "fetch-policy")]
    pub fetch_policy: PolicyKind,

    pub grouping: GroupingMode,

    /// Hosts remembered by the robots-rules and bad-host caches
    #[serde(rename = "robots-cache-capacity")]
    pub robots_cache_capacity: usize,
}

impl FetcherConfig {
    pub fn default_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.default_crawl_delay)
    }

    pub fn min_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.min_crawl_delay)
    }

    pub fn fetch_window(&self) -> Duration {
        Duration::from_millis(self.fetch_window)
    }

    /// Crawl end time as epoch milliseconds
    pub fn crawl_end_millis(&self) -> Option<i64> {
        self.crawl_end_time.map(|t| t.timestamp_millis())
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            max_queued_items: 10_000,
            max_queue_size: 1_000,
            max_urls_per_set: 10,
            max_urls_per_server: 1_000,
            threads_per_host: 1,
            default_crawl_delay: 10_000,
            min_crawl_delay: 1_000,
            max_redirects: 5,
            max_robots_redirects: 5,
            min_response_rate: 1_024,
            max_content_size: 64 * 1024,
            fetch_window: 5 * 60 * 1000,
            crawl_end_time: None,
            fetch_policy: PolicyKind::Default,
            grouping: GroupingMode::PayLevelDomain,
            robots_cache_capacity: 100_000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the agent matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the full User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file receiving fetch results
    #[serde(rename = "database-path")]
    pub database_path: String,
}

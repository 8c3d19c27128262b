use super::{CrawlDelay, GroupingKey, HostResolver, TargetKey};
use crate::config::{Config, GroupingMode};
use crate::fetch::{FetchFailure, FetchFailureKind, FetchLimits, Fetcher};
use crate::output::{Counter, Counters};
use crate::robots::{RobotsCache, RobotsRules, RobotsRulesParser};
use crate::url::{extract_domain, path_and_query, pay_level_domain, robots_origin, robots_url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::{Host, Url};

/// Derives the grouping key of each submitted URL
///
/// Robots rules, resolved addresses and unresolvable hosts are remembered in
/// the injected [`RobotsCache`], so each origin's robots.txt is fetched once
/// per run (unless evicted), a host keeps the first address it resolved to,
/// and a host that failed to resolve is never retried.
pub struct GroupingKeyGenerator<F, R> {
    fetcher: Arc<F>,
    resolver: Arc<R>,
    cache: Arc<RobotsCache>,
    counters: Arc<dyn Counters>,
    parser: RobotsRulesParser,
    mode: GroupingMode,
    threads_per_host: u32,
    default_crawl_delay: Duration,
    robots_budget: Duration,
}

impl<F: Fetcher, R: HostResolver> GroupingKeyGenerator<F, R> {
    pub fn new(
        config: &Config,
        fetcher: Arc<F>,
        resolver: Arc<R>,
        cache: Arc<RobotsCache>,
        counters: Arc<dyn Counters>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            cache,
            counters,
            parser: RobotsRulesParser::new(&config.user_agent.crawler_name),
            mode: config.fetcher.grouping,
            threads_per_host: config.fetcher.threads_per_host,
            default_crawl_delay: config.fetcher.default_crawl_delay(),
            robots_budget: FetchLimits::from_config(&config.fetcher).time_budget(),
        }
    }

    pub fn cache(&self) -> &Arc<RobotsCache> {
        &self.cache
    }

    /// Computes the grouping key for a URL
    ///
    /// May fetch the origin's robots.txt and, with IP grouping, resolve the
    /// host. Both results are cached before the key is returned.
    pub async fn grouping_key(&self, raw_url: &str) -> GroupingKey {
        let url = match Url::parse(raw_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                debug!(url = raw_url, scheme = url.scheme(), "Unsupported scheme");
                return GroupingKey::InvalidUrl;
            }
            Err(e) => {
                debug!(url = raw_url, error = %e, "Invalid URL");
                return GroupingKey::InvalidUrl;
            }
        };
        let Some(host) = extract_domain(&url) else {
            return GroupingKey::InvalidUrl;
        };

        if self.cache.is_bad_host(&host) {
            return GroupingKey::UnknownHost;
        }

        let Some(target) = self.target_identity(&url, &host).await else {
            return GroupingKey::UnknownHost;
        };

        let Some(rules) = self.robots_rules(&url).await else {
            return GroupingKey::InvalidUrl;
        };

        if rules.is_deferred() {
            debug!(url = %url, "robots.txt unavailable, deferring");
            return GroupingKey::Deferred;
        }
        if !rules.is_allowed(&path_and_query(&url)) {
            debug!(url = %url, "Blocked by robots.txt");
            return GroupingKey::Blocked;
        }

        let crawl_delay = if self.threads_per_host > 1 {
            CrawlDelay::Ignore
        } else {
            CrawlDelay::Delay(rules.crawl_delay().unwrap_or(self.default_crawl_delay))
        };

        GroupingKey::Target(TargetKey::new(target, crawl_delay))
    }

    /// IP address or pay-level domain of the URL; `None` marks the host bad
    async fn target_identity(&self, url: &Url, host: &str) -> Option<String> {
        match self.mode {
            GroupingMode::PayLevelDomain => {
                Some(pay_level_domain(url).unwrap_or_else(|| host.to_string()))
            }
            GroupingMode::Ip => match url.host() {
                Some(Host::Ipv4(addr)) => Some(addr.to_string()),
                Some(Host::Ipv6(addr)) => Some(addr.to_string()),
                _ => {
                    if let Some(ip) = self.cache.resolved_address(host) {
                        return Some(ip.to_string());
                    }
                    let port = url.port_or_known_default().unwrap_or(80);
                    match self.resolver.resolve(host, port).await {
                        Ok(ip) => {
                            self.cache.remember_address(host, ip);
                            Some(ip.to_string())
                        }
                        Err(e) => {
                            warn!(host, error = %e, "Host resolution failed, skipping host for this run");
                            self.cache.mark_bad_host(host);
                            None
                        }
                    }
                }
            },
        }
    }

    /// Cached rules for the URL's origin, fetching robots.txt on a miss
    async fn robots_rules(&self, url: &Url) -> Option<Arc<RobotsRules>> {
        let origin = robots_origin(url)?;
        if let Some(rules) = self.cache.get(&origin) {
            return Some(rules);
        }

        let robots_url = robots_url(url)?;
        let fetched = match tokio::time::timeout(
            self.robots_budget,
            self.fetcher.fetch_robots(&robots_url, self.robots_budget),
        )
        .await
        {
                Ok(result) => result,
                Err(_) => Err(FetchFailure::new(
                    robots_url.as_str(),
                    FetchFailureKind::AbortedTimeLimit,
                    "robots.txt fetch exceeded time budget",
                )),
            };
        self.counters.increment(Counter::RobotsFetched, 1);

        let rules = match fetched {
            Ok(content) => {
                self.parser
                    .parse_content(&robots_url, &content.content, &content.content_type)
            }
            Err(failure) => {
                debug!(url = %robots_url, kind = %failure.kind, "robots.txt fetch failed");
                RobotsRules::from_failure(&failure)
            }
        };

        debug!(
            origin,
            rules = rules.rules().len(),
            delay_ms = rules.crawl_delay().map(|d| d.as_millis() as u64),
            "Cached robots.txt"
        );
        Some(self.cache.insert(&origin, rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetcherConfig, OutputConfig, UserAgentConfig};
    use crate::fetch::FetchedContent;
    use crate::output::CrawlStats;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::io;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned robots.txt bodies keyed by URL
    #[derive(Default)]
    struct FakeFetcher {
        responses: Mutex<HashMap<String, Result<String, FetchFailureKind>>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn serve(self, url: &str, response: Result<&str, FetchFailureKind>) -> Self {
            self.responses
                .lock()
                .insert(url.to_string(), response.map(str::to_string));
            self
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &Url, _budget: Duration) -> Result<FetchedContent, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self
                .responses
                .lock()
                .get(url.as_str())
                .cloned()
                .unwrap_or(Err(FetchFailureKind::Http { status: 404 }));
            match response {
                Ok(body) => Ok(FetchedContent {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    status_code: 200,
                    content_type: "text/plain".to_string(),
                    headers: vec![],
                    content: body.into_bytes(),
                    elapsed: Duration::from_millis(1),
                    bytes_per_sec: 1_000,
                    truncated: false,
                }),
                Err(kind) => Err(FetchFailure::new(url.as_str(), kind, "fake")),
            }
        }
    }

    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
    }

    impl HostResolver for FakeResolver {
        async fn resolve(&self, host: &str, _port: u16) -> io::Result<IpAddr> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if host.ends_with(".invalid") {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such host"))
            } else {
                Ok("192.0.2.7".parse().unwrap())
            }
        }
    }

    fn config(fetcher: FetcherConfig) -> Config {
        Config {
            fetcher,
            user_agent: UserAgentConfig {
                crawler_name: "SumiFetch".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "bot@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "unused.db".to_string(),
            },
        }
    }

    fn generator(
        fetcher_config: FetcherConfig,
        fetcher: FakeFetcher,
    ) -> (
        GroupingKeyGenerator<FakeFetcher, FakeResolver>,
        Arc<FakeFetcher>,
        Arc<FakeResolver>,
        Arc<CrawlStats>,
    ) {
        let fetcher = Arc::new(fetcher);
        let resolver = Arc::new(FakeResolver::default());
        let stats = Arc::new(CrawlStats::new());
        let generator = GroupingKeyGenerator::new(
            &config(fetcher_config),
            Arc::clone(&fetcher),
            Arc::clone(&resolver),
            Arc::new(RobotsCache::new(100)),
            stats.clone(),
        );
        (generator, fetcher, resolver, stats)
    }

    #[tokio::test]
    async fn test_same_host_reuses_cached_rules() {
        let fetcher = FakeFetcher::default().serve(
            "http://www.example.com/robots.txt",
            Ok("User-agent: *\nCrawl-delay: 3\n"),
        );
        let (generator, fetcher, _, stats) = generator(FetcherConfig::default(), fetcher);

        let first = generator.grouping_key("http://www.example.com/a").await;
        let second = generator.grouping_key("http://www.example.com/b").await;

        assert_eq!(first, second);
        assert_eq!(
            first,
            GroupingKey::Target(TargetKey::new(
                "example.com",
                CrawlDelay::Delay(Duration::from_secs(3))
            ))
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.get(Counter::RobotsFetched), 1);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let (generator, fetcher, _, _) = generator(FetcherConfig::default(), FakeFetcher::default());
        assert_eq!(generator.grouping_key("not a url").await, GroupingKey::InvalidUrl);
        assert_eq!(
            generator.grouping_key("mailto:someone@example.com").await,
            GroupingKey::InvalidUrl
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_retried() {
        let fetcher_config = FetcherConfig {
            grouping: GroupingMode::Ip,
            ..FetcherConfig::default()
        };
        let (generator, fetcher, resolver, _) = generator(fetcher_config, FakeFetcher::default());

        assert_eq!(
            generator.grouping_key("http://nowhere.invalid/a").await,
            GroupingKey::UnknownHost
        );
        assert_eq!(
            generator.grouping_key("http://nowhere.invalid/b").await,
            GroupingKey::UnknownHost
        );
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ip_grouping_uses_resolved_address() {
        let fetcher_config = FetcherConfig {
            grouping: GroupingMode::Ip,
            ..FetcherConfig::default()
        };
        let (generator, _, _, _) = generator(fetcher_config, FakeFetcher::default());

        match generator.grouping_key("http://example.com/a").await {
            GroupingKey::Target(key) => assert_eq!(key.target, "192.0.2.7"),
            other => panic!("unexpected key {:?}", other),
        }
    }

    /// Hands out a different address on every lookup
    #[derive(Default)]
    struct RotatingResolver {
        calls: AtomicUsize,
    }

    impl HostResolver for RotatingResolver {
        async fn resolve(&self, _host: &str, _port: u16) -> io::Result<IpAddr> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(IpAddr::from([192, 0, 2, 1 + (call % 2) as u8]))
        }
    }

    #[tokio::test]
    async fn test_ip_grouping_keeps_first_address_for_host() {
        let fetcher_config = FetcherConfig {
            grouping: GroupingMode::Ip,
            ..FetcherConfig::default()
        };
        let resolver = Arc::new(RotatingResolver::default());
        let generator = GroupingKeyGenerator::new(
            &config(fetcher_config),
            Arc::new(FakeFetcher::default()),
            Arc::clone(&resolver),
            Arc::new(RobotsCache::new(100)),
            Arc::new(CrawlStats::new()),
        );

        let first = generator.grouping_key("http://example.com/a").await;
        let second = generator.grouping_key("http://example.com/b").await;
        let third = generator.grouping_key("https://example.com/c").await;

        match &first {
            GroupingKey::Target(key) => assert_eq!(key.target, "192.0.2.1"),
            other => panic!("unexpected key {:?}", other),
        }
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_robots_fetch_defers() {
        let fetcher = FakeFetcher::default().serve(
            "http://example.com/robots.txt",
            Err(FetchFailureKind::Http { status: 503 }),
        );
        let (generator, _, _, _) = generator(FetcherConfig::default(), fetcher);
        assert_eq!(
            generator.grouping_key("http://example.com/a").await,
            GroupingKey::Deferred
        );
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all_with_default_delay() {
        let (generator, _, _, _) = generator(FetcherConfig::default(), FakeFetcher::default());
        assert_eq!(
            generator.grouping_key("http://example.com/a").await,
            GroupingKey::Target(TargetKey::new(
                "example.com",
                CrawlDelay::Delay(Duration::from_secs(10))
            ))
        );
    }

    #[tokio::test]
    async fn test_blocked_path() {
        let fetcher = FakeFetcher::default().serve(
            "http://example.com/robots.txt",
            Ok("User-agent: sumifetch\nDisallow: /private\n"),
        );
        let (generator, _, _, _) = generator(FetcherConfig::default(), fetcher);
        assert_eq!(
            generator.grouping_key("http://example.com/private/page").await,
            GroupingKey::Blocked
        );
        assert!(!generator
            .grouping_key("http://example.com/public")
            .await
            .is_sentinel());
    }

    #[tokio::test]
    async fn test_threads_per_host_ignores_delay() {
        let fetcher_config = FetcherConfig {
            threads_per_host: 4,
            ..FetcherConfig::default()
        };
        let (generator, _, _, _) = generator(fetcher_config, FakeFetcher::default());
        assert_eq!(
            generator.grouping_key("http://example.com/a").await,
            GroupingKey::Target(TargetKey::new("example.com", CrawlDelay::Ignore))
        );
    }

    #[tokio::test]
    async fn test_robots_keyed_by_origin() {
        let (generator, fetcher, _, _) = generator(FetcherConfig::default(), FakeFetcher::default());
        generator.grouping_key("http://example.com/a").await;
        generator.grouping_key("https://example.com/a").await;
        generator.grouping_key("http://example.com:8080/a").await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(generator.cache().len(), 3);
    }
}

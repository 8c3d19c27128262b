//! HTTP fetcher implementation
//!
//! This module is the default transport behind the [`Fetcher`] trait:
//! - Building HTTP clients with proper user agent strings
//! - Separate redirect budgets for pages and robots.txt
//! - Streaming bodies with truncation at the content size limit
//! - Aborting responses that arrive slower than the minimum rate
//! - Error classification into [`FetchFailureKind`]

use super::{bytes_per_sec, FetchFailure, FetchFailureKind, FetchLimits, FetchedContent, Fetcher};
use crate::config::{FetcherConfig, UserAgentConfig};
use crate::SumiError;
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Robots files are read up to this size regardless of the page limit
const MAX_ROBOTS_SIZE: u64 = 512 * 1024;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `max_redirects` - Redirect hops followed before giving up
///
/// # Example
///
/// ```no_run
/// use sumi_fetch::config::UserAgentConfig;
/// use sumi_fetch::fetch::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiFetch".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, 5).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    max_redirects: u32,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(max_redirects as usize))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Fetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    robots_client: Client,
    limits: FetchLimits,
}

impl HttpFetcher {
    pub fn new(user_agent: &UserAgentConfig, config: &FetcherConfig) -> Result<Self, SumiError> {
        Ok(Self {
            client: build_http_client(user_agent, config.max_redirects)?,
            robots_client: build_http_client(user_agent, config.max_robots_redirects)?,
            limits: FetchLimits::from_config(config),
        })
    }

    pub fn limits(&self) -> FetchLimits {
        self.limits
    }

    async fn fetch_within(
        &self,
        url: &Url,
        budget: Duration,
        is_robots: bool,
    ) -> Result<FetchedContent, FetchFailure> {
        match tokio::time::timeout(budget, self.fetch_inner(url, budget, is_robots)).await {
            Ok(result) => result,
            Err(_) => Err(FetchFailure::new(
                url.as_str(),
                FetchFailureKind::AbortedTimeLimit,
                format!("exceeded time budget of {:?}", budget),
            )),
        }
    }

    async fn fetch_inner(
        &self,
        url: &Url,
        budget: Duration,
        is_robots: bool,
    ) -> Result<FetchedContent, FetchFailure> {
        let (client, max_size) = if is_robots {
            (
                &self.robots_client,
                MAX_ROBOTS_SIZE.max(self.limits.max_content_size),
            )
        } else {
            (&self.client, self.limits.max_content_size)
        };

        let start = Instant::now();
        let mut response = client
            .get(url.clone())
            .timeout(budget)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let body_start = Instant::now();
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::new(
                url.as_str(),
                FetchFailureKind::Http {
                    status: status.as_u16(),
                },
                format!("server returned {}", status),
            ));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut content = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_error(url, e))?
        {
            let remaining = max_size.saturating_sub(content.len() as u64) as usize;
            if chunk.len() > remaining {
                content.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            content.extend_from_slice(&chunk);

            if !is_robots {
                if let Some(kind) = self
                    .limits
                    .check_rate(content.len() as u64, body_start.elapsed())
                {
                    return Err(FetchFailure::new(
                        url.as_str(),
                        kind,
                        "response slower than minimum rate",
                    ));
                }
            }
        }

        let elapsed = start.elapsed();
        debug!(
            url = %url,
            bytes = content.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            truncated,
            "Fetched"
        );

        Ok(FetchedContent {
            url: url.to_string(),
            final_url,
            status_code: status.as_u16(),
            content_type,
            headers,
            bytes_per_sec: bytes_per_sec(content.len() as u64, body_start.elapsed()),
            content,
            elapsed,
            truncated,
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, budget: Duration) -> Result<FetchedContent, FetchFailure> {
        self.fetch_within(url, budget, false).await
    }

    /// Uses the robots redirect budget, a size cap of at least
    /// `MAX_ROBOTS_SIZE`, and no slow-response abort
    async fn fetch_robots(&self, url: &Url, budget: Duration) -> Result<FetchedContent, FetchFailure> {
        self.fetch_within(url, budget, true).await
    }
}

/// Maps a reqwest error to a typed failure
fn classify_error(url: &Url, e: reqwest::Error) -> FetchFailure {
    let kind = if e.is_timeout() {
        FetchFailureKind::AbortedTimeLimit
    } else if e.is_redirect() {
        FetchFailureKind::RedirectLimit
    } else {
        FetchFailureKind::Io
    };
    FetchFailure::new(url.as_str(), kind, e.to_string())
}

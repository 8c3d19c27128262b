//! Fetch collaborator interface
//!
//! The scheduler never talks to the network directly. Everything it needs
//! from a transport is expressed by the [`Fetcher`] trait: fetch one URL
//! within a time budget and report either the content or a typed failure.
//! [`HttpFetcher`] is the reqwest-backed default.

mod failure;
mod http;

pub use failure::{FetchFailure, FetchFailureKind};
pub use http::{build_http_client, HttpFetcher};

use crate::config::FetcherConfig;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Budget used when the response-rate check is disabled
pub const UNBOUNDED_FETCH_BUDGET: Duration = Duration::from_secs(30);

/// Responses are not judged slow before this much time has passed
pub const RATE_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Content returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status_code: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub content: Vec<u8>,
    pub elapsed: Duration,
    /// Achieved transfer rate over the whole exchange
    pub bytes_per_sec: u64,
    /// True when the body was cut off at the content size limit
    pub truncated: bool,
}

/// Fetches one URL within a hard time budget
///
/// Implementations must honor `budget` (callers also enforce it with a
/// timeout) and report the achieved transfer rate so slow responses can be
/// aborted.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        url: &Url,
        budget: Duration,
    ) -> impl Future<Output = Result<FetchedContent, FetchFailure>> + Send;

    /// Fetches a robots.txt file
    ///
    /// Transports with separate robots limits (redirect budget, size cap)
    /// override this; by default it is an ordinary fetch.
    fn fetch_robots(
        &self,
        url: &Url,
        budget: Duration,
    ) -> impl Future<Output = Result<FetchedContent, FetchFailure>> + Send {
        self.fetch(url, budget)
    }
}

/// Size and rate limits applied to every page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_content_size: u64,
    /// Bytes per second; 0 disables the slow-response abort
    pub min_response_rate: u64,
    pub max_redirects: u32,
}

impl FetchLimits {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_content_size: config.max_content_size,
            min_response_rate: config.min_response_rate,
            max_redirects: config.max_redirects,
        }
    }

    /// Hard time budget for one fetch: max content size ÷ minimum rate
    pub fn time_budget(&self) -> Duration {
        if self.min_response_rate == 0 {
            return UNBOUNDED_FETCH_BUDGET;
        }
        let millis = self
            .max_content_size
            .saturating_mul(1000)
            / self.min_response_rate;
        Duration::from_millis(millis).max(RATE_GRACE_PERIOD)
    }

    /// Returns the achieved rate as a failure kind if it is below the minimum
    pub fn check_rate(&self, bytes: u64, elapsed: Duration) -> Option<FetchFailureKind> {
        if self.min_response_rate == 0 || elapsed < RATE_GRACE_PERIOD {
            return None;
        }
        let rate = bytes_per_sec(bytes, elapsed);
        if rate < self.min_response_rate {
            Some(FetchFailureKind::AbortedSlowResponse {
                bytes_per_sec: rate,
            })
        } else {
            None
        }
    }

    /// Judges a completed fetch by the rate its fetcher reported
    pub fn check_content(&self, content: &FetchedContent) -> Option<FetchFailureKind> {
        if self.min_response_rate == 0 || content.elapsed < RATE_GRACE_PERIOD {
            return None;
        }
        (content.bytes_per_sec < self.min_response_rate).then_some(
            FetchFailureKind::AbortedSlowResponse {
                bytes_per_sec: content.bytes_per_sec,
            },
        )
    }
}

/// Transfer rate in bytes per second, saturating for sub-millisecond exchanges
pub fn bytes_per_sec(bytes: u64, elapsed: Duration) -> u64 {
    let millis = elapsed.as_millis() as u64;
    if millis == 0 {
        return bytes.saturating_mul(1000);
    }
    bytes.saturating_mul(1000) / millis
}

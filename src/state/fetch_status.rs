/// Terminal outcome definitions for processed items
///
/// Every submitted URL ends in exactly one of these states, whether it was
/// fetched, skipped before queueing, or failed during the fetch.
use std::fmt;

/// Represents the final outcome recorded for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    // ===== Success =====
    /// Content was fetched
    Fetched,

    // ===== Skipped (never fetched) =====
    /// URL failed to parse
    SkippedInvalidUrl,

    /// Host could not be resolved; host is remembered as bad for the run
    SkippedUnknownHost,

    /// robots.txt disallows the path
    SkippedBlocked,

    /// robots.txt could not be fetched; eligible for a future run
    SkippedDeferred,

    /// Per-server fetch ceiling reached
    SkippedOverQuota,

    // ===== Aborted =====
    /// Transfer rate fell below the configured minimum
    AbortedSlowResponse,

    /// Time budget or crawl end time exceeded
    AbortedTimeLimit,

    /// Operator cancelled the run
    AbortedUserRequested,

    // ===== HTTP errors =====
    HttpUnauthorized,
    HttpForbidden,
    HttpNotFound,
    HttpGone,
    /// Redirect loop or too many redirects
    HttpRedirectionError,
    HttpClientError,
    HttpServerError,
    /// Any other non-2xx status
    HttpError,

    // ===== Transport =====
    IoError,
}

impl FetchStatus {
    /// Maps an HTTP status code to the matching error state
    pub fn from_http_status(code: u16) -> Self {
        match code {
            401 => Self::HttpUnauthorized,
            403 => Self::HttpForbidden,
            404 => Self::HttpNotFound,
            410 => Self::HttpGone,
            300..=399 => Self::HttpRedirectionError,
            400..=499 => Self::HttpClientError,
            500..=599 => Self::HttpServerError,
            _ => Self::HttpError,
        }
    }

    /// Returns true if content was fetched
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Returns true if the item was intentionally not fetched
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::SkippedInvalidUrl
                | Self::SkippedUnknownHost
                | Self::SkippedBlocked
                | Self::SkippedDeferred
                | Self::SkippedOverQuota
        )
    }

    /// Returns true if the fetch was started and then abandoned
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            Self::AbortedSlowResponse | Self::AbortedTimeLimit | Self::AbortedUserRequested
        )
    }

    /// Returns true if the fetch was attempted and failed
    pub fn is_error(&self) -> bool {
        !self.is_success() && !self.is_skipped()
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::SkippedInvalidUrl => "skipped_invalid_url",
            Self::SkippedUnknownHost => "skipped_unknown_host",
            Self::SkippedBlocked => "skipped_blocked",
            Self::SkippedDeferred => "skipped_deferred",
            Self::SkippedOverQuota => "skipped_over_quota",
            Self::AbortedSlowResponse => "aborted_slow_response",
            Self::AbortedTimeLimit => "aborted_time_limit",
            Self::AbortedUserRequested => "aborted_user_requested",
            Self::HttpUnauthorized => "http_unauthorized",
            Self::HttpForbidden => "http_forbidden",
            Self::HttpNotFound => "http_not_found",
            Self::HttpGone => "http_gone",
            Self::HttpRedirectionError => "http_redirection_error",
            Self::HttpClientError => "http_client_error",
            Self::HttpServerError => "http_server_error",
            Self::HttpError => "http_error",
            Self::IoError => "io_error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::all_states()
            .into_iter()
            .find(|state| state.to_db_string() == s)
    }

    /// Returns all possible statuses
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Fetched,
            Self::SkippedInvalidUrl,
            Self::SkippedUnknownHost,
            Self::SkippedBlocked,
            Self::SkippedDeferred,
            Self::SkippedOverQuota,
            Self::AbortedSlowResponse,
            Self::AbortedTimeLimit,
            Self::AbortedUserRequested,
            Self::HttpUnauthorized,
            Self::HttpForbidden,
            Self::HttpNotFound,
            Self::HttpGone,
            Self::HttpRedirectionError,
            Self::HttpClientError,
            Self::HttpServerError,
            Self::HttpError,
            Self::IoError,
        ]
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

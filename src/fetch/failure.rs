//! Typed fetch failures and their outcome mapping
//!
//! One tagged enum covers every way an item can fail to produce content,
//! including the terminal grouping decisions made before anything is queued.

use crate::state::FetchStatus;
use std::fmt;
use thiserror::Error;

/// Why an item did not produce fetched content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// URL failed to parse
    InvalidUrl,
    /// Host resolution failed
    UnknownHost,
    /// robots.txt disallows the path
    RobotsBlocked,
    /// robots.txt fetch failed transiently
    RobotsDeferred,
    /// Measured transfer rate below the configured minimum
    AbortedSlowResponse { bytes_per_sec: u64 },
    /// Time budget or crawl end time exceeded
    AbortedTimeLimit,
    /// Operator cancellation
    UserRequested,
    /// Non-2xx HTTP response
    Http { status: u16 },
    /// Redirect budget exhausted or redirect loop
    RedirectLimit,
    /// Transport-level failure
    Io,
    /// Per-server ceiling reached
    SkippedOverQuota,
}

impl FetchFailureKind {
    /// Maps the failure to the outcome reported to sinks
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::InvalidUrl => FetchStatus::SkippedInvalidUrl,
            Self::UnknownHost => FetchStatus::SkippedUnknownHost,
            Self::RobotsBlocked => FetchStatus::SkippedBlocked,
            Self::RobotsDeferred => FetchStatus::SkippedDeferred,
            Self::AbortedSlowResponse { .. } => FetchStatus::AbortedSlowResponse,
            Self::AbortedTimeLimit => FetchStatus::AbortedTimeLimit,
            Self::UserRequested => FetchStatus::AbortedUserRequested,
            Self::Http { status } => FetchStatus::from_http_status(*status),
            Self::RedirectLimit => FetchStatus::HttpRedirectionError,
            Self::Io => FetchStatus::IoError,
            Self::SkippedOverQuota => FetchStatus::SkippedOverQuota,
        }
    }

    /// HTTP status carried by the failure, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }

    /// Status code used when a robots.txt fetch fails this way
    ///
    /// Redirect exhaustion counts as 3xx; anything without a response counts as 5xx.
    pub fn robots_status(&self) -> u16 {
        match self {
            Self::Http { status } => *status,
            Self::RedirectLimit => 300,
            _ => 500,
        }
    }
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbortedSlowResponse { bytes_per_sec } => {
                write!(f, "slow response ({} bytes/sec)", bytes_per_sec)
            }
            Self::Http { status } => write!(f, "HTTP {}", status),
            other => write!(f, "{}", other.status()),
        }
    }
}

/// A failed fetch of one URL
#[derive(Debug, Clone, Error)]
#[error("{kind} for {url}: {message}")]
pub struct FetchFailure {
    pub url: String,
    pub kind: FetchFailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> FetchStatus {
        self.kind.status()
    }
}

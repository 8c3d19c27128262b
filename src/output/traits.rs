//! Output collaborator traits and types
//!
//! This module defines the result sink interface that receives one record
//! per processed item, and the counter interface used for progress tracking.

use crate::fetch::{FetchFailure, FetchedContent};
use crate::state::FetchStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Outcome record for an item that did not produce content
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub url: String,
    pub status: FetchStatus,
    /// HTTP status, when the failure came from a response
    pub http_status: Option<u16>,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(url: impl Into<String>, status: FetchStatus, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            http_status: None,
            message: message.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn from_failure(failure: &FetchFailure) -> Self {
        Self {
            http_status: failure.kind.http_status(),
            ..Self::new(failure.url.clone(), failure.status(), failure.message.clone())
        }
    }
}

/// Receives the result of every processed item
///
/// Implementations are shared by all workers and must be thread-safe.
/// Errors are logged by the caller and never stop the run.
pub trait ResultSink: Send + Sync {
    /// Records a successful fetch
    fn record_fetched(&self, content: &FetchedContent) -> OutputResult<()>;

    /// Records a skipped or failed item
    fn record_status(&self, record: &StatusRecord) -> OutputResult<()>;
}

/// Named progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Queued,
    Fetching,
    Fetched,
    Failed,
    Deferred,
    Skipped,
    Blocked,
    Invalid,
    UnknownHost,
    Aborted,
    RobotsFetched,
}

impl Counter {
    pub const COUNT: usize = 11;

    pub const ALL: [Counter; Counter::COUNT] = [
        Counter::Queued,
        Counter::Fetching,
        Counter::Fetched,
        Counter::Failed,
        Counter::Deferred,
        Counter::Skipped,
        Counter::Blocked,
        Counter::Invalid,
        Counter::UnknownHost,
        Counter::Aborted,
        Counter::RobotsFetched,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Counter::Queued => "queued",
            Counter::Fetching => "fetching",
            Counter::Fetched => "fetched",
            Counter::Failed => "failed",
            Counter::Deferred => "deferred",
            Counter::Skipped => "skipped",
            Counter::Blocked => "blocked",
            Counter::Invalid => "invalid",
            Counter::UnknownHost => "unknown-host",
            Counter::Aborted => "aborted",
            Counter::RobotsFetched => "robots-fetched",
        }
    }

    /// Counter bumped when an item ends with `status`
    pub fn for_status(status: FetchStatus) -> Counter {
        match status {
            FetchStatus::Fetched => Counter::Fetched,
            FetchStatus::SkippedInvalidUrl => Counter::Invalid,
            FetchStatus::SkippedUnknownHost => Counter::UnknownHost,
            FetchStatus::SkippedBlocked => Counter::Blocked,
            FetchStatus::SkippedDeferred => Counter::Deferred,
            FetchStatus::SkippedOverQuota => Counter::Skipped,
            s if s.is_aborted() => Counter::Aborted,
            _ => Counter::Failed,
        }
    }
}

/// Counter increment interface for observability
pub trait Counters: Send + Sync {
    fn increment(&self, counter: Counter, delta: u64);
}

/// Counters that discard every increment
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounters;

impl Counters for NoopCounters {
    fn increment(&self, _counter: Counter, _delta: u64) {}
}

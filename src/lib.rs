//! Sumi-Fetch: a politeness-aware fetch scheduler
//!
//! This crate takes a stream of candidate URLs, groups them by fetch target,
//! derives a per-target crawl delay from robots.txt, and drains the resulting
//! per-target queues with a bounded worker pool. Producers are throttled by
//! backpressure so pending work never grows past the configured capacity.

pub mod config;
pub mod crawler;
pub mod fetch;
pub mod grouping;
pub mod output;
pub mod policy;
pub mod queue;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Fetch operations
#[derive(Debug, Error)]
pub enum SumiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Robots.txt error: {0}")]
    Robots(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Worker pool failure: {0}")]
    Worker(String),

    #[error("Scheduler no longer accepts input")]
    InputClosed,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Sumi-Fetch operations
pub type Result<T> = std::result::Result<T, SumiError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchScheduler, FetcherManager};
pub use fetch::{FetchFailure, FetchFailureKind, FetchedContent, Fetcher, HttpFetcher};
pub use grouping::{CrawlDelay, GroupingKey, GroupingKeyGenerator, TargetKey};
pub use policy::{AdaptiveFetchPolicy, DefaultFetchPolicy, FetchPolicy, FetchRequest};
pub use queue::{FetcherQueue, FetcherQueueManager, ScoredItem};
pub use robots::{RobotsRules, RobotsRulesParser};
pub use state::FetchStatus;

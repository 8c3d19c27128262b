use crate::fetch::FetchFailureKind;
use std::fmt;
use std::time::Duration;

/// Politeness interval carried by a target key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlDelay {
    /// Several concurrent batches per target; no spacing between them
    Ignore,
    /// Minimum spacing between successive fetches to the target
    Delay(Duration),
}

impl fmt::Display for CrawlDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlDelay::Ignore => write!(f, "ignore"),
            CrawlDelay::Delay(delay) => write!(f, "{}", delay.as_millis()),
        }
    }
}

/// Identity of one fetch target: IP address or pay-level domain plus its delay
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub target: String,
    pub crawl_delay: CrawlDelay,
}

impl TargetKey {
    pub fn new(target: impl Into<String>, crawl_delay: CrawlDelay) -> Self {
        Self {
            target: target.into(),
            crawl_delay,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.target, self.crawl_delay)
    }
}

/// Partition a URL belongs to
///
/// Every variant except `Target` is terminal: the item is reported as skipped
/// and never queued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupingKey {
    InvalidUrl,
    UnknownHost,
    Blocked,
    Deferred,
    Target(TargetKey),
}

impl GroupingKey {
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, GroupingKey::Target(_))
    }

    /// Failure reported for items with a sentinel key
    pub fn skip_reason(&self) -> Option<FetchFailureKind> {
        match self {
            GroupingKey::InvalidUrl => Some(FetchFailureKind::InvalidUrl),
            GroupingKey::UnknownHost => Some(FetchFailureKind::UnknownHost),
            GroupingKey::Blocked => Some(FetchFailureKind::RobotsBlocked),
            GroupingKey::Deferred => Some(FetchFailureKind::RobotsDeferred),
            GroupingKey::Target(_) => None,
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingKey::InvalidUrl => write!(f, "invalid-url"),
            GroupingKey::UnknownHost => write!(f, "unknown-host"),
            GroupingKey::Blocked => write!(f, "blocked"),
            GroupingKey::Deferred => write!(f, "deferred"),
            GroupingKey::Target(key) => write!(f, "{}", key),
        }
    }
}

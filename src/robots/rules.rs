//! Parsed robots.txt policy for one target
//!
//! A `RobotsRules` value is built once by the parser (or from a failed fetch)
//! and never mutated afterwards, so it is shared behind an `Arc` by the cache.

use super::RobotsRulesParser;
use crate::fetch::FetchFailure;
use std::borrow::Cow;
use std::time::Duration;

/// A single allow or disallow path prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotRule {
    /// Lowercased, percent-decoded path prefix
    pub prefix: String,
    pub allow: bool,
}

impl RobotRule {
    pub fn new(prefix: impl Into<String>, allow: bool) -> Self {
        Self {
            prefix: prefix.into(),
            allow,
        }
    }

    /// Checks if the rule covers a decoded, lowercased path
    ///
    /// The prefix must end on a token boundary: `/b` covers `/b`, `/b/c`
    /// and `/b.html` but not `/b2`.
    pub fn matches(&self, path: &str) -> bool {
        if !path.starts_with(&self.prefix) {
            return false;
        }
        if self.prefix.ends_with('/') {
            return true;
        }
        path[self.prefix.len()..]
            .chars()
            .next()
            .map_or(true, |next| !next.is_alphanumeric())
    }
}

/// Parsed robots.txt data
#[derive(Debug, Clone, PartialEq)]
pub struct RobotsRules {
    /// Sorted by prefix length, longest first
    rules: Vec<RobotRule>,
    crawl_delay: Option<Duration>,
    allow_all: bool,
    allow_none: bool,
    defer_visits: bool,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Builds rules from the parser's accumulated state
    ///
    /// The sort is stable so declaration order breaks ties between prefixes
    /// of equal length.
    pub(crate) fn from_parts(
        mut rules: Vec<RobotRule>,
        crawl_delay: Option<Duration>,
        sitemaps: Vec<String>,
    ) -> Self {
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self {
            rules,
            crawl_delay,
            allow_all: false,
            allow_none: false,
            defer_visits: false,
            sitemaps,
        }
    }

    /// Creates a permissive policy that allows everything
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::from_parts(Vec::new(), None, Vec::new())
        }
    }

    /// Creates a policy that disallows everything
    pub fn allow_none() -> Self {
        Self {
            allow_none: true,
            ..Self::from_parts(Vec::new(), None, Vec::new())
        }
    }

    /// Disallows everything for now; the target is eligible for a future run
    pub fn deferred() -> Self {
        Self {
            defer_visits: true,
            ..Self::allow_none()
        }
    }

    /// Maps a failed robots.txt fetch to a policy
    ///
    /// HTTP failures go through [`RobotsRulesParser::failed_fetch`]. Redirect
    /// exhaustion counts as a 3xx, and failures without a response count as 5xx.
    pub fn from_failure(failure: &FetchFailure) -> Self {
        RobotsRulesParser::failed_fetch(failure.kind.robots_status())
            .unwrap_or_else(|_| Self::deferred())
    }

    /// Checks if a path (with query) may be fetched
    ///
    /// The longest matching prefix decides; paths no rule matches are allowed.
    pub fn is_allowed(&self, path_and_query: &str) -> bool {
        if self.allow_all {
            return true;
        }
        if self.allow_none {
            return false;
        }
        if path_and_query == "/robots.txt" {
            return true;
        }

        let path = decode_path(path_and_query).to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&path))
            .map(|rule| rule.allow)
            .unwrap_or(true)
    }

    pub fn rules(&self) -> &[RobotRule] {
        &self.rules
    }

    /// Crawl delay declared for the matched agent; `None` when unset
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    pub fn is_allow_none(&self) -> bool {
        self.allow_none
    }

    pub fn is_deferred(&self) -> bool {
        self.defer_visits
    }

    /// `Sitemap:` URLs found anywhere in the file
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Percent-decodes a robots path, keeping the raw text if it is not valid UTF-8
pub(crate) fn decode_path(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

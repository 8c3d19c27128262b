//! Grouping of URLs into fetch targets
//!
//! Each URL is mapped to a [`GroupingKey`]: either a terminal sentinel
//! (invalid, unknown host, blocked, deferred) or a [`TargetKey`] naming the
//! target and the crawl delay its queue must honor.

mod generator;
mod key;
mod resolver;

pub use crate::config::GroupingMode;
pub use generator::GroupingKeyGenerator;
pub use key::{CrawlDelay, GroupingKey, TargetKey};
pub use resolver::{DnsResolver, HostResolver};

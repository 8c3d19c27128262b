//! Robots.txt handling module
//!
//! This module provides parsing of robots.txt files into immutable
//! [`RobotsRules`] and a run-scoped cache of those rules per origin.
//! Fetching is done by the grouping stage through the `Fetcher` collaborator.

mod cache;
mod parser;
mod rules;

pub use cache::RobotsCache;
pub use parser::{RobotsRulesParser, MAX_CRAWL_DELAY, MAX_WARNINGS_PER_FILE};
pub use rules::{RobotRule, RobotsRules};

//! URL helpers for Sumi-Fetch
//!
//! Host, pay-level domain, and robots.txt location derivation used by the
//! grouping stage. URL text normalization is left to the caller.

mod domain;

pub use domain::{extract_domain, path_and_query, pay_level_domain, robots_origin, robots_url};

//! State module for per-item outcomes
//!
//! `FetchStatus` is the closed vocabulary of terminal outcomes reported to
//! result sinks and counted by the statistics collector.

mod fetch_status;

pub use fetch_status::FetchStatus;

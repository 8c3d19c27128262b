//! Output module for fetch results and progress counters
//!
//! This module handles:
//! - Receiving one result record per processed item
//! - Persisting results to SQLite
//! - Counting outcomes and printing run statistics

mod memory;
mod schema;
mod sqlite_output;
pub mod stats;
mod traits;

pub use memory::MemorySink;
pub use sqlite_output::{RunStatus, SqliteSink};
pub use stats::{print_statistics, CrawlStatistics, CrawlStats};
pub use traits::{
    Counter, Counters, NoopCounters, OutputError, OutputResult, ResultSink, StatusRecord,
};

//! Scheduling core: worker pool and the scheduler facade
//!
//! [`FetchScheduler`] is the entry point. It wires the grouping stage, the
//! queue manager and the [`FetcherManager`] worker pool together for one run.

mod manager;
mod report;
mod scheduler;

pub use manager::{FetcherManager, PROGRESS_INTERVAL};
pub use scheduler::FetchScheduler;

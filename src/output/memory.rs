//! In-memory result sink

use super::traits::{OutputResult, ResultSink, StatusRecord};
use crate::fetch::FetchedContent;
use crate::state::FetchStatus;
use parking_lot::Mutex;

/// Collects every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    fetched: Mutex<Vec<FetchedContent>>,
    statuses: Mutex<Vec<StatusRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetched(&self) -> Vec<FetchedContent> {
        self.fetched.lock().clone()
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.statuses.lock().clone()
    }

    /// Number of status records with the given outcome
    pub fn count_status(&self, status: FetchStatus) -> usize {
        self.statuses
            .lock()
            .iter()
            .filter(|record| record.status == status)
            .count()
    }

    /// Fetched plus status records
    pub fn total(&self) -> usize {
        self.fetched.lock().len() + self.statuses.lock().len()
    }
}

impl ResultSink for MemorySink {
    fn record_fetched(&self, content: &FetchedContent) -> OutputResult<()> {
        self.fetched.lock().push(content.clone());
        Ok(())
    }

    fn record_status(&self, record: &StatusRecord) -> OutputResult<()> {
        self.statuses.lock().push(record.clone());
        Ok(())
    }
}

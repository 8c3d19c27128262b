//! Outcome reporting shared by the scheduler and the worker pool

use crate::fetch::{FetchFailure, FetchFailureKind, FetchedContent};
use crate::output::{Counter, Counters, ResultSink, StatusRecord};
use crate::queue::ScoredItem;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes every terminal outcome to the result sink and the counters
///
/// Sink errors are logged and swallowed: a failing sink never stops the run.
#[derive(Clone)]
pub(crate) struct Reporter {
    sink: Arc<dyn ResultSink>,
    counters: Arc<dyn Counters>,
}

impl Reporter {
    pub(crate) fn new(sink: Arc<dyn ResultSink>, counters: Arc<dyn Counters>) -> Self {
        Self { sink, counters }
    }

    pub(crate) fn counters(&self) -> &Arc<dyn Counters> {
        &self.counters
    }

    pub(crate) fn fetched(&self, content: &FetchedContent) {
        debug!(
            url = %content.url,
            status = content.status_code,
            bytes = content.content.len(),
            "Fetched"
        );
        self.counters.increment(Counter::Fetched, 1);
        if let Err(e) = self.sink.record_fetched(content) {
            warn!(url = %content.url, error = %e, "Failed to record fetch result");
        }
    }

    pub(crate) fn failure(&self, failure: &FetchFailure) {
        let status = failure.status();
        debug!(url = %failure.url, status = %status, message = %failure.message, "Item finished without content");
        self.counters.increment(Counter::for_status(status), 1);
        if let Err(e) = self.sink.record_status(&StatusRecord::from_failure(failure)) {
            warn!(url = %failure.url, error = %e, "Failed to record fetch status");
        }
    }

    /// Reports each item as failed with the same kind and message
    pub(crate) fn fail_all(&self, items: &[ScoredItem], kind: &FetchFailureKind, message: &str) {
        for item in items {
            self.failure(&FetchFailure::new(item.url.clone(), kind.clone(), message));
        }
    }
}

//! Fixed-size worker pool draining the per-target queues

use super::report::Reporter;
use crate::fetch::{FetchFailure, FetchFailureKind, FetchLimits, FetchedContent, Fetcher};
use crate::output::{Counter, Counters, ResultSink};
use crate::queue::{FetchBatch, FetcherQueueManager, ScoredItem};
use crate::{Result, SumiError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// How often a waiting caller logs pool progress
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// State shared by every worker task
struct WorkerContext<F> {
    queues: Arc<FetcherQueueManager>,
    fetcher: Arc<F>,
    reporter: Reporter,
    limits: FetchLimits,
    cancel: CancellationToken,
    /// Workers currently holding a claimed batch
    busy: AtomicUsize,
}

/// Owns the worker pool
///
/// Each worker repeatedly claims a ready queue, fetches its batch one item at
/// a time under a hard time budget, reports every outcome, and returns the
/// claim. Workers exit once the queue manager is drained or the pool is shut
/// down.
pub struct FetcherManager<F> {
    context: Arc<WorkerContext<F>>,
    worker_count: usize,
    /// Joined in place so a dropped waiter leaves the workers running
    workers: Mutex<JoinSet<()>>,
    started: AtomicBool,
}

impl<F: Fetcher> FetcherManager<F> {
    /// Creates a manager; no worker runs until [`start`](Self::start)
    ///
    /// # Arguments
    ///
    /// * `queues` - The shared queue registry to drain
    /// * `fetcher` - Transport used for every page fetch
    /// * `sink` - Receives one record per processed item
    /// * `counters` - Progress counters
    /// * `limits` - Size and rate limits deriving the per-item time budget
    /// * `worker_count` - Number of concurrent workers
    pub fn new(
        queues: Arc<FetcherQueueManager>,
        fetcher: Arc<F>,
        sink: Arc<dyn ResultSink>,
        counters: Arc<dyn Counters>,
        limits: FetchLimits,
        worker_count: usize,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                queues,
                fetcher,
                reporter: Reporter::new(sink, counters),
                limits,
                cancel: CancellationToken::new(),
                busy: AtomicUsize::new(0),
            }),
            worker_count,
            workers: Mutex::new(JoinSet::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the workers on the current tokio runtime
    ///
    /// Fails if the worker count is zero, if no runtime is available, or if
    /// the pool was already started.
    pub fn start(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(SumiError::Worker("worker count must be at least 1".to_string()));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| SumiError::Worker(format!("no runtime to spawn workers on: {}", e)))?;

        let mut workers = self
            .workers
            .try_lock()
            .map_err(|_| SumiError::Worker("worker pool is being joined".to_string()))?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SumiError::Worker("worker pool already started".to_string()));
        }
        for id in 0..self.worker_count {
            workers.spawn_on(run_worker(id, Arc::clone(&self.context)), &handle);
        }

        info!(
            workers = self.worker_count,
            budget_ms = self.context.limits.time_budget().as_millis() as u64,
            "Worker pool started"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// True once every queue is done and every worker is idle
    pub fn is_done(&self) -> bool {
        self.is_started()
            && self.context.queues.is_drained()
            && self.context.busy.load(Ordering::SeqCst) == 0
    }

    /// Token cancelled by [`shutdown`](Self::shutdown)
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.context.cancel
    }

    /// Workers currently processing a batch
    pub fn busy_workers(&self) -> usize {
        self.context.busy.load(Ordering::SeqCst)
    }

    /// Blocks until every worker has exited
    ///
    /// Logs progress every [`PROGRESS_INTERVAL`]. A worker that panics
    /// cancels the pool; its error is returned after the remaining workers
    /// stop and the pending items are reported as cancelled. Dropping the
    /// returned future stops waiting but leaves the workers running, so a
    /// later [`shutdown`](Self::shutdown) still reports every claimed item.
    pub async fn wait_until_done(&self) -> Result<()> {
        if !self.is_started() {
            return Err(SumiError::Worker("worker pool was never started".to_string()));
        }

        let mut workers = self.workers.lock().await;
        let mut progress = tokio::time::interval(PROGRESS_INTERVAL);
        progress.tick().await;

        let mut failure = None;
        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Worker task failed, cancelling pool");
                        self.context.cancel.cancel();
                        failure.get_or_insert_with(|| SumiError::Worker(e.to_string()));
                    }
                },
                _ = progress.tick() => self.log_progress(),
            }
        }

        if let Some(e) = failure {
            self.abort_pending();
            return Err(e);
        }
        info!("All queues drained, worker pool stopped");
        Ok(())
    }

    /// Cancels the pool and waits for the workers to stop
    ///
    /// Items still queued, and the unfetched rest of every in-progress batch,
    /// are reported as cancelled by the operator.
    pub async fn shutdown(&self) {
        info!("Shutting down worker pool");
        self.context.cancel.cancel();

        let mut workers = self.workers.lock().await;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Worker task failed during shutdown");
            }
        }
        self.abort_pending();
    }

    fn abort_pending(&self) {
        let pending = self.context.queues.drain_pending();
        if !pending.is_empty() {
            info!(items = pending.len(), "Reporting queued items as cancelled");
        }
        self.context.reporter.fail_all(
            &pending,
            &FetchFailureKind::UserRequested,
            "fetch run cancelled",
        );
    }

    fn log_progress(&self) {
        info!(
            queued = self.context.queues.total_items(),
            queues = self.context.queues.num_queues(),
            busy = self.busy_workers(),
            "Fetch progress"
        );
    }
}

async fn run_worker<F: Fetcher>(id: usize, context: Arc<WorkerContext<F>>) {
    debug!(worker = id, "Worker started");
    while let Some(batch) = context.queues.poll_wait(&context.cancel).await {
        context.busy.fetch_add(1, Ordering::SeqCst);
        context.process_batch(&batch).await;
        context.queues.release(&batch.key);
        context.busy.fetch_sub(1, Ordering::SeqCst);
    }
    debug!(worker = id, "Worker stopped");
}

impl<F: Fetcher> WorkerContext<F> {
    async fn process_batch(&self, batch: &FetchBatch) {
        debug!(
            key = %batch.key,
            items = batch.items.len(),
            skipped = batch.skipped.len(),
            expired = batch.expired.len(),
            "Processing batch"
        );

        self.reporter.fail_all(
            &batch.expired,
            &FetchFailureKind::AbortedTimeLimit,
            "crawl end time passed before fetch",
        );

        for (index, item) in batch.items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.abort_items(&batch.items[index..]);
                break;
            }
            self.fetch_item(item).await;
        }

        self.reporter.fail_all(
            &batch.skipped,
            &FetchFailureKind::SkippedOverQuota,
            "per-server fetch limit reached",
        );
    }

    fn abort_items(&self, items: &[ScoredItem]) {
        self.reporter
            .fail_all(items, &FetchFailureKind::UserRequested, "fetch run cancelled");
    }

    async fn fetch_item(&self, item: &ScoredItem) {
        let url = match Url::parse(&item.url) {
            Ok(url) => url,
            Err(e) => {
                self.reporter.failure(&FetchFailure::new(
                    item.url.clone(),
                    FetchFailureKind::InvalidUrl,
                    e.to_string(),
                ));
                return;
            }
        };

        self.reporter.counters().increment(Counter::Fetching, 1);
        let budget = self.limits.time_budget();
        let result = tokio::select! {
            fetched = tokio::time::timeout(budget, self.fetcher.fetch(&url, budget)) => {
                fetched.unwrap_or_else(|_| {
                    Err(FetchFailure::new(
                        item.url.clone(),
                        FetchFailureKind::AbortedTimeLimit,
                        format!("exceeded time budget of {}ms", budget.as_millis()),
                    ))
                })
            }
            _ = self.cancel.cancelled() => Err(FetchFailure::new(
                item.url.clone(),
                FetchFailureKind::UserRequested,
                "fetch cancelled in flight",
            )),
        };

        match result.and_then(|content| self.check_rate(content)) {
            Ok(content) => self.reporter.fetched(&content),
            Err(failure) => self.reporter.failure(&failure),
        }
    }

    /// Rejects content delivered below the minimum response rate
    fn check_rate(&self, content: FetchedContent) -> std::result::Result<FetchedContent, FetchFailure> {
        match self.limits.check_content(&content) {
            Some(kind) => Err(FetchFailure::new(
                content.url,
                kind,
                format!(
                    "{} bytes in {}ms",
                    content.content.len(),
                    content.elapsed.as_millis()
                ),
            )),
            None => Ok(content),
        }
    }
}

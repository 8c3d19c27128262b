use super::{current_time_millis, FetchBatch, FetcherQueue, ScoredItem};
use crate::grouping::TargetKey;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Longest a blocked producer or idle worker sleeps before re-checking
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Registry {
    queues: HashMap<TargetKey, FetcherQueue>,
    /// Round-robin claim order
    order: VecDeque<TargetKey>,
    total_items: usize,
    input_finished: bool,
}

impl Registry {
    fn remove(&mut self, key: &TargetKey) -> Option<FetcherQueue> {
        let queue = self.queues.remove(key)?;
        self.order.retain(|k| k != key);
        self.total_items = self.total_items.saturating_sub(queue.len());
        Some(queue)
    }

    fn remove_done(&mut self) {
        let done: Vec<TargetKey> = self
            .queues
            .iter()
            .filter(|(_, queue)| queue.is_done())
            .map(|(key, _)| key.clone())
            .collect();
        for key in done {
            debug!(key = %key, "Queue done");
            self.remove(&key);
        }
    }
}

/// Registry of live queues shared by producers and workers
///
/// Producers block in [`offer`](Self::offer) while the total item count is
/// at capacity; workers block in [`poll_wait`](Self::poll_wait) until some
/// queue is ready. All registry access goes through one mutex that is never
/// held across an await.
pub struct FetcherQueueManager {
    registry: Mutex<Registry>,
    capacity: usize,
    space_available: Notify,
    work_available: Notify,
}

impl FetcherQueueManager {
    /// Creates a manager holding at most `capacity` items across all queues
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            capacity: capacity.max(1),
            space_available: Notify::new(),
            work_available: Notify::new(),
        }
    }

    /// Admits a queue without waiting
    ///
    /// A queue for a new key is registered; items for an existing key top up
    /// the live queue. Admission is all-or-nothing: the queue is handed back
    /// if the global capacity or the live queue's bound would be exceeded,
    /// or if input has finished.
    pub fn try_offer(&self, queue: FetcherQueue) -> Result<(), FetcherQueue> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;
        if registry.input_finished {
            return Err(queue);
        }

        let count = queue.len();
        if registry.total_items > 0 && registry.total_items + count > self.capacity {
            return Err(queue);
        }

        match registry.queues.get_mut(queue.key()) {
            Some(existing) => {
                if !existing.has_room_for(count) {
                    return Err(queue);
                }
                for item in queue.into_items() {
                    existing.offer(item);
                }
            }
            None => {
                registry.order.push_back(queue.key().clone());
                registry.queues.insert(queue.key().clone(), queue);
            }
        }
        registry.total_items += count;
        drop(guard);

        self.work_available.notify_waiters();
        Ok(())
    }

    /// Admits a queue, waiting for capacity
    ///
    /// Returns false if input finished or `cancel` fired before admission.
    pub async fn offer(&self, mut queue: FetcherQueue, cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.space_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_offer(queue) {
                Ok(()) => return true,
                Err(rejected) => queue = rejected,
            }
            if self.is_input_finished() || cancel.is_cancelled() {
                return false;
            }

            trace!(key = %queue.key(), "Queue manager full, producer waiting");
            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    /// Claims the next ready queue and draws its batch
    ///
    /// Queues are inspected round-robin so no target starves. The claim
    /// must be returned with [`release`](Self::release).
    pub fn poll(&self, now: i64) -> Option<FetchBatch> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let mut claimed = None;
        for _ in 0..registry.order.len() {
            let Some(key) = registry.order.pop_front() else {
                break;
            };
            registry.order.push_back(key.clone());

            let Some(queue) = registry.queues.get_mut(&key) else {
                continue;
            };
            if !queue.is_ready(now) {
                continue;
            }
            let batch = queue.next_batch(now);
            if batch.is_empty() {
                continue;
            }
            queue.claim();
            registry.total_items = registry.total_items.saturating_sub(batch.len());
            claimed = Some(batch);
            break;
        }

        if registry.input_finished {
            registry.remove_done();
        }
        drop(guard);

        if claimed.is_some() {
            self.space_available.notify_waiters();
        }
        claimed
    }

    /// Waits for a batch
    ///
    /// Returns `None` once every queue is drained after input finished, or
    /// when `cancel` fires.
    pub async fn poll_wait(&self, cancel: &CancellationToken) -> Option<FetchBatch> {
        loop {
            let notified = self.work_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = current_time_millis();
            if let Some(batch) = self.poll(now) {
                return Some(batch);
            }
            if self.is_drained() || cancel.is_cancelled() {
                return None;
            }

            let wait = self
                .next_release_time()
                .map(|at| Duration::from_millis(at.saturating_sub(now).max(1) as u64))
                .unwrap_or(POLL_INTERVAL)
                .min(POLL_INTERVAL);
            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Returns a claim taken by [`poll`](Self::poll)
    pub fn release(&self, key: &TargetKey) {
        {
            let mut registry = self.registry.lock();
            let done = match registry.queues.get_mut(key) {
                Some(queue) => {
                    queue.release();
                    queue.is_done()
                }
                None => false,
            };
            if done {
                debug!(key = %key, "Queue done");
                registry.remove(key);
            }
        }
        self.work_available.notify_waiters();
    }

    /// Drops a queue and its pending items
    pub fn remove(&self, key: &TargetKey) -> Option<FetcherQueue> {
        let removed = self.registry.lock().remove(key);
        if removed.is_some() {
            self.space_available.notify_waiters();
            self.work_available.notify_waiters();
        }
        removed
    }

    /// Closes input and removes every queue, returning the items they held
    ///
    /// Claimed batches are unaffected; their queues are already empty or
    /// are emptied here.
    pub fn drain_pending(&self) -> Vec<ScoredItem> {
        let queues: Vec<FetcherQueue> = {
            let mut registry = self.registry.lock();
            registry.input_finished = true;
            registry.order.clear();
            registry.total_items = 0;
            registry.queues.drain().map(|(_, queue)| queue).collect()
        };
        self.space_available.notify_waiters();
        self.work_available.notify_waiters();
        queues.into_iter().flat_map(FetcherQueue::into_items).collect()
    }

    /// Signals that no more queues will be offered
    pub fn finish_input(&self) {
        {
            let mut registry = self.registry.lock();
            registry.input_finished = true;
            for queue in registry.queues.values_mut() {
                queue.finish_input();
            }
            registry.remove_done();
        }
        self.space_available.notify_waiters();
        self.work_available.notify_waiters();
    }

    pub fn is_input_finished(&self) -> bool {
        self.registry.lock().input_finished
    }

    /// True once input finished and every queue reached Done
    pub fn is_drained(&self) -> bool {
        let registry = self.registry.lock();
        registry.input_finished && registry.queues.is_empty()
    }

    /// Items held across all queues
    pub fn total_items(&self) -> usize {
        self.registry.lock().total_items
    }

    pub fn num_queues(&self) -> usize {
        self.registry.lock().queues.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Earliest release time among unclaimed queues with fetchable items
    fn next_release_time(&self) -> Option<i64> {
        self.registry
            .lock()
            .queues
            .values()
            .filter(|queue| !queue.is_empty() && queue.in_flight() == 0)
            .map(|queue| queue.next_fetch_time())
            .min()
    }
}

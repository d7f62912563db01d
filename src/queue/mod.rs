//! Task Queue
//!
//! A deduplicating, rate-limited work queue holding one entry per pending
//! reconciliation. Guarantees:
//!
//! - a key is queued at most once; enqueuing it again while it waits replaces
//!   the waiting snapshot with the newer one
//! - a key is handed to at most one worker at a time; a task enqueued while
//!   its key is in flight is parked and queued again on [`TaskQueue::mark_done`]
//! - a delayed retry never replaces a newer task: it is discarded when its
//!   key was enqueued again after the retry was scheduled
//! - after [`TaskQueue::shutdown`] new tasks are ignored and
//!   [`TaskQueue::dequeue`] returns `None` once the remaining work is drained

mod rate_limiter;

pub use rate_limiter::{
    default_rate_limiter, BucketRateLimiter, ItemExponentialRateLimiter, MaxOfRateLimiter,
    RateLimiter,
};

use crate::task::{Task, TaskKey};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace};

#[derive(Default)]
struct QueueState {
    /// Keys ready to be handed out, in arrival order
    queue: VecDeque<TaskKey>,
    /// Latest snapshot per key that still has to be processed
    dirty: HashMap<TaskKey, Task>,
    /// Keys currently held by a worker
    processing: HashSet<TaskKey>,
    /// Sequence number of the latest fresh enqueue per key
    generations: HashMap<TaskKey, u64>,
    next_generation: u64,
    shutting_down: bool,
}

pub struct TaskQueue {
    name: String,
    state: Mutex<QueueState>,
    limiter: Mutex<Box<dyn RateLimiter<TaskKey>>>,
    notify: Notify,
}

impl TaskQueue {
    /// Create a queue with the default rate limiter
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_rate_limiter(name, Box::new(default_rate_limiter()))
    }

    pub fn with_rate_limiter(
        name: impl Into<String>,
        limiter: Box<dyn RateLimiter<TaskKey>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            limiter: Mutex::new(limiter),
            notify: Notify::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enqueue(&self, task: Task) {
        let key = task.key();
        let mut state = self.state.lock();
        if state.shutting_down {
            trace!(queue = %self.name, task = %key, "Ignoring task after shutdown");
            return;
        }
        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(key.clone(), generation);
        self.insert(state, key, task);
    }

    fn insert(&self, mut state: MutexGuard<'_, QueueState>, key: TaskKey, task: Task) {
        if state.dirty.insert(key.clone(), task).is_some() {
            trace!(queue = %self.name, task = %key, "Coalesced pending task");
            return;
        }
        if state.processing.contains(&key) {
            trace!(queue = %self.name, task = %key, "Parked task while in flight");
            return;
        }

        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next task; `None` once shut down and drained
    pub async fn dequeue(&self) -> Option<Task> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    if let Some(task) = state.dirty.remove(&key) {
                        state.processing.insert(key);
                        return Some(task);
                    }
                    continue;
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Release a key taken by [`dequeue`](Self::dequeue)
    pub fn mark_done(&self, key: &TaskKey) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.dirty.contains_key(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Clear the retry history of a key
    pub fn forget(&self, key: &TaskKey) {
        self.limiter.lock().forget(key);
        self.state.lock().generations.remove(key);
    }

    pub fn retry_count(&self, key: &TaskKey) -> u32 {
        self.limiter.lock().retries(key)
    }

    /// Enqueue `task` again once the rate limiter's delay has passed
    pub fn requeue_with_backoff(self: &Arc<Self>, task: Task) {
        self.requeue_with_backoff_then(task, Some);
    }

    /// Like [`requeue_with_backoff`](Self::requeue_with_backoff), passing the
    /// task through `refresh` when the delay has passed. A `None` from
    /// `refresh` drops the retry and clears the key's retry history.
    pub fn requeue_with_backoff_then<F>(self: &Arc<Self>, task: Task, refresh: F)
    where
        F: FnOnce(Task) -> Option<Task> + Send + 'static,
    {
        let key = task.key();
        let delay = self.limiter.lock().when(&key);
        let generation = self.state.lock().generations.get(&key).copied();
        debug!(
            queue = %self.name,
            task = %key,
            delay_ms = delay.as_millis() as u64,
            "Requeueing task"
        );

        if delay.is_zero() {
            self.enqueue_retry(generation, task, refresh);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.enqueue_retry(generation, task, refresh);
        });
    }

    fn enqueue_retry<F>(&self, generation: Option<u64>, task: Task, refresh: F)
    where
        F: FnOnce(Task) -> Option<Task>,
    {
        let key = task.key();
        let Some(task) = refresh(task) else {
            debug!(queue = %self.name, task = %key, "Dropping retry for stale task");
            self.forget(&key);
            return;
        };

        let state = self.state.lock();
        if state.shutting_down {
            return;
        }
        if state.dirty.contains_key(&key) || state.generations.get(&key).copied() != generation {
            trace!(queue = %self.name, task = %key, "Retry superseded by a newer task");
            return;
        }
        self.insert(state, key, task);
    }

    /// Number of keys waiting to be handed out
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }
}

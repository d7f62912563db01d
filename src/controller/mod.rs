//! WebServerCluster controller
//!
//! Watch events only ever produce tasks; worker loops drain the queue and
//! reconcile. A failed task is requeued with backoff until its retry budget
//! is used up, then dropped until a fresh event enqueues it again.

mod events;
mod reconcile;

pub use events::DeploymentStatusPropagator;
pub use reconcile::Reconciler;

use crate::error::Result;
use crate::informer::ClusterCache;
use crate::metrics::{ControllerMetrics, MetricsSnapshot};
use crate::queue::TaskQueue;
use crate::task::Task;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Retries allowed before a failing task is dropped
pub const MAX_RETRIES: u32 = 15;

pub struct WebServerClusterController {
    queue: Arc<TaskQueue>,
    reconciler: Reconciler,
    metrics: ControllerMetrics,
    max_retries: u32,
    clusters: Option<Arc<dyn ClusterCache>>,
}

impl WebServerClusterController {
    pub fn new(queue: Arc<TaskQueue>, reconciler: Reconciler) -> Self {
        Self {
            queue,
            reconciler,
            metrics: ControllerMetrics::default(),
            max_retries: MAX_RETRIES,
            clusters: None,
        }
    }

    /// Reload retried tasks from `clusters` before they run again
    pub fn with_cluster_cache(mut self, clusters: Arc<dyn ClusterCache>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.queue.len())
    }

    pub(crate) fn enqueue(&self, task: Task) {
        self.queue.enqueue(task);
    }

    /// Process tasks until the queue is shut down and drained
    pub async fn run_worker(&self) {
        info!(queue = %self.queue.name(), "Starting worker");
        while self.process_next_task().await {}
        info!(queue = %self.queue.name(), "Worker stopped");
    }

    /// Handle one task; `false` once the queue has shut down
    pub async fn process_next_task(&self) -> bool {
        let Some(task) = self.queue.dequeue().await else {
            return false;
        };
        let key = task.key();

        let result = self.reconciler.sync(&task).await;
        self.handle_result(result, task);
        self.queue.mark_done(&key);
        true
    }

    fn handle_result(&self, result: Result<()>, task: Task) {
        let key = task.key();
        let err = match result {
            Ok(()) => {
                self.metrics.record_success();
                self.queue.forget(&key);
                return;
            }
            Err(err) => err,
        };

        let retries = self.queue.retry_count(&key);
        if retries < self.max_retries {
            warn!(
                task = %key,
                retries = retries,
                error = %err,
                "Error syncing WebServerCluster, requeueing"
            );
            self.metrics.record_retry();
            let clusters = self.clusters.clone();
            self.queue
                .requeue_with_backoff_then(task, move |task| refresh(clusters.as_deref(), task));
            return;
        }

        error!(
            task = %key,
            retries = retries,
            error = %err,
            "Dropping WebServerCluster task out of the queue"
        );
        self.metrics.record_drop();
        self.queue.forget(&key);
    }
}

/// Swap a retried task's snapshot for the cached object; `None` once it is gone
fn refresh(clusters: Option<&dyn ClusterCache>, task: Task) -> Option<Task> {
    let Some(clusters) = clusters else {
        return Some(task);
    };
    if let Task::Delete(_) = task {
        return Some(task);
    }

    let key = task.key();
    let Some(latest) = clusters.get(&key.namespace, &key.name) else {
        debug!(task = %key, "WebServerCluster no longer cached, dropping retry");
        return None;
    };
    Some(match task {
        Task::Create(_) => Task::Create(latest),
        Task::Update(_) => Task::Update(latest),
        Task::UpdateStatus { status, .. } => Task::UpdateStatus {
            cluster: latest,
            status,
        },
        Task::Delete(cluster) => Task::Delete(cluster),
    })
}

//! Reconciliation tasks
//!
//! A task is a transient queue entry naming what to do with one
//! WebServerCluster snapshot. The queue identifies tasks by [`TaskKey`].

use crate::crd::{WebServerCluster, WebServerClusterStatus};
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;

/// The kind of reconciliation a task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Create,
    Update,
    Delete,
    UpdateStatus,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Create => write!(f, "ADD"),
            TaskKind::Update => write!(f, "UPDATE"),
            TaskKind::Delete => write!(f, "DELETE"),
            TaskKind::UpdateStatus => write!(f, "UPDATE_STATUS"),
        }
    }
}

/// Queue identity of a task: at most one task per key is pending or in flight
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub namespace: String,
    pub name: String,
    pub kind: TaskKind,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A pending reconciliation, closing over the snapshot it was enqueued with
#[derive(Debug, Clone)]
pub enum Task {
    Create(Arc<WebServerCluster>),
    Update(Arc<WebServerCluster>),
    Delete(Arc<WebServerCluster>),
    UpdateStatus {
        cluster: Arc<WebServerCluster>,
        status: WebServerClusterStatus,
    },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Create(_) => TaskKind::Create,
            Task::Update(_) => TaskKind::Update,
            Task::Delete(_) => TaskKind::Delete,
            Task::UpdateStatus { .. } => TaskKind::UpdateStatus,
        }
    }

    pub fn cluster(&self) -> &WebServerCluster {
        match self {
            Task::Create(cluster)
            | Task::Update(cluster)
            | Task::Delete(cluster)
            | Task::UpdateStatus { cluster, .. } => cluster,
        }
    }

    pub fn key(&self) -> TaskKey {
        let cluster = self.cluster();
        TaskKey {
            namespace: cluster.namespace().unwrap_or_default(),
            name: cluster.name_any(),
            kind: self.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cluster;

    #[test]
    fn test_key_combines_namespace_name_and_kind() {
        let ws = Arc::new(cluster("web1", Some(3)));
        let create = Task::Create(ws.clone());
        let update = Task::Update(ws.clone());

        assert_eq!(create.key(), Task::Create(ws.clone()).key());
        assert_ne!(create.key(), update.key());
        assert_eq!(create.key().namespace, "default");
        assert_eq!(create.key().name, "web1");
    }

    #[test]
    fn test_key_display() {
        let ws = Arc::new(cluster("web1", Some(3)));
        let task = Task::UpdateStatus {
            cluster: ws,
            status: WebServerClusterStatus { replicas: 2 },
        };
        assert_eq!(task.key().to_string(), "UPDATE_STATUS default/web1");
    }
}

//! Event ingestion
//!
//! WebServerCluster events become Create/Update/Delete tasks. Deployment
//! status changes become UpdateStatus tasks against the owning cluster.

use super::WebServerClusterController;
use crate::crd::{WebServerCluster, WebServerClusterStatus};
use crate::informer::{ClusterCache, EventHandler};
use crate::task::Task;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, trace};

impl EventHandler<WebServerCluster> for WebServerClusterController {
    fn on_add(&self, obj: Arc<WebServerCluster>) {
        debug!(namespace = ?obj.namespace(), name = %obj.name_any(), "WebServerCluster added");
        self.enqueue(Task::Create(obj));
    }

    // Status-only changes, including the ones this controller writes, are ignored
    fn on_update(&self, old: Arc<WebServerCluster>, new: Arc<WebServerCluster>) {
        if old.spec == new.spec {
            trace!(name = %new.name_any(), "WebServerCluster spec unchanged");
            return;
        }
        debug!(
            namespace = ?new.namespace(),
            name = %new.name_any(),
            "WebServerCluster spec changed"
        );
        self.enqueue(Task::Update(new));
    }

    fn on_delete(&self, obj: Arc<WebServerCluster>) {
        debug!(namespace = ?obj.namespace(), name = %obj.name_any(), "WebServerCluster deleted");
        self.enqueue(Task::Delete(obj));
    }
}

/// Mirrors derived Deployment status into the owning WebServerCluster
pub struct DeploymentStatusPropagator {
    controller: Arc<WebServerClusterController>,
    clusters: Arc<dyn ClusterCache>,
}

impl DeploymentStatusPropagator {
    pub fn new(
        controller: Arc<WebServerClusterController>,
        clusters: Arc<dyn ClusterCache>,
    ) -> Self {
        Self {
            controller,
            clusters,
        }
    }
}

impl EventHandler<Deployment> for DeploymentStatusPropagator {
    fn on_add(&self, _obj: Arc<Deployment>) {}

    fn on_update(&self, old: Arc<Deployment>, new: Arc<Deployment>) {
        if old.resource_version() == new.resource_version() || old.status == new.status {
            return;
        }

        let namespace = new.namespace().unwrap_or_default();
        let name = new.name_any();
        let Some(cluster) = self.clusters.get(&namespace, &name) else {
            trace!(namespace = %namespace, name = %name, "No owning WebServerCluster cached");
            return;
        };

        let replicas = new.status.as_ref().and_then(|s| s.replicas).unwrap_or(0);
        debug!(
            namespace = %namespace,
            name = %name,
            replicas = replicas,
            "Deployment status changed"
        );
        self.controller.enqueue(Task::UpdateStatus {
            cluster,
            status: WebServerClusterStatus { replicas },
        });
    }

    fn on_delete(&self, _obj: Arc<Deployment>) {}
}

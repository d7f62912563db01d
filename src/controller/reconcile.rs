//! Reconciler
//!
//! Maps one WebServerCluster onto its derived Deployment and Service. Every
//! operation is idempotent: a retry after a partial run converges on the same
//! end state.

use crate::clients::{ClusterClient, DeploymentClient, ServiceClient};
use crate::crd::{WebServerCluster, WebServerClusterStatus};
use crate::error::{DerivedResource, OperatorError, Result};
use crate::resources::{build_deployment, build_service, derived_namespace};
use crate::task::Task;
use kube::api::PropagationPolicy;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Reconciler {
    deployments: Arc<dyn DeploymentClient>,
    services: Arc<dyn ServiceClient>,
    clusters: Arc<dyn ClusterClient>,
}

impl Reconciler {
    pub fn new(
        deployments: Arc<dyn DeploymentClient>,
        services: Arc<dyn ServiceClient>,
        clusters: Arc<dyn ClusterClient>,
    ) -> Self {
        Self {
            deployments,
            services,
            clusters,
        }
    }

    pub async fn sync(&self, task: &Task) -> Result<()> {
        match task {
            Task::Create(cluster) => self.create(cluster).await,
            Task::Update(cluster) => self.update(cluster).await,
            Task::Delete(cluster) => self.delete(cluster).await,
            Task::UpdateStatus { cluster, status } => self.update_status(cluster, status).await,
        }
    }

    /// Create the Deployment and Service, tolerating ones left by an earlier run
    pub async fn create(&self, cluster: &WebServerCluster) -> Result<()> {
        let name = cluster.name_any();
        let namespace = derived_namespace(cluster);

        match self.deployments.create(&build_deployment(cluster)).await {
            Ok(_) => debug!(namespace = %namespace, name = %name, "Created deployment"),
            Err(e) if e.is_already_exists() => {
                debug!(namespace = %namespace, name = %name, "Deployment already exists")
            }
            Err(e) => return Err(e),
        }

        if self.services.get(&namespace, &name).await?.is_none() {
            match self.services.create(&build_service(cluster)).await {
                Ok(_) => debug!(namespace = %namespace, name = %name, "Created service"),
                Err(e) if e.is_already_exists() => {}
                Err(e) => return Err(e),
            }
        }

        info!(namespace = %namespace, name = %name, "Successfully created web server cluster");
        Ok(())
    }

    /// Push the new spec to the Deployment and Service
    pub async fn update(&self, cluster: &WebServerCluster) -> Result<()> {
        let name = cluster.name_any();
        let namespace = derived_namespace(cluster);

        self.deployments.update(&build_deployment(cluster)).await?;
        self.services.update(&build_service(cluster)).await?;

        info!(namespace = %namespace, name = %name, "Successfully updated web server cluster");
        Ok(())
    }

    /// Delete the Deployment, then the Service; both are always attempted
    pub async fn delete(&self, cluster: &WebServerCluster) -> Result<()> {
        let name = cluster.name_any();
        let namespace = derived_namespace(cluster);

        let deployment = self
            .deployments
            .delete(&namespace, &name, PropagationPolicy::Background)
            .await;
        let service = self.services.delete(&namespace, &name).await;

        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for (resource, result) in [
            (DerivedResource::Deployment, deployment),
            (DerivedResource::Service, service),
        ] {
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(namespace = %namespace, name = %name, %resource, "Already gone")
                }
                Err(e) => {
                    failed.push(resource);
                    errors.push(e);
                }
            }
        }

        if failed.is_empty() {
            info!(namespace = %namespace, name = %name, "Successfully deleted web server cluster");
            return Ok(());
        }
        let source = if errors.len() == 1 {
            errors.remove(0)
        } else {
            OperatorError::Aggregate(errors)
        };
        Err(OperatorError::PartialDelete {
            failed,
            source: Box::new(source),
        })
    }

    /// Write `status` to the cluster's status subresource unless it is already there.
    ///
    /// The comparison runs against the latest stored object; the queued
    /// snapshot may predate this controller's own last write.
    pub async fn update_status(
        &self,
        cluster: &WebServerCluster,
        status: &WebServerClusterStatus,
    ) -> Result<()> {
        let name = cluster.name_any();
        let namespace = derived_namespace(cluster);

        let mut latest = match self.clusters.get(&namespace, &name).await {
            Ok(latest) => latest,
            Err(e) if e.is_not_found() => {
                debug!(namespace = %namespace, name = %name, "WebServerCluster gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if latest.status.as_ref() == Some(status) {
            return Ok(());
        }
        let current = latest.status.clone().unwrap_or_default();
        latest.status = Some(status.clone());
        self.clusters.replace_status(&latest).await?;

        info!(
            namespace = %namespace,
            name = %name,
            from = current.replicas,
            to = status.replicas,
            "Successfully changed web server cluster status"
        );
        Ok(())
    }
}

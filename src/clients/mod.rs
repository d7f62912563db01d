//! Resource clients
//!
//! Thin CRUD seams between the reconciler and the API server, one per
//! resource kind. The kube-backed implementations translate API failures
//! into [`OperatorError`](crate::error::OperatorError) variants so callers can
//! tell idempotency outcomes (already exists, not found) from real failures.

mod cluster;
mod crd;
mod deployment;
mod service;

pub use cluster::KubeClusterClient;
pub use crd::KubeCrdClient;
pub use deployment::KubeDeploymentClient;
pub use service::KubeServiceClient;

use crate::crd::WebServerCluster;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PropagationPolicy;

#[async_trait]
pub trait DeploymentClient: Send + Sync {
    async fn create(&self, deployment: &Deployment) -> Result<Deployment>;

    /// Replace the operator-owned fields of an existing deployment
    async fn update(&self, deployment: &Deployment) -> Result<Deployment>;

    async fn delete(&self, namespace: &str, name: &str, propagation: PropagationPolicy)
        -> Result<()>;
}

#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Returns `Ok(None)` when the service does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    async fn create(&self, service: &Service) -> Result<Service>;

    async fn update(&self, service: &Service) -> Result<Service>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

#[async_trait]
pub trait CrdClient: Send + Sync {
    async fn create(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition>;

    async fn get(&self, name: &str) -> Result<CustomResourceDefinition>;

    async fn delete(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<WebServerCluster>;

    /// Write the status subresource; fails with a conflict on a stale resourceVersion
    async fn replace_status(&self, cluster: &WebServerCluster) -> Result<WebServerCluster>;
}

/// Namespace and name of an object about to be written
fn object_ref(meta: &ObjectMeta) -> Result<(String, String)> {
    let name = meta
        .name
        .clone()
        .ok_or_else(|| OperatorError::Configuration("object has no name".to_string()))?;
    let namespace = meta.namespace.clone().unwrap_or_else(|| "default".to_string());
    Ok((namespace, name))
}

use super::ClusterClient;
use crate::crd::WebServerCluster;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};

/// WebServerCluster client backed by the cluster API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<WebServerCluster> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<WebServerCluster> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn replace_status(&self, cluster: &WebServerCluster) -> Result<WebServerCluster> {
        let namespace = cluster.namespace().ok_or_else(|| {
            OperatorError::Configuration(format!(
                "WebServerCluster {} has no namespace",
                cluster.name_any()
            ))
        })?;
        let data = serde_json::to_vec(cluster)?;
        Ok(self
            .api(&namespace)
            .replace_status(&cluster.name_any(), &PostParams::default(), data)
            .await?)
    }
}

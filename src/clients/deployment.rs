use super::{object_ref, DeploymentClient};
use crate::error::Result;
use crate::resources::FIELD_MANAGER;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::Client;
use tracing::debug;

/// Deployment client backed by the cluster API
#[derive(Clone)]
pub struct KubeDeploymentClient {
    client: Client,
}

impl KubeDeploymentClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl DeploymentClient for KubeDeploymentClient {
    async fn create(&self, deployment: &Deployment) -> Result<Deployment> {
        let (namespace, name) = object_ref(&deployment.metadata)?;
        debug!(namespace = %namespace, name = %name, "Creating deployment");
        Ok(self
            .api(&namespace)
            .create(&PostParams::default(), deployment)
            .await?)
    }

    async fn update(&self, deployment: &Deployment) -> Result<Deployment> {
        let (namespace, name) = object_ref(&deployment.metadata)?;
        debug!(namespace = %namespace, name = %name, "Applying deployment");
        Ok(self
            .api(&namespace)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(deployment),
            )
            .await?)
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        propagation: PropagationPolicy,
    ) -> Result<()> {
        let params = DeleteParams {
            propagation_policy: Some(propagation),
            ..Default::default()
        };
        debug!(namespace = %namespace, name = %name, "Deleting deployment");
        self.api(namespace).delete(name, &params).await?;
        Ok(())
    }
}

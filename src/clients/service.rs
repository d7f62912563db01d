use super::{object_ref, ServiceClient};
use crate::error::Result;
use crate::resources::FIELD_MANAGER;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

/// Service client backed by the cluster API
#[derive(Clone)]
pub struct KubeServiceClient {
    client: Client,
}

impl KubeServiceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ServiceClient for KubeServiceClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn create(&self, service: &Service) -> Result<Service> {
        let (namespace, name) = object_ref(&service.metadata)?;
        debug!(namespace = %namespace, name = %name, "Creating service");
        Ok(self
            .api(&namespace)
            .create(&PostParams::default(), service)
            .await?)
    }

    // Server-side apply leaves the allocated clusterIP untouched
    async fn update(&self, service: &Service) -> Result<Service> {
        let (namespace, name) = object_ref(&service.metadata)?;
        debug!(namespace = %namespace, name = %name, "Applying service");
        Ok(self
            .api(&namespace)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(service),
            )
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        debug!(namespace = %namespace, name = %name, "Deleting service");
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}

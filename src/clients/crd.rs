use super::CrdClient;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

/// CustomResourceDefinition client backed by the cluster API
#[derive(Clone)]
pub struct KubeCrdClient {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdClient {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CrdClient for KubeCrdClient {
    async fn create(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition> {
        if crd.metadata.name.is_none() {
            return Err(OperatorError::Configuration(
                "CRD payload has no name".to_string(),
            ));
        }
        Ok(self.api.create(&PostParams::default(), crd).await?)
    }

    async fn get(&self, name: &str) -> Result<CustomResourceDefinition> {
        Ok(self.api.get(name).await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

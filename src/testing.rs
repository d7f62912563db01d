//! In-memory fakes of the resource clients for unit tests

use crate::clients::{ClusterClient, CrdClient, DeploymentClient, ServiceClient};
use crate::crd::{WebServerCluster, WebServerClusterSpec, WebServerClusterStatus};
use crate::error::{OperatorError, Result};
use crate::informer::ClusterCache;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionCondition, CustomResourceDefinitionStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PropagationPolicy;
use kube::CustomResourceExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn meta_key(meta: &ObjectMeta) -> Key {
    key(
        meta.namespace.as_deref().unwrap_or("default"),
        meta.name.as_deref().unwrap_or_default(),
    )
}

/// A WebServerCluster in namespace `default` serving nginx on node port 30080
pub fn cluster(name: &str, replicas: Option<i32>) -> WebServerCluster {
    let mut ws = WebServerCluster::new(
        name,
        WebServerClusterSpec {
            replicas,
            image: "nginx:1.21".to_string(),
            service_port: 30080,
        },
    );
    ws.metadata.namespace = Some("default".to_string());
    ws.metadata.uid = Some(format!("uid-{}", name));
    ws.metadata.resource_version = Some("1".to_string());
    ws
}

pub fn with_status(mut ws: WebServerCluster, replicas: i32) -> WebServerCluster {
    ws.status = Some(WebServerClusterStatus { replicas });
    ws
}

pub fn deployment_with_status(name: &str, resource_version: &str, replicas: i32) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            resource_version: Some(resource_version.to_string()),
            ..Default::default()
        },
        spec: None,
        status: Some(DeploymentStatus {
            replicas: Some(replicas),
            ..Default::default()
        }),
    }
}

/// The WebServerCluster CRD carrying `(type, status, reason)` conditions
pub fn crd_with_conditions(conditions: &[(&str, &str, &str)]) -> CustomResourceDefinition {
    let mut crd = WebServerCluster::crd();
    let conditions = conditions
        .iter()
        .map(|(type_, status, reason)| CustomResourceDefinitionCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: (!reason.is_empty()).then(|| reason.to_string()),
            ..Default::default()
        })
        .collect();
    crd.status = Some(CustomResourceDefinitionStatus {
        conditions: Some(conditions),
        ..Default::default()
    });
    crd
}

/// An injected error, returned for a bounded number of calls or forever
#[derive(Default)]
struct Failure {
    err: Option<OperatorError>,
    remaining: Option<usize>,
}

impl Failure {
    fn always(err: OperatorError) -> Self {
        Self {
            err: Some(err),
            remaining: None,
        }
    }

    fn times(n: usize, err: OperatorError) -> Self {
        Self {
            err: Some(err),
            remaining: Some(n),
        }
    }

    fn next(&mut self) -> Option<OperatorError> {
        match self.remaining {
            Some(0) => None,
            Some(n) => {
                self.remaining = Some(n - 1);
                self.err.clone()
            }
            None => self.err.clone(),
        }
    }
}

#[derive(Default)]
pub struct FakeDeployments {
    objects: Mutex<HashMap<Key, Deployment>>,
    create_failure: Mutex<Failure>,
    delete_failure: Mutex<Failure>,
    create_calls: Mutex<usize>,
    delete_policies: Mutex<Vec<PropagationPolicy>>,
}

impl FakeDeployments {
    pub fn stored(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.objects.lock().get(&key(namespace, name)).cloned()
    }

    pub fn count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn create_calls(&self) -> usize {
        *self.create_calls.lock()
    }

    pub fn delete_policies(&self) -> Vec<PropagationPolicy> {
        self.delete_policies.lock().clone()
    }

    pub fn fail_create(&self, err: OperatorError) {
        *self.create_failure.lock() = Failure::always(err);
    }

    pub fn fail_create_times(&self, n: usize, err: OperatorError) {
        *self.create_failure.lock() = Failure::times(n, err);
    }

    pub fn fail_delete(&self, err: OperatorError) {
        *self.delete_failure.lock() = Failure::always(err);
    }
}

#[async_trait]
impl DeploymentClient for FakeDeployments {
    async fn create(&self, deployment: &Deployment) -> Result<Deployment> {
        *self.create_calls.lock() += 1;
        if let Some(err) = self.create_failure.lock().next() {
            return Err(err);
        }
        let k = meta_key(&deployment.metadata);
        let mut objects = self.objects.lock();
        if objects.contains_key(&k) {
            return Err(OperatorError::AlreadyExists(k.1));
        }
        objects.insert(k, deployment.clone());
        Ok(deployment.clone())
    }

    async fn update(&self, deployment: &Deployment) -> Result<Deployment> {
        self.objects
            .lock()
            .insert(meta_key(&deployment.metadata), deployment.clone());
        Ok(deployment.clone())
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        propagation: PropagationPolicy,
    ) -> Result<()> {
        self.delete_policies.lock().push(propagation);
        if let Some(err) = self.delete_failure.lock().next() {
            return Err(err);
        }
        match self.objects.lock().remove(&key(namespace, name)) {
            Some(_) => Ok(()),
            None => Err(OperatorError::NotFound(name.to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeServices {
    objects: Mutex<HashMap<Key, Service>>,
    delete_failure: Mutex<Failure>,
    create_calls: Mutex<usize>,
    delete_calls: Mutex<usize>,
}

impl FakeServices {
    pub fn stored(&self, namespace: &str, name: &str) -> Option<Service> {
        self.objects.lock().get(&key(namespace, name)).cloned()
    }

    pub fn count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn create_calls(&self) -> usize {
        *self.create_calls.lock()
    }

    pub fn delete_calls(&self) -> usize {
        *self.delete_calls.lock()
    }

    pub fn fail_delete(&self, err: OperatorError) {
        *self.delete_failure.lock() = Failure::always(err);
    }
}

#[async_trait]
impl ServiceClient for FakeServices {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        Ok(self.stored(namespace, name))
    }

    async fn create(&self, service: &Service) -> Result<Service> {
        *self.create_calls.lock() += 1;
        let k = meta_key(&service.metadata);
        let mut objects = self.objects.lock();
        if objects.contains_key(&k) {
            return Err(OperatorError::AlreadyExists(k.1));
        }
        objects.insert(k, service.clone());
        Ok(service.clone())
    }

    async fn update(&self, service: &Service) -> Result<Service> {
        self.objects
            .lock()
            .insert(meta_key(&service.metadata), service.clone());
        Ok(service.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        *self.delete_calls.lock() += 1;
        if let Some(err) = self.delete_failure.lock().next() {
            return Err(err);
        }
        match self.objects.lock().remove(&key(namespace, name)) {
            Some(_) => Ok(()),
            None => Err(OperatorError::NotFound(name.to_string())),
        }
    }
}

/// CRD client answering `get` from a scripted sequence
#[derive(Default)]
pub struct FakeCrds {
    gets: Mutex<VecDeque<CustomResourceDefinition>>,
    default_get: Mutex<Option<CustomResourceDefinition>>,
    create_failure: Mutex<Failure>,
    delete_failure: Mutex<Failure>,
    get_calls: Mutex<usize>,
    delete_calls: Mutex<usize>,
}

impl FakeCrds {
    pub fn push_get(&self, crd: CustomResourceDefinition) {
        self.gets.lock().push_back(crd);
    }

    /// Returned once the scripted sequence is exhausted
    pub fn set_default_get(&self, crd: CustomResourceDefinition) {
        *self.default_get.lock() = Some(crd);
    }

    pub fn fail_create(&self, err: OperatorError) {
        *self.create_failure.lock() = Failure::always(err);
    }

    pub fn fail_delete(&self, err: OperatorError) {
        *self.delete_failure.lock() = Failure::always(err);
    }

    pub fn get_calls(&self) -> usize {
        *self.get_calls.lock()
    }

    pub fn delete_calls(&self) -> usize {
        *self.delete_calls.lock()
    }
}

#[async_trait]
impl CrdClient for FakeCrds {
    async fn create(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition> {
        if let Some(err) = self.create_failure.lock().next() {
            return Err(err);
        }
        Ok(crd.clone())
    }

    async fn get(&self, name: &str) -> Result<CustomResourceDefinition> {
        *self.get_calls.lock() += 1;
        if let Some(crd) = self.gets.lock().pop_front() {
            return Ok(crd);
        }
        self.default_get
            .lock()
            .clone()
            .ok_or_else(|| OperatorError::NotFound(name.to_string()))
    }

    async fn delete(&self, _name: &str) -> Result<()> {
        *self.delete_calls.lock() += 1;
        match self.delete_failure.lock().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeClusters {
    objects: Mutex<HashMap<Key, WebServerCluster>>,
    write_failure: Mutex<Failure>,
    get_calls: Mutex<usize>,
    write_calls: Mutex<usize>,
}

impl FakeClusters {
    pub fn insert(&self, ws: WebServerCluster) {
        self.objects.lock().insert(meta_key(&ws.metadata), ws);
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<WebServerCluster> {
        self.objects.lock().get(&key(namespace, name)).cloned()
    }

    pub fn fail_write(&self, err: OperatorError) {
        *self.write_failure.lock() = Failure::always(err);
    }

    pub fn get_calls(&self) -> usize {
        *self.get_calls.lock()
    }

    pub fn write_calls(&self) -> usize {
        *self.write_calls.lock()
    }
}

#[async_trait]
impl ClusterClient for FakeClusters {
    async fn get(&self, namespace: &str, name: &str) -> Result<WebServerCluster> {
        *self.get_calls.lock() += 1;
        self.stored(namespace, name)
            .ok_or_else(|| OperatorError::NotFound(name.to_string()))
    }

    async fn replace_status(&self, cluster: &WebServerCluster) -> Result<WebServerCluster> {
        *self.write_calls.lock() += 1;
        if let Some(err) = self.write_failure.lock().next() {
            return Err(err);
        }
        self.insert(cluster.clone());
        Ok(cluster.clone())
    }
}

#[derive(Default)]
pub struct FakeClusterCache {
    objects: Mutex<HashMap<Key, Arc<WebServerCluster>>>,
}

impl FakeClusterCache {
    pub fn insert(&self, ws: WebServerCluster) {
        self.objects
            .lock()
            .insert(meta_key(&ws.metadata), Arc::new(ws));
    }
}

impl ClusterCache for FakeClusterCache {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<WebServerCluster>> {
        self.objects.lock().get(&key(namespace, name)).cloned()
    }
}

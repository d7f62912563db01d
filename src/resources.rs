//! Derived resource builders
//!
//! Every WebServerCluster maps onto one Deployment and one Service with the
//! cluster's name. Both carry the `app=ws-cluster-<name>` selector so the
//! Service routes to the Deployment's pods, and both are owned by the cluster
//! so the garbage collector removes them when the cluster is deleted.

use crate::crd::WebServerCluster;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "ws-operator";

pub const APP_LABEL: &str = "app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "ws-operator";

/// Port the web server container listens on
pub const CONTAINER_PORT: i32 = 80;

const SERVICE_TYPE: &str = "LoadBalancer";

/// Label selector matching every Deployment this operator manages
pub fn managed_by_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY_VALUE)
}

pub fn app_label(cluster_name: &str) -> String {
    format!("ws-cluster-{}", cluster_name)
}

/// Namespace the derived resources live in
pub fn derived_namespace(cluster: &WebServerCluster) -> String {
    cluster.namespace().unwrap_or_else(|| "default".to_string())
}

pub fn pod_selector(cluster: &WebServerCluster) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.to_string(), app_label(&cluster.name_any()));
    labels
}

fn common_labels(cluster: &WebServerCluster) -> BTreeMap<String, String> {
    let mut labels = pod_selector(cluster);
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels
}

pub fn owner_reference(cluster: &WebServerCluster) -> OwnerReference {
    OwnerReference {
        api_version: WebServerCluster::api_version(&()).to_string(),
        kind: WebServerCluster::kind(&()).to_string(),
        name: cluster.name_any(),
        uid: cluster.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn derived_metadata(cluster: &WebServerCluster) -> ObjectMeta {
    ObjectMeta {
        name: Some(cluster.name_any()),
        namespace: Some(derived_namespace(cluster)),
        labels: Some(common_labels(cluster)),
        owner_references: Some(vec![owner_reference(cluster)]),
        ..Default::default()
    }
}

/// Build the Deployment running the cluster's web server pods
pub fn build_deployment(cluster: &WebServerCluster) -> Deployment {
    let name = cluster.name_any();
    let selector = pod_selector(cluster);

    let container = Container {
        name: format!("ws-{}", name),
        image: Some(cluster.spec.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: CONTAINER_PORT,
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: derived_metadata(cluster),
        spec: Some(DeploymentSpec {
            replicas: cluster.spec.replicas,
            selector: LabelSelector {
                match_labels: Some(selector.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Service exposing the cluster's pods on the requested node port
pub fn build_service(cluster: &WebServerCluster) -> Service {
    Service {
        metadata: derived_metadata(cluster),
        spec: Some(ServiceSpec {
            selector: Some(pod_selector(cluster)),
            ports: Some(vec![ServicePort {
                port: CONTAINER_PORT,
                target_port: Some(IntOrString::Int(CONTAINER_PORT)),
                node_port: Some(cluster.spec.service_port),
                ..Default::default()
            }]),
            type_: Some(SERVICE_TYPE.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

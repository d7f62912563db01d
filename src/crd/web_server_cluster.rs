//! WebServerCluster Custom Resource Definition
//!
//! Declares the desired image, replica count and exposed port of a web
//! server cluster. The operator derives a Deployment and a Service from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CRD_GROUP: &str = "demo.io";
pub const CRD_VERSION: &str = "v1";
pub const CRD_KIND: &str = "WebServerCluster";
pub const CRD_PLURAL: &str = "webserverclusters";
pub const CRD_NAME: &str = "webserverclusters.demo.io";

/// WebServerCluster is the Schema for the webserverclusters API
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "demo.io",
    version = "v1",
    kind = "WebServerCluster",
    plural = "webserverclusters",
    namespaced,
    status = "WebServerClusterStatus",
    shortname = "wsc",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Current","type":"integer","jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Port","type":"integer","jsonPath":".spec.port"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct WebServerClusterSpec {
    /// Number of web server pods; left to the Deployment default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Container image serving on port 80
    pub image: String,

    /// Node port the Service exposes
    #[serde(rename = "port")]
    pub service_port: i32,
}

/// Observed state, written only by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WebServerClusterStatus {
    /// Replica count reported by the derived Deployment
    #[serde(default)]
    pub replicas: i32,
}

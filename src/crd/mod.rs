//! Custom Resource Definitions for the WebServerCluster operator

mod web_server_cluster;

pub use web_server_cluster::{
    WebServerCluster, WebServerClusterSpec, WebServerClusterStatus, CRD_GROUP, CRD_KIND,
    CRD_NAME, CRD_PLURAL, CRD_VERSION,
};

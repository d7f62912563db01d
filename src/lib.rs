//! WebServerCluster Kubernetes Operator
//!
//! Reconciles the `WebServerCluster` custom resource (`demo.io/v1`) into a
//! Deployment of web server pods and a LoadBalancer Service exposing them.
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: demo.io/v1
//! kind: WebServerCluster
//! metadata:
//!   name: web1
//! spec:
//!   replicas: 3
//!   image: nginx:1.21
//!   port: 30080
//! ```

pub mod clients;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod informer;
pub mod metrics;
pub mod operator;
pub mod queue;
pub mod registrar;
pub mod resources;
pub mod task;

#[cfg(test)]
mod testing;

pub use config::OperatorConfig;
pub use controller::WebServerClusterController;
pub use crd::{WebServerCluster, WebServerClusterSpec, WebServerClusterStatus};
pub use error::{OperatorError, Result};
pub use operator::Operator;

//! Error types for the WebServerCluster operator

use std::fmt;
use std::time::Duration;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// A derived resource owned by a WebServerCluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedResource {
    Deployment,
    Service,
}

impl fmt::Display for DerivedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedResource::Deployment => write!(f, "deployment"),
            DerivedResource::Service => write!(f, "service"),
        }
    }
}

/// Errors that can occur during operator operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum OperatorError {
    /// Kubernetes API error that does not fall into a more specific class
    #[error("Kubernetes API error: {0}")]
    KubeApi(String),

    /// The object already exists (HTTP 409, reason AlreadyExists)
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The object does not exist (HTTP 404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency conflict on write (HTTP 409)
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The API server rejected the CRD names
    #[error("CRD {name} names not accepted: {reason}")]
    NameConflict { name: String, reason: String },

    /// The CRD never reached the Established condition
    #[error("CRD {name} not established within {timeout:?}")]
    EstablishTimeout { name: String, timeout: Duration },

    /// One or more derived resource deletions failed
    #[error("failed to delete {}: {source}", join_resources(.failed))]
    PartialDelete {
        failed: Vec<DerivedResource>,
        #[source]
        source: Box<OperatorError>,
    },

    /// Several errors from one operation
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<OperatorError>),
}

impl OperatorError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, OperatorError::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OperatorError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict(_))
    }
}

fn join_resources(resources: &[DerivedResource]) -> String {
    resources
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" and ")
}

fn join_errors(errors: &[OperatorError]) -> String {
    let parts: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                OperatorError::AlreadyExists(ae.message)
            }
            kube::Error::Api(ae) if ae.code == 409 => OperatorError::Conflict(ae.message),
            kube::Error::Api(ae) if ae.code == 404 => OperatorError::NotFound(ae.message),
            other => OperatorError::KubeApi(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} error", reason),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_error_display() {
        let err = OperatorError::KubeApi("test error".to_string());
        assert!(err.to_string().contains("Kubernetes API error"));
    }

    #[test]
    fn test_kube_error_classification() {
        assert!(OperatorError::from(api_error(409, "AlreadyExists")).is_already_exists());
        assert!(OperatorError::from(api_error(409, "Conflict")).is_conflict());
        assert!(OperatorError::from(api_error(404, "NotFound")).is_not_found());
        assert!(matches!(
            OperatorError::from(api_error(500, "InternalError")),
            OperatorError::KubeApi(_)
        ));
    }

    #[test]
    fn test_partial_delete_names_failed_steps() {
        let err = OperatorError::PartialDelete {
            failed: vec![DerivedResource::Deployment],
            source: Box::new(OperatorError::KubeApi("boom".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to delete deployment"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_aggregate_display() {
        let err = OperatorError::Aggregate(vec![
            OperatorError::NotFound("a".to_string()),
            OperatorError::Conflict("b".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "[Resource not found: a, Write conflict: b]"
        );
    }
}

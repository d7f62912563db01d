//! Custom Resource Registrar
//!
//! Creates the WebServerCluster CRD on startup and waits for the API server
//! to report it Established. CRD establishment is asynchronous, so the
//! operator must not start watching before the type is usable. A CRD created
//! by this run that never becomes usable is deleted again.

use crate::clients::CrdClient;
use crate::error::{OperatorError, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between establishment checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Deadline for the CRD to become Established
pub const DEFAULT_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(30);

const CONDITION_ESTABLISHED: &str = "Established";
const CONDITION_NAMES_ACCEPTED: &str = "NamesAccepted";
const CONDITION_TRUE: &str = "True";
const CONDITION_FALSE: &str = "False";

pub struct CrdRegistrar {
    client: Arc<dyn CrdClient>,
    poll_interval: Duration,
    timeout: Duration,
}

impl CrdRegistrar {
    pub fn new(client: Arc<dyn CrdClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_ESTABLISH_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }

    /// Create `crd` and block until it is Established.
    ///
    /// An already existing CRD counts as registered and is returned as found.
    pub async fn register(
        &self,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd.metadata.name.clone().ok_or_else(|| {
            OperatorError::Configuration("CRD payload has no name".to_string())
        })?;

        info!(crd = %name, "Registering custom resource definition");
        let created = match self.client.create(crd).await {
            Ok(created) => created,
            Err(e) if e.is_already_exists() => {
                info!(crd = %name, "Custom resource definition already exists");
                return self.client.get(&name).await;
            }
            Err(e) => return Err(e),
        };

        match self.wait_established(&name).await {
            Ok(()) => {
                info!(crd = %name, "Custom resource definition established");
                Ok(created)
            }
            Err(err) => {
                warn!(
                    crd = %name,
                    error = %err,
                    "Custom resource definition not usable, removing it"
                );
                match self.client.delete(&name).await {
                    Ok(()) => Err(err),
                    Err(delete_err) => Err(OperatorError::Aggregate(vec![err, delete_err])),
                }
            }
        }
    }

    /// Delete the CRD, and with it every WebServerCluster
    pub async fn unregister(&self, name: &str) -> Result<()> {
        info!(crd = %name, "Deleting custom resource definition");
        self.client.delete(name).await
    }

    async fn wait_established(&self, name: &str) -> Result<()> {
        let poll = async {
            loop {
                tokio::time::sleep(self.poll_interval).await;
                let crd = self.client.get(name).await?;
                if established(name, &crd)? {
                    return Ok(());
                }
                debug!(crd = %name, "Custom resource definition not established yet");
            }
        };

        match tokio::time::timeout(self.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(OperatorError::EstablishTimeout {
                name: name.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

/// `Ok(true)` once Established, an error when the names were rejected
fn established(name: &str, crd: &CustomResourceDefinition) -> Result<bool> {
    let conditions = crd
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();

    for cond in conditions {
        match cond.type_.as_str() {
            CONDITION_ESTABLISHED if cond.status == CONDITION_TRUE => return Ok(true),
            CONDITION_NAMES_ACCEPTED if cond.status == CONDITION_FALSE => {
                return Err(OperatorError::NameConflict {
                    name: name.to_string(),
                    reason: cond.reason.clone().unwrap_or_default(),
                });
            }
            _ => {}
        }
    }
    Ok(false)
}

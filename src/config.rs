//! Operator configuration

use crate::error::{OperatorError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::PathBuf;
use std::time::Duration;

/// Default informer resync period
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Kubeconfig file; in-cluster or the local default when unset
    pub kubeconfig: Option<PathBuf>,
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    /// Zero disables periodic resync
    pub resync_period: Duration,
    pub workers: usize,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            namespace: None,
            resync_period: DEFAULT_RESYNC_PERIOD,
            workers: 1,
        }
    }
}

impl OperatorConfig {
    /// Empty namespace means all namespaces; worker count is at least one
    pub fn new(
        kubeconfig: Option<PathBuf>,
        namespace: Option<String>,
        resync_period: Duration,
        workers: usize,
    ) -> Self {
        Self {
            kubeconfig,
            namespace: namespace.filter(|ns| !ns.is_empty()),
            resync_period,
            workers: workers.max(1),
        }
    }

    pub fn resync(&self) -> Option<Duration> {
        (!self.resync_period.is_zero()).then_some(self.resync_period)
    }

    /// Load the client configuration this operator connects with
    pub async fn kube_config(&self) -> Result<kube::Config> {
        match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    OperatorError::Configuration(format!(
                        "failed to read kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| OperatorError::Configuration(e.to_string()))
            }
            None => kube::Config::infer()
                .await
                .map_err(|e| OperatorError::Configuration(e.to_string())),
        }
    }
}

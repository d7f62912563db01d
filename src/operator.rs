//! Operator entry point
//!
//! Wires the kube-backed clients, the task queue, the controller and both
//! informers together, and runs them until shutdown.

use crate::clients::{KubeClusterClient, KubeCrdClient, KubeDeploymentClient, KubeServiceClient};
use crate::config::OperatorConfig;
use crate::controller::{DeploymentStatusPropagator, Reconciler, WebServerClusterController};
use crate::crd::WebServerCluster;
use crate::error::Result;
use crate::informer::{ClusterCache, Informer};
use crate::queue::TaskQueue;
use crate::registrar::CrdRegistrar;
use crate::resources::managed_by_selector;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher;
use kube::{Api, Client, CustomResourceExt, Resource};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const QUEUE_NAME: &str = "ws-cluster-queue";

pub struct Operator {
    config: OperatorConfig,
    registrar: CrdRegistrar,
    controller: Arc<WebServerClusterController>,
    cluster_informer: Informer<WebServerCluster>,
    deployment_informer: Informer<Deployment>,
    clusters: Arc<dyn ClusterCache>,
}

impl Operator {
    /// Connect to the API server and build the controller and informers
    pub async fn new(config: OperatorConfig) -> Result<Self> {
        let client = Client::try_from(config.kube_config().await?)?;
        info!("Connected to Kubernetes API server");

        let namespace = config.namespace.as_deref();
        let resync = config.resync();
        let cluster_informer = Informer::new(
            scoped_api::<WebServerCluster>(&client, namespace),
            watcher::Config::default(),
            resync,
        );
        let deployment_informer = Informer::new(
            scoped_api::<Deployment>(&client, namespace),
            watcher::Config::default().labels(&managed_by_selector()),
            resync,
        );
        let clusters: Arc<dyn ClusterCache> = Arc::new(cluster_informer.store());

        let reconciler = Reconciler::new(
            Arc::new(KubeDeploymentClient::new(client.clone())),
            Arc::new(KubeServiceClient::new(client.clone())),
            Arc::new(KubeClusterClient::new(client.clone())),
        );
        let controller = Arc::new(
            WebServerClusterController::new(TaskQueue::new(QUEUE_NAME), reconciler)
                .with_cluster_cache(clusters.clone()),
        );
        let registrar = CrdRegistrar::new(Arc::new(KubeCrdClient::new(client)));

        Ok(Self {
            config,
            registrar,
            controller,
            cluster_informer,
            deployment_informer,
            clusters,
        })
    }

    /// Register the CRD, then watch and reconcile until `shutdown` is cancelled.
    ///
    /// Returns after in-flight reconciliations have finished.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.registrar.register(&WebServerCluster::crd()).await?;

        let propagator = DeploymentStatusPropagator::new(self.controller.clone(), self.clusters);
        let informers = vec![
            tokio::spawn(
                self.cluster_informer
                    .run(self.controller.clone(), shutdown.child_token()),
            ),
            tokio::spawn(
                self.deployment_informer
                    .run(propagator, shutdown.child_token()),
            ),
        ];

        let workers: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|_| {
                let controller = Arc::clone(&self.controller);
                tokio::spawn(async move { controller.run_worker().await })
            })
            .collect();

        info!(
            namespace = self.config.namespace.as_deref().unwrap_or("all"),
            workers = self.config.workers,
            "WebServerCluster operator started"
        );

        shutdown.cancelled().await;
        info!("Shutting down, draining task queue");

        self.controller.queue().shutdown();
        for handle in workers.into_iter().chain(informers) {
            if let Err(e) = handle.await {
                error!(error = %e, "Operator task failed");
            }
        }

        let metrics = self.controller.metrics();
        info!(
            reconciled = metrics.reconciled,
            failures = metrics.failures,
            dropped = metrics.dropped,
            "WebServerCluster operator stopped"
        );
        Ok(())
    }
}

/// Namespace-scoped API, or cluster-wide when no namespace is configured
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

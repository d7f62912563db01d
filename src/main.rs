//! WebServerCluster Kubernetes Operator
//!
//! ## Usage
//!
//! ```bash
//! # Run against the in-cluster or local default kubeconfig
//! ws-operator
//!
//! # Watch one namespace with two workers
//! ws-operator --namespace web --workers 2
//!
//! # RUST_LOG overrides --log-level
//! RUST_LOG=ws_operator=debug ws-operator
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ws_operator::{Operator, OperatorConfig};

/// WebServerCluster Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "ws-operator")]
#[command(version, about = "Kubernetes Operator for WebServerCluster resources")]
struct Args {
    /// Path to a kubeconfig file (in-cluster or local default if unset)
    #[arg(short = 'c', long, env = "WS_OPERATOR_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Namespace to watch (empty for all namespaces)
    #[arg(short = 'n', long, env = "WS_OPERATOR_NAMESPACE", default_value = "")]
    namespace: String,

    /// Informer resync period in seconds (0 disables resync)
    #[arg(long, env = "WS_OPERATOR_RESYNC_SECONDS", default_value_t = 30)]
    resync_seconds: u64,

    /// Number of concurrent reconcile workers
    #[arg(long, env = "WS_OPERATOR_WORKERS", default_value_t = 1)]
    workers: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "WS_OPERATOR_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl From<Args> for OperatorConfig {
    fn from(args: Args) -> Self {
        OperatorConfig::new(
            args.kubeconfig,
            Some(args.namespace),
            Duration::from_secs(args.resync_seconds),
            args.workers,
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting WebServerCluster operator");

    let operator = Operator::new(args.into()).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal.cancel();
    });

    operator.run(shutdown).await?;

    info!("WebServerCluster operator shut down");
    Ok(())
}

//! amp-operator: keeps the system component of a 3scale APIManager converged.
//!
//! Every pass re-reads the APIManager, rebuilds the desired objects and
//! reconciles them against the cluster. A failed pass is retried after the
//! requeue interval. A defect in the desired objects stops the process.

use std::path::PathBuf;
use std::time::Duration;

use amp_operator::{ApiManager, ImageProvider, KubeClient, ReconcileError, SystemReconciler};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 3scale APIManager operator
#[derive(Parser, Debug)]
#[command(name = "amp-operator", version, about)]
struct Args {
    /// Path to the APIManager object (JSON)
    #[arg(long, default_value = "/etc/amp-operator/apimanager.json")]
    apimanager: PathBuf,

    /// Namespace to manage (overrides the APIManager's own)
    #[arg(long)]
    namespace: Option<String>,

    /// Seconds between reconcile passes
    #[arg(long, default_value = "30")]
    requeue_interval: u64,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Default system image, used when the APIManager does not set one
    #[arg(long)]
    system_image: Option<String>,
}

impl Args {
    fn image_provider(&self) -> ImageProvider {
        let mut images = ImageProvider::default();
        if let Some(image) = &self.system_image {
            images.system = image.clone();
        }
        images
    }
}

fn load_apimanager(args: &Args) -> Result<ApiManager> {
    let json = std::fs::read_to_string(&args.apimanager)
        .with_context(|| format!("failed to read {}", args.apimanager.display()))?;
    let mut apimanager = ApiManager::from_json(&json)?;
    if let Some(namespace) = &args.namespace {
        apimanager.metadata.namespace = Some(namespace.clone());
    }
    Ok(apimanager)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amp_operator=info,kube=warn,hyper=warn,tower=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let images = args.image_provider();

    info!("Starting amp-operator");
    info!("APIManager: {}", args.apimanager.display());

    let client = KubeClient::try_default()
        .await
        .context("failed to connect to the cluster")?;
    let interval = Duration::from_secs(args.requeue_interval);

    loop {
        let result = match load_apimanager(&args) {
            Ok(apimanager) => SystemReconciler::new(&client, &apimanager, &images)
                .reconcile()
                .await
                .map_err(anyhow::Error::from)
                .map(|report| report.changed()),
            Err(e) => Err(e),
        };

        match result {
            Ok(changed) => info!(changed, "Reconcile pass complete"),
            Err(e) => {
                let defect = e
                    .downcast_ref::<ReconcileError>()
                    .is_some_and(ReconcileError::is_defect);
                if defect {
                    error!("Unrecoverable defect: {:#}", e);
                    return Err(e.context("desired state is broken, refusing to continue"));
                }
                if args.once {
                    return Err(e);
                }
                warn!("Reconcile failed: {:#}. Retrying in {}s", e, interval.as_secs());
            }
        }

        if args.once {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    Ok(())
}

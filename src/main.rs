use std::sync::Arc;

use clap::{Parser, Subcommand};
use nimbus_k8s::controller::{self, CloudSession, ClusterOrchestrator, ControllerState};
use nimbus_k8s::crd::CloudCluster;
use nimbus_k8s::{telemetry, Error};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Show cluster information
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Cloud region used when a CloudCluster does not set one
    #[arg(long, env = "CLOUD_REGION", default_value = "us-east-1")]
    region: String,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Operator namespace
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "default")]
    namespace: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Nimbus-K8s Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    let api: kube::Api<CloudCluster> = kube::Api::namespaced(client, &args.namespace);
    let clusters = api
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?;

    println!("Managed CloudClusters: {}", clusters.items.len());
    for cluster in &clusters.items {
        let ready = cluster.status.as_ref().map(|s| s.ready).unwrap_or(false);
        println!(
            "  {} (region: {}, ready: {})",
            cluster.metadata.name.as_deref().unwrap_or("<unnamed>"),
            cluster.spec.region,
            ready
        );
    }
    Ok(())
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    telemetry::init(args.log_json);

    info!(
        "Starting Nimbus-K8s Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;
    info!("Connected to Kubernetes cluster");

    // credentials are resolved by the environment; the engine only carries
    // the resulting bundle
    let session = CloudSession {
        region: args.region,
        access_key_id: std::env::var("CLOUD_ACCESS_KEY_ID").unwrap_or_default(),
        secret_access_key: std::env::var("CLOUD_SECRET_ACCESS_KEY").unwrap_or_default(),
        session_token: std::env::var("CLOUD_SESSION_TOKEN").ok(),
    };

    let orchestrator = ClusterOrchestrator::new(
        client.clone(),
        controller::externally_managed_services(),
        session,
    );

    let state = Arc::new(ControllerState {
        client,
        orchestrator,
    });
    controller::run_controller(state).await
}

//! cephvol driver binary
//!
//! Operator entry point for the CephFS volume driver: resolves the
//! configuration, connects to the cluster, and runs one plugin operation.
//!
//! ## Usage
//!
//! ```bash
//! cephvol check                 # connect and ensure the base namespace
//! cephvol ls                    # list volumes
//! cephvol create data           # create a volume
//! cephvol inspect data          # show a volume
//! cephvol --dry-run create data # against an in-memory cluster
//! ```

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cephvol_kernel::{
    DriverConfig, KernelMount, LocalStorage, MemoryStorage, MountCoordinator, MountPrimitive,
    RecordingMount, Reply, StorageBackend, dispatch,
};
use cli::Cli;

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = DriverConfig::from_env();
    init_tracing(cli.debug || config.as_ref().is_ok_and(|c| c.debug));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "resolved configuration");

    match run(cli, config).await {
        Ok(reply) => {
            match serde_json::to_string_pretty(&reply) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!("encoding reply: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            if reply.is_err() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: DriverConfig) -> anyhow::Result<Reply> {
    let (storage, mounter): (Arc<dyn StorageBackend>, Arc<dyn MountPrimitive>) = if cli.dry_run {
        (
            Arc::new(MemoryStorage::new(&config.base_dir)),
            Arc::new(RecordingMount::new()),
        )
    } else {
        (
            Arc::new(LocalStorage::new(&config.admin_root, &config.base_dir)),
            Arc::new(KernelMount::new(&config.servers)),
        )
    };

    let coordinator =
        MountCoordinator::start(storage, mounter, &config.mount_root, config.credentials())
            .await
            .context("driver startup")?;

    let Some(request) = cli.cmd.request() else {
        tracing::info!(?coordinator, "ready");
        return Ok(Reply::Empty {});
    };

    tracing::debug!(operation = request.operation(), "dispatching");
    Ok(dispatch(&coordinator, request).await)
}

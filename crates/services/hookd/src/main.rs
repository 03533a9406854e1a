//! Hook daemon entry point.

use std::sync::Arc;

use clap::Parser;
use hookd::{cli::Cli, context::Context, listener, prelude::*};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the hook daemon.
///
/// Initializes logging, reads the settings, connects the log store and
/// serves until interrupted.
///
/// # Examples
///
/// ```bash
/// export HOOK_TOKEN=secret
/// export HOOK_CONFIG_FILE=./configuration.json
/// hookd --mode sync
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,tower_http=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    debug!("Settings {:?}", cli);

    let ctx = Arc::new(Context::from_cli(&cli).await?);
    let listener = listener::bind(&cli).await?;
    let server = hookd::start(ctx, listener, shutdown_signal()).await?;
    let addr = server.local_addr;
    info!("hookd ready on {addr} in {:?} mode", cli.mode);

    hookd::run(server)
        .await
        .inspect_err(|err| error!("hookd stopped - {err}"))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(err) => {
            error!("Failed to listen for the interrupt signal - {err}");
            std::future::pending::<()>().await;
        }
    }
}

#![doc = include_str!("../README.md")]

mod client;
mod config;
mod http;
mod telemetry;
#[cfg(test)]
mod testing;

use clap::Parser;
use client::UserClient;
use config::{CliArgs, GatewayConfig};
use telemetry::init_telemetry;
use tokio::{net::TcpListener, signal};
use tonic::transport::Endpoint;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = GatewayConfig::try_from(args)?;

    init_telemetry()?;

    // Connect lazily so the gateway can start before the backend does.
    let channel = Endpoint::from_shared(config.backend_addr.clone())?
        .connect_timeout(config.connect_timeout)
        .connect_lazy();
    let client = UserClient::new(channel, config.client.clone());

    let listener = TcpListener::bind(&config.listen_addr).await?;
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting gateway on {} with full config: {:#?}",
            config.listen_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting gateway on {} (backend {})",
            config.listen_addr,
            config.backend_addr
        );
    }

    axum::serve(listener, http::router(client))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway shut down successfully");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}

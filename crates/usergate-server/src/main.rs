#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use futures::Stream;
use server::config::{CliArgs, ServerConfig};
use server::domain::memory::InMemoryUserRegistry;
use server::service::handler::UserRpcService;
use server::telemetry::{TelemetryProviders, init_telemetry};
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use usergate_core::proto::{FILE_DESCRIPTOR_SET, user_service_server::UserServiceServer};

type UserServer = UserServiceServer<UserRpcService>;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = ServerConfig::try_from(CliArgs::parse())?;
    let providers = init_telemetry()?;

    let registry = Arc::new(InMemoryUserRegistry::default());
    let service = UserRpcService::new(config.clone(), registry);
    announce(&config);

    if !config.uds {
        let listener = TcpListener::bind(&config.server_addr).await?;
        return serve(TcpListenerStream::new(listener), service, providers).await;
    }

    #[cfg(unix)]
    {
        use tokio::net::UnixListener;
        use tokio_stream::wrappers::UnixListenerStream;

        let listener = UnixListener::bind(&config.server_addr)?;
        let _socket = SocketFile(PathBuf::from(&config.server_addr));
        serve(UnixListenerStream::new(listener), service, providers).await
    }
    #[cfg(not(unix))]
    {
        anyhow::bail!("Unix domain sockets are not supported on this platform");
    }
}

/// Removes the Unix socket file once the server stops.
struct SocketFile(PathBuf);

impl Drop for SocketFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            tracing::debug!(path = %self.0.display(), error = %e, "Socket file not removed");
        }
    }
}

fn announce(config: &ServerConfig) {
    let transport = if config.uds { "unix socket" } else { "tcp" };
    if cfg!(debug_assertions) {
        tracing::info!(
            "UserService listening on {} ({transport}) with config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            addr = %config.server_addr,
            transport,
            max_page_size = config.max_page_size,
            shutdown_timeout = ?config.shutdown_timeout,
            "UserService listening"
        );
    }
}

/// Serves the user service, health checks and reflection on `incoming`
/// until a termination signal arrives.
async fn serve<I, IO, IE>(
    incoming: I,
    service: UserRpcService,
    providers: TelemetryProviders,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
{
    let (health, health_service) = tonic_health::server::health_reporter();
    health.set_serving::<UserServer>().await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    // Browsers reach the streaming calls through grpc-web over HTTP/1.1.
    let browser_layers = ServiceBuilder::new()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(GrpcWebLayer::new());

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(browser_layers)
        .add_service(health_service)
        .add_service(reflection)
        .add_service(with_compression(UserServiceServer::new(service.clone())))
        .serve_with_incoming_shutdown(incoming, drain_on_signal(service, health, providers))
        .await?;

    tracing::info!("UserService stopped");
    Ok(())
}

fn with_compression(server: UserServer) -> UserServer {
    [
        CompressionEncoding::Zstd,
        CompressionEncoding::Gzip,
        CompressionEncoding::Deflate,
    ]
    .into_iter()
    .fold(server, |server, encoding| {
        server.send_compressed(encoding).accept_compressed(encoding)
    })
}

/// Resolves once the server may close its listeners: health reports
/// `NOT_SERVING`, streaming calls are drained or cancelled, and metrics are
/// flushed.
async fn drain_on_signal(
    service: UserRpcService,
    health: HealthReporter,
    providers: TelemetryProviders,
) {
    wait_for_signal().await;

    health.set_not_serving::<UserServer>().await;
    tracing::info!(
        streams = service.streams_inflight(),
        "Stopped advertising UserService, draining streaming calls"
    );
    service.shutdown().await;
    providers.shutdown();
}

async fn wait_for_signal() {
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

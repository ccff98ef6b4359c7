use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `usergate-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for local development.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "usergate-server",
    version,
    about = "A gRPC user service with unary and streaming calls"
)]
pub struct CliArgs {
    /// Page size used by `GetUsers` when the request leaves `size` at zero.
    ///
    /// Environment variable: `DEFAULT_PAGE_SIZE`
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value_t = 10)]
    pub default_page_size: u32,

    /// Largest page a single `GetUsers` call may request.
    ///
    /// Environment variable: `MAX_PAGE_SIZE`
    #[arg(long, env = "MAX_PAGE_SIZE", default_value_t = 1_000)]
    pub max_page_size: u32,

    /// Delay between successive `GetUsers` messages, in milliseconds.
    ///
    /// This is a cooperative yield so a page does not flood the transport.
    /// Zero disables it.
    ///
    /// Environment variable: `PAGE_PACING_MS`
    #[arg(long, env = "PAGE_PACING_MS", default_value_t = 100)]
    pub page_pacing_ms: u64,

    /// Capacity of the outbound queue of each streaming call.
    ///
    /// Lower values increase backpressure responsiveness; higher values let
    /// a coordinator run further ahead of a slow consumer.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight calls to drain on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/usergate.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub page_pacing: Duration,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
    pub server_addr: String,
    pub uds: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 1_000,
            page_pacing: Duration::from_millis(100),
            stream_buffer_size: 8,
            shutdown_timeout: Duration::from_secs(3),
            server_addr: String::from("0.0.0.0:50051"),
            uds: false,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.default_page_size == 0 {
            bail!("DEFAULT_PAGE_SIZE must be greater than 0");
        }

        if args.default_page_size > args.max_page_size {
            bail!(
                "DEFAULT_PAGE_SIZE ({}) exceeds MAX_PAGE_SIZE ({})",
                args.default_page_size,
                args.max_page_size
            );
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            default_page_size: args.default_page_size,
            max_page_size: args.max_page_size,
            page_pacing: Duration::from_millis(args.page_pacing_ms),
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}

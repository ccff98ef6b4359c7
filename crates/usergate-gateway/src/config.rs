use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `usergate-gateway` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "usergate-gateway",
    version,
    about = "HTTP/JSON gateway in front of the usergate gRPC service"
)]
pub struct CliArgs {
    /// Address the HTTP listener binds to.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub listen_addr: String,

    /// URI of the gRPC backend.
    ///
    /// Environment variable: `BACKEND_ADDR`
    #[arg(long, env = "BACKEND_ADDR", default_value_t = String::from("http://127.0.0.1:50051"))]
    pub backend_addr: String,

    /// Connect timeout for the backend channel, in milliseconds.
    ///
    /// Environment variable: `CONNECT_TIMEOUT_MS`
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// How long a batch or sync call may take to reach its terminal event
    /// after the last request was sent, in seconds. On expiry the gateway
    /// answers with the outcome unknown.
    ///
    /// Environment variable: `COMPLETION_TIMEOUT`
    #[arg(long, env = "COMPLETION_TIMEOUT", default_value_t = 10)]
    pub completion_timeout: u64,

    /// Delay between successive `BatchCreateUsers` requests, in milliseconds.
    ///
    /// Environment variable: `BATCH_INTERVAL_MS`
    #[arg(long, env = "BATCH_INTERVAL_MS", default_value_t = 200)]
    pub batch_interval_ms: u64,

    /// Delay between successive `SyncUsers` requests, in milliseconds.
    ///
    /// Environment variable: `SYNC_INTERVAL_MS`
    #[arg(long, env = "SYNC_INTERVAL_MS", default_value_t = 500)]
    pub sync_interval_ms: u64,

    /// Capacity of the outbound queue of each streaming call.
    ///
    /// Environment variable: `CALL_BUFFER_SIZE`
    #[arg(long, env = "CALL_BUFFER_SIZE", default_value_t = 16)]
    pub call_buffer_size: usize,
}

/// Settings the client coordinator needs per call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub completion_timeout: Duration,
    pub batch_interval: Duration,
    pub sync_interval: Duration,
    pub call_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(10),
            batch_interval: Duration::from_millis(200),
            sync_interval: Duration::from_millis(500),
            call_buffer_size: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub backend_addr: String,
    pub connect_timeout: Duration,
    pub client: ClientConfig,
}

impl TryFrom<CliArgs> for GatewayConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.completion_timeout == 0 {
            bail!("COMPLETION_TIMEOUT must be greater than 0");
        }

        if args.call_buffer_size == 0 {
            bail!("CALL_BUFFER_SIZE must be greater than 0");
        }

        if !args.backend_addr.starts_with("http://") && !args.backend_addr.starts_with("https://")
        {
            bail!(
                "BACKEND_ADDR must be an http:// or https:// URI, got {}",
                args.backend_addr
            );
        }

        Ok(Self {
            listen_addr: args.listen_addr,
            backend_addr: args.backend_addr,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            client: ClientConfig {
                completion_timeout: Duration::from_secs(args.completion_timeout),
                batch_interval: Duration::from_millis(args.batch_interval_ms),
                sync_interval: Duration::from_millis(args.sync_interval_ms),
                call_buffer_size: args.call_buffer_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<GatewayConfig> {
        let args = CliArgs::try_parse_from(
            std::iter::once("usergate-gateway").chain(extra.iter().copied()),
        )?;
        GatewayConfig::try_from(args)
    }

    #[test]
    fn defaults_match_call_pacing() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.client.completion_timeout, Duration::from_secs(10));
        assert_eq!(config.client.batch_interval, Duration::from_millis(200));
        assert_eq!(config.client.sync_interval, Duration::from_millis(500));
    }

    #[test]
    fn rejects_backend_without_scheme() {
        let err = parse(&["--backend-addr", "127.0.0.1:50051"]).unwrap_err();
        assert!(err.to_string().contains("BACKEND_ADDR"));
    }

    #[test]
    fn rejects_zero_completion_timeout() {
        assert!(parse(&["--completion-timeout", "0"]).is_err());
    }
}

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cache;
mod config;
mod dispatch;
mod mcp;
mod server;
mod translate;
mod upstream;

use cache::CredentialCache;
use config::{CliConfig, FileConfig, GatewayConfig};
use dispatch::{DispatchEngine, RetryPolicy};
use server::{run_server, GatewayState};
use upstream::{ReqwestHttpClient, UpstreamClient};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. File values override CLI flags.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Base URL of the upstream plugin catalog.
    #[clap(long)]
    pub upstream_base: Option<String>,

    /// Path of the plugin list endpoint on the upstream.
    #[clap(long)]
    pub plugins_list_path: Option<String>,

    /// Time-to-live in seconds for cached tool definitions.
    #[clap(long, default_value_t = 3600)]
    pub cache_ttl_sec: u64,

    /// Timeout in seconds for upstream and origin requests.
    #[clap(long, default_value_t = 30)]
    pub request_timeout_sec: u64,

    /// Maximum attempts per origin call, including the first.
    #[clap(long, default_value_t = 3)]
    pub retry_max_attempts: u32,

    /// Base backoff delay in milliseconds between origin call retries.
    #[clap(long, default_value_t = 250)]
    pub retry_base_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    let cli_config = CliConfig {
        port: cli_args.port,
        upstream_base: cli_args.upstream_base.clone(),
        plugins_list_path: cli_args.plugins_list_path.clone(),
        cache_ttl_sec: cli_args.cache_ttl_sec,
        request_timeout_sec: cli_args.request_timeout_sec,
        retry_max_attempts: cli_args.retry_max_attempts,
        retry_base_delay_ms: cli_args.retry_base_delay_ms,
    };
    let config = GatewayConfig::resolve(&cli_config, file_config)?;

    info!(
        "Starting {} v{} against upstream {}",
        config.server_name,
        env!("CARGO_PKG_VERSION"),
        config.upstream_base
    );

    let fetcher = Arc::new(UpstreamClient::new(
        &config.upstream_base,
        &config.plugins_list_path,
        config.request_timeout(),
    ));
    let dispatcher = Arc::new(DispatchEngine::new(
        Arc::new(ReqwestHttpClient::new()),
        RetryPolicy::new(config.retry.max_attempts, config.retry_base_delay()),
        config.request_timeout(),
    ));
    let cache = Arc::new(CredentialCache::new(config.cache_ttl()));

    let state = GatewayState::new(config, cache, fetcher, dispatcher);

    run_server(state).await
}

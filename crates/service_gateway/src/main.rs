//! Price forecast gateway
//!
//! Runs the forecast engine on a timer and serves its results over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use adapter_feeds::ReconciledPriceSource;
use anyhow::Context;
use clap::Parser;
use pricer_forecast::{spawn_scheduler, ForecastEngine};
use service_gateway::config::{build_config, CliArgs as ConfigCliArgs, LogFormat};
use service_gateway::server::{shutdown_signal, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Price forecast gateway - Monte Carlo price ranges over REST
#[derive(Parser, Debug)]
#[command(name = "service_gateway")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE", env = "FORECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long, env = "FORECAST_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "FORECAST_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FORECAST_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (text, json)
    #[arg(long, env = "FORECAST_LOG_FORMAT")]
    log_format: Option<String>,

    /// Directory holding the run ledger and raw outputs
    #[arg(long, value_name = "DIR", env = "FORECAST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Worker threads per run
    #[arg(short, long, env = "FORECAST_WORKERS")]
    workers: Option<usize>,
}

impl From<Args> for ConfigCliArgs {
    fn from(args: Args) -> Self {
        ConfigCliArgs {
            config_file: args.config,
            host: args.host,
            port: args.port,
            log_level: args.log_level,
            log_format: args.log_format,
            data_dir: args.data_dir,
            workers: args.workers,
        }
    }
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cli_args: ConfigCliArgs = args.into();
    let config = build_config(&cli_args).context("loading configuration")?;

    init_tracing(config.log_level.as_filter_str(), config.log_format);

    tracing::info!("Price forecast gateway v{}", service_gateway::VERSION);
    tracing::info!(
        host = %config.host,
        port = %config.port,
        log_level = %config.log_level,
        environment = %config.environment,
        data_dir = %config.engine.data_dir.display(),
        simulations = config.engine.simulations,
        workers = config.engine.workers,
        run_interval_secs = config.engine.run_interval_secs,
        feeds = config.feeds.feeds.len(),
        "Gateway configuration loaded"
    );

    let source = ReconciledPriceSource::from_config(&config.feeds)
        .context("building price feeds")?;
    let engine = ForecastEngine::open(config.engine.clone(), Arc::new(source))
        .context("opening run log")?;

    let scheduler = spawn_scheduler(engine.clone(), config.engine.run_interval());

    let server = Server::new(config, engine);
    tracing::info!(address = %server.socket_addr()?, "Starting server");
    let result = server.run(shutdown_signal()).await;

    scheduler.abort();
    result.context("serving HTTP")?;
    tracing::info!("Gateway stopped");

    Ok(())
}

mod config;

use clap::Parser;
use config::{
    Config, ConfigError, LoggingConfig, MetricsConfig, Overrides, parse_listener, parse_ttl,
};
use gateway::ServerError;
use gateway::config::{Config as GatewayConfig, Listener};
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "artifact_proxy";

#[derive(Parser)]
#[command(version, about = "Redirects to GitHub Actions artifact downloads")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "artifact-proxy.yaml")]
    config: PathBuf,

    /// Listen address as host:port, replaces `listener` from the file
    #[arg(long, value_parser = parse_listener)]
    http_addr: Option<Listener>,

    /// Path prefix of the download route
    #[arg(long)]
    http_base_path: Option<String>,

    /// How long a resolved run is served from the cache, as seconds or a
    /// duration like `5m`
    #[arg(long, value_parser = parse_ttl)]
    github_api_cache_ttl: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            listener: self.http_addr.clone(),
            base_path: self.http_base_path.clone(),
            cache_ttl_secs: self.github_api_cache_ttl,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not set up statsd exporter: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    Recorder,
    #[error(transparent)]
    Server(#[from] ServerError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = init_logging(config.logging.as_ref());

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "artifact proxy failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = Config::from_file(&cli.config)?;
    prepare_gateway_config(&mut config.gateway, env_vars(), &cli.overrides())?;
    Ok(config)
}

/// Environment tokens first, then command line overrides, then validation.
fn prepare_gateway_config<I>(
    config: &mut GatewayConfig,
    env: I,
    overrides: &Overrides,
) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    config.merge_env_tokens(env);
    overrides.apply(config);
    config.normalize();
    config.validate()?;
    Ok(())
}

fn env_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let sentry = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    sentry
}

fn init_metrics(metrics: &MetricsConfig) -> Result<(), StartupError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|_| StartupError::Recorder)?;
    shared::metrics_defs::describe_all(gateway::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %metrics.statsd_host,
        port = metrics.statsd_port,
        "statsd exporter installed"
    );
    Ok(())
}

async fn run(config: Config) -> Result<(), StartupError> {
    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received ctrl-c, shutting down");
                shutdown.cancel();
            }
        }
    });

    gateway::run(config.gateway, shutdown).await?;
    Ok(())
}

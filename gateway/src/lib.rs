//! Per-target gateway that redirects artifact download requests to the
//! archive locations handed out by the GitHub Actions API.

pub mod arbiter;
pub mod config;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod registry;
pub mod resolver;
pub mod routing;
pub mod run_cache;
pub mod service;
pub mod targets;

#[cfg(test)]
mod testutils;

use config::{Config, ValidationError};
use handler::GatewayHandler;
use service::GatewayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
}

/// Serves the gateway, and the admin endpoints when configured, until
/// `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), ServerError> {
    config.validate()?;
    let handler = GatewayHandler::from_config(&config)?;
    tracing::info!(
        targets = handler.targets().len(),
        base_path = %config.base_path,
        "starting gateway"
    );

    let gateway_service = GatewayService::new(handler, &config.base_path, shutdown.clone());
    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway_service,
        shutdown.clone(),
    );

    let admin_task = async {
        match &config.admin_listener {
            Some(listener) => {
                let admin_service = AdminService::<_, ServerError>::new(|| true);
                run_http_service(&listener.host, listener.port, admin_service, shutdown.clone())
                    .await
            }
            None => Ok(()),
        }
    };

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}

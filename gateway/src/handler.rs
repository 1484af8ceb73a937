use crate::arbiter::ArbiterError;
use crate::config::{Config, ValidationError};
use crate::errors::GatewayError;
use crate::metrics_defs::TARGET_LOCK_TIMEOUT;
use crate::registry::{ClientRegistry, GithubClientFactory};
use crate::resolver::RunResolver;
use crate::targets::TargetStore;
use shared::counter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Path parameters of a download request, already percent-decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub target: String,
    pub run: String,
    pub artifact: String,
    /// Trailing path after the artifact name. Accepted but not used to pick
    /// an artifact.
    pub filename: String,
}

/// Turns a download request into the location of the artifact archive.
#[derive(Debug)]
pub struct GatewayHandler {
    targets: TargetStore,
    registry: ClientRegistry,
    resolver: RunResolver,
    lock_timeout: Duration,
    max_redirects: u8,
}

impl GatewayHandler {
    pub fn new(
        targets: TargetStore,
        registry: ClientRegistry,
        resolver: RunResolver,
        lock_timeout: Duration,
        max_redirects: u8,
    ) -> Self {
        GatewayHandler {
            targets,
            registry,
            resolver,
            lock_timeout,
            max_redirects,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ValidationError> {
        let targets = TargetStore::from_config(&config.targets)?;
        let factory = GithubClientFactory::new(
            config.github.api_url.clone(),
            config.github.request_timeout(),
        );
        let registry = ClientRegistry::new(config.tokens.clone(), Box::new(factory));

        Ok(GatewayHandler::new(
            targets,
            registry,
            RunResolver::new(config.github.cache_ttl()),
            config.github.lock_timeout(),
            config.github.max_redirects,
        ))
    }

    pub fn targets(&self) -> &TargetStore {
        &self.targets
    }

    /// Resolves `request` to a download URL.
    ///
    /// The target permit is held from before the cache lookup until the
    /// download URL has been obtained, and released on every exit path.
    /// Cancelling `cancel` aborts the wait for the permit as well as any
    /// in-flight API call, without touching the run cache.
    pub async fn handle(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<Url, GatewayError> {
        let target = self
            .targets
            .get(&request.target)
            .ok_or_else(|| GatewayError::UnknownTarget(request.target.clone()))?;

        let mut permit = target
            .arbiter()
            .acquire(self.lock_timeout, cancel)
            .await
            .inspect_err(|err| {
                if let ArbiterError::Timeout(_) = err {
                    counter!(TARGET_LOCK_TIMEOUT).increment(1);
                    tracing::error!(
                        target_name = target.name(),
                        "failed to acquire target lock"
                    );
                }
            })?;

        let api = self.registry.client_for(&target)?;

        let run = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            run = self.resolver.resolve(&target, &mut permit, api.as_ref(), &request.run) => run?,
        };

        let artifact_id = run
            .find_artifact(&request.artifact)
            .ok_or_else(|| GatewayError::ArtifactNotFound {
                artifact: request.artifact.clone(),
                run_id: run.run_id,
            })?;

        let url = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            url = api.artifact_download_url(target.repo(), artifact_id, self.max_redirects) => {
                url.map_err(GatewayError::DownloadUrl)?
            }
        };
        drop(permit);

        tracing::info!(
            run_id = run.run_id,
            artifact_id,
            filename = %request.filename,
            "resolved artifact download"
        );
        Ok(url)
    }
}

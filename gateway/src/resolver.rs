use crate::arbiter::TargetPermit;
use crate::metrics_defs::{RUN_CACHE_HIT, RUN_CACHE_MISS, UPSTREAM_REQUEST_DURATION};
use crate::run_cache::CachedRun;
use crate::targets::Target;
use actions_api::{ActionsApi, ApiError, WorkflowRun};
use http::StatusCode;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Run key that selects the most recent run matching the target's filter.
pub const LATEST: &str = "latest";

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("invalid run id '{0}'")]
    InvalidRunId(String),
    #[error("no runs found for workflow {0}")]
    NoRuns(String),
    #[error("upstream reported not found: {0}")]
    NotFound(#[source] ApiError),
    #[error("upstream request failed: {0}")]
    Upstream(#[source] ApiError),
}

impl From<ApiError> for ResolveError {
    fn from(err: ApiError) -> Self {
        if err.is_not_found() {
            ResolveError::NotFound(err)
        } else {
            ResolveError::Upstream(err)
        }
    }
}

impl ResolveError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResolveError::InvalidRunId(_) => StatusCode::BAD_REQUEST,
            ResolveError::NoRuns(_) | ResolveError::NotFound(_) => StatusCode::NOT_FOUND,
            ResolveError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a run key to the run it denotes and the artifacts of that run.
#[derive(Debug, Clone)]
pub struct RunResolver {
    cache_ttl: Duration,
}

impl RunResolver {
    pub fn new(cache_ttl: Duration) -> Self {
        RunResolver { cache_ttl }
    }

    /// Returns the cached resolution for `run_key` while it is fresh, otherwise
    /// resolves it against the API and stores the result.
    ///
    /// Taking the permit ties every cache access to the serialization of the
    /// target. Nothing is written unless all remote calls succeed, so a
    /// failed or abandoned attempt leaves the previous entry as it was.
    pub async fn resolve(
        &self,
        target: &Target,
        permit: &mut TargetPermit<'_>,
        api: &dyn ActionsApi,
        run_key: &str,
    ) -> Result<Arc<CachedRun>, ResolveError> {
        if let Some(run) = permit.get_fresh(run_key, self.cache_ttl) {
            counter!(RUN_CACHE_HIT).increment(1);
            tracing::debug!(run_key, run_id = run.run_id, "run cache hit");
            return Ok(run);
        }
        counter!(RUN_CACHE_MISS).increment(1);

        let run = match run_key {
            LATEST => self.latest_run(target, api).await?,
            _ => {
                let run_id = parse_run_id(run_key)
                    .ok_or_else(|| ResolveError::InvalidRunId(run_key.to_string()))?;
                timed("get_workflow_run", api.get_workflow_run(target.repo(), run_id)).await?
            }
        };

        let artifacts = timed(
            "list_run_artifacts",
            api.list_run_artifacts(target.repo(), run.id),
        )
        .await?;
        tracing::info!(
            workflow = target.workflow_file(),
            run_id = run.id,
            amount = artifacts.len(),
            "retrieved workflow artifacts"
        );

        Ok(permit.insert(run_key, CachedRun::new(run.id, artifacts)))
    }

    /// The first run listed by the API is taken as the latest one; the API
    /// offers no sort order and no sorting happens here.
    async fn latest_run(
        &self,
        target: &Target,
        api: &dyn ActionsApi,
    ) -> Result<WorkflowRun, ResolveError> {
        let runs = timed(
            "list_workflow_runs",
            api.list_workflow_runs(
                target.repo(),
                target.workflow_file(),
                target.latest_filter(),
            ),
        )
        .await?;
        let amount = runs.len();
        let run = runs
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NoRuns(target.workflow_file().to_string()))?;
        tracing::info!(
            workflow = target.workflow_file(),
            amount,
            run_id = run.id,
            head_branch = run.head_branch.as_deref(),
            event = run.event.as_deref(),
            status = run.status.as_deref(),
            "retrieved workflow runs"
        );

        Ok(run)
    }
}

/// Run ids are signed 64-bit integers upstream; negative values are rejected.
fn parse_run_id(run_key: &str) -> Option<u64> {
    let id = run_key.parse::<i64>().ok()?;
    u64::try_from(id).ok()
}

async fn timed<T>(
    operation: &'static str,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    let started = Instant::now();
    let result = call.await;
    histogram!(UPSTREAM_REQUEST_DURATION, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
    result
}

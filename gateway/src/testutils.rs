//! In-memory API double shared by the gateway tests.

use crate::registry::ClientFactory;
use crate::targets::Target;
use actions_api::{ActionsApi, ApiError, Artifact, Repo, RunFilter, WorkflowRun};
use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

pub fn test_target(name: &str) -> Target {
    Target::new(
        name,
        Repo::new("acme", "widgets"),
        "build.yml",
        RunFilter::default(),
        "main",
    )
}

fn run(id: u64) -> WorkflowRun {
    WorkflowRun {
        id,
        head_branch: None,
        event: None,
        status: None,
    }
}

fn failure(status: StatusCode, path: &str) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
        status => ApiError::UnexpectedStatus {
            status,
            path: path.to_string(),
        },
    }
}

/// Counts resolution calls and the number of them running at once.
#[derive(Default)]
pub struct FakeApi {
    runs: Mutex<Vec<WorkflowRun>>,
    artifacts: Mutex<HashMap<u64, Vec<Artifact>>>,
    fail_with: Mutex<Option<StatusCode>>,
    fail_downloads_with: Mutex<Option<StatusCode>>,
    last_filter: Mutex<Option<RunFilter>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    download_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn set_runs(&self, ids: Vec<u64>) {
        *self.runs.lock() = ids.into_iter().map(run).collect();
    }

    pub fn set_artifacts(&self, run_id: u64, artifacts: Vec<Artifact>) {
        self.artifacts.lock().insert(run_id, artifacts);
    }

    /// Makes every resolution call fail with `status`.
    pub fn fail_with(&self, status: Option<StatusCode>) {
        *self.fail_with.lock() = status;
    }

    pub fn fail_downloads_with(&self, status: Option<StatusCode>) {
        *self.fail_downloads_with.lock() = status;
    }

    /// Time every resolution call spends before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn last_filter(&self) -> Option<RunFilter> {
        self.last_filter.lock().clone()
    }

    /// Number of list/get/artifact calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, path: &str) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match *self.fail_with.lock() {
            Some(status) => Err(failure(status, path)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ActionsApi for FakeApi {
    async fn list_workflow_runs(
        &self,
        _repo: &Repo,
        workflow_file: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, ApiError> {
        *self.last_filter.lock() = Some(filter.clone());
        self.enter(workflow_file).await?;
        Ok(self.runs.lock().clone())
    }

    async fn get_workflow_run(&self, _repo: &Repo, run_id: u64) -> Result<WorkflowRun, ApiError> {
        let path = format!("runs/{run_id}");
        self.enter(&path).await?;
        match self.artifacts.lock().contains_key(&run_id) {
            true => Ok(run(run_id)),
            false => Err(ApiError::NotFound(path)),
        }
    }

    async fn list_run_artifacts(
        &self,
        _repo: &Repo,
        run_id: u64,
    ) -> Result<Vec<Artifact>, ApiError> {
        let path = format!("runs/{run_id}/artifacts");
        self.enter(&path).await?;
        self.artifacts
            .lock()
            .get(&run_id)
            .cloned()
            .ok_or(ApiError::NotFound(path))
    }

    async fn artifact_download_url(
        &self,
        repo: &Repo,
        artifact_id: u64,
        _max_redirects: u8,
    ) -> Result<Url, ApiError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.fail_downloads_with.lock() {
            return Err(failure(status, "artifacts/zip"));
        }
        let location = format!(
            "https://downloads.example.com/{}/{}/{artifact_id}.zip",
            repo.owner, repo.name
        );
        Url::parse(&location).map_err(|_| ApiError::InvalidUrl(location))
    }
}

/// Hands out the same [`FakeApi`] for every token and records the tokens.
pub struct FakeFactory {
    api: Arc<FakeApi>,
    pub created: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new(api: Arc<FakeApi>) -> Self {
        FakeFactory {
            api,
            created: Arc::default(),
        }
    }
}

impl ClientFactory for FakeFactory {
    fn create(&self, token: &str) -> Result<Arc<dyn ActionsApi>, ApiError> {
        self.created.lock().push(token.to_string());
        Ok(self.api.clone())
    }
}

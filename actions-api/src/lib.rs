//! Client for the subset of the GitHub Actions REST API needed to resolve
//! workflow runs and artifact download locations.

mod client;
mod error;
mod types;

pub use client::{ClientConfig, DEFAULT_API_URL, GithubClient};
pub use error::ApiError;
pub use types::{Artifact, Repo, RunFilter, WorkflowRun};

use async_trait::async_trait;
use url::Url;

/// Remote operations the gateway depends on.
///
/// A single failed call is final: implementations must not retry.
#[async_trait]
pub trait ActionsApi: Send + Sync {
    /// Lists runs of a workflow, most recent first as ordered by the API.
    async fn list_workflow_runs(
        &self,
        repo: &Repo,
        workflow_file: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, ApiError>;

    async fn get_workflow_run(&self, repo: &Repo, run_id: u64) -> Result<WorkflowRun, ApiError>;

    async fn list_run_artifacts(&self, repo: &Repo, run_id: u64)
    -> Result<Vec<Artifact>, ApiError>;

    /// Resolves the short-lived download location of an artifact archive,
    /// following at most `max_redirects` permanent redirects on the way.
    async fn artifact_download_url(
        &self,
        repo: &Repo,
        artifact_id: u64,
        max_redirects: u8,
    ) -> Result<Url, ApiError>;
}

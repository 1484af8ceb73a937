use crate::error::ApiError;
use crate::types::{Artifact, Artifacts, Repo, RunFilter, WorkflowRun, WorkflowRuns};
use crate::ActionsApi;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, LOCATION};
use reqwest::{RequestBuilder, Response, StatusCode, redirect};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("artifact-proxy/", env!("CARGO_PKG_VERSION"));

/// Settings for a single [`GithubClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: Url,
    /// Bearer token. `None` produces an anonymous client.
    pub token: Option<String>,
    pub timeout: Duration,
}

/// GitHub Actions REST API client.
///
/// Holds two connection pools: one following redirects for JSON endpoints and
/// one that never follows them, so that the location of an artifact download
/// can be captured instead of fetched.
#[derive(Clone, Debug)]
pub struct GithubClient {
    api: reqwest::Client,
    no_redirect: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let api = reqwest::Client::builder()
            .default_headers(headers.clone())
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        let no_redirect = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(GithubClient {
            api,
            no_redirect,
            api_url: config.api_url,
            token: config.token,
        })
    }

    fn endpoint(&self, repo: &Repo, rest: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
            .extend(rest);
        Ok(url)
    }

    fn request(&self, client: &reqwest::Client, url: Url) -> RequestBuilder {
        let builder = client.get(url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let path = response.url().path().to_string();

        match response.status() {
            StatusCode::OK => response.json::<T>().await.map_err(ApiError::Decode),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(path)),
            status => Err(ApiError::UnexpectedStatus { status, path }),
        }
    }
}

fn redirect_target(response: &Response) -> Result<Url, ApiError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingLocation)?;

    // Location may be relative to the URL that was requested.
    response
        .url()
        .join(location)
        .map_err(|e| ApiError::InvalidUrl(e.to_string()))
}

#[async_trait]
impl ActionsApi for GithubClient {
    async fn list_workflow_runs(
        &self,
        repo: &Repo,
        workflow_file: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, ApiError> {
        let url = self.endpoint(repo, &["actions", "workflows", workflow_file, "runs"])?;
        tracing::debug!(%url, ?filter, "listing workflow runs");

        let request = self.request(&self.api, url).query(&filter.query_pairs());
        let runs: WorkflowRuns = self.get_json(request).await?;
        Ok(runs.workflow_runs)
    }

    async fn get_workflow_run(&self, repo: &Repo, run_id: u64) -> Result<WorkflowRun, ApiError> {
        let url = self.endpoint(repo, &["actions", "runs", &run_id.to_string()])?;
        tracing::debug!(%url, "fetching workflow run");

        self.get_json(self.request(&self.api, url)).await
    }

    async fn list_run_artifacts(
        &self,
        repo: &Repo,
        run_id: u64,
    ) -> Result<Vec<Artifact>, ApiError> {
        let url = self.endpoint(repo, &["actions", "runs", &run_id.to_string(), "artifacts"])?;
        tracing::debug!(%url, "listing run artifacts");

        let artifacts: Artifacts = self.get_json(self.request(&self.api, url)).await?;
        Ok(artifacts.artifacts)
    }

    async fn artifact_download_url(
        &self,
        repo: &Repo,
        artifact_id: u64,
        max_redirects: u8,
    ) -> Result<Url, ApiError> {
        let mut url = self.endpoint(
            repo,
            &["actions", "artifacts", &artifact_id.to_string(), "zip"],
        )?;
        let mut hops = 0;

        loop {
            tracing::debug!(%url, hops, "requesting artifact download location");
            let response = self.request(&self.no_redirect, url.clone()).send().await?;

            match response.status() {
                StatusCode::FOUND => return redirect_target(&response),
                StatusCode::MOVED_PERMANENTLY => {
                    if hops >= max_redirects {
                        return Err(ApiError::TooManyRedirects(max_redirects));
                    }
                    hops += 1;
                    url = redirect_target(&response)?;
                }
                StatusCode::NOT_FOUND => return Err(ApiError::NotFound(url.path().to_string())),
                status => {
                    return Err(ApiError::UnexpectedStatus {
                        status,
                        path: url.path().to_string(),
                    });
                }
            }
        }
    }
}

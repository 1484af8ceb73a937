use crate::arbiter::ArbiterError;
use crate::registry::RegistryError;
use crate::resolver::ResolveError;
use actions_api::ApiError;
use http::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    #[error(transparent)]
    Permit(#[from] ArbiterError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("artifact '{artifact}' not found in run {run_id}")]
    ArtifactNotFound { artifact: String, run_id: u64 },
    #[error("could not resolve download url: {0}")]
    DownloadUrl(#[source] ApiError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("request cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Status reported to the client.
    ///
    /// A busy target or an abandoned request is reported as not found, the
    /// same as an absent one.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnknownTarget(_)
            | GatewayError::Permit(_)
            | GatewayError::ArtifactNotFound { .. }
            | GatewayError::Cancelled => StatusCode::NOT_FOUND,
            GatewayError::Resolve(err) => err.status(),
            GatewayError::DownloadUrl(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            GatewayError::DownloadUrl(_) | GatewayError::Registry(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status() {
        let cases = [
            (GatewayError::UnknownTarget("ci".into()), 404),
            (
                GatewayError::Permit(ArbiterError::Timeout(Duration::from_secs(30))),
                404,
            ),
            (GatewayError::Permit(ArbiterError::Cancelled), 404),
            (
                GatewayError::ArtifactNotFound {
                    artifact: "missing".into(),
                    run_id: 101,
                },
                404,
            ),
            (GatewayError::Resolve(ResolveError::NoRuns("build.yml".into())), 404),
            (
                GatewayError::DownloadUrl(ApiError::NotFound("artifacts/9/zip".into())),
                404,
            ),
            (GatewayError::DownloadUrl(ApiError::MissingLocation), 500),
            (
                GatewayError::Registry(RegistryError::UnknownToken("main".into())),
                500,
            ),
            (GatewayError::Cancelled, 404),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status().as_u16(), expected, "{err}");
        }
    }
}

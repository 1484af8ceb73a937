use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status} from {path}")]
    UnexpectedStatus { status: StatusCode, path: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("redirect response without a location header")]
    MissingLocation,
    #[error("more than {0} redirects while resolving download url")]
    TooManyRedirects(u8),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the API reported the requested resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

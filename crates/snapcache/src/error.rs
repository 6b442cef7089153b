use reqwest::StatusCode;

// Error type for a single fetch-and-cache attempt
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("Fetch succeeded but no cached file is available for {0}")]
    CacheMiss(String),

    #[error("Failed to notify consumers: {0}")]
    Notify(#[from] NotifyError),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
}

impl FetchError {
    /// Errors that will fail the same way on every attempt.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::UrlError(_) | FetchError::InvalidRequest(_))
    }
}

/// Failure to drop a cache entry before a forced fetch. Never fatal.
#[derive(Debug, thiserror::Error)]
#[error("Failed to invalidate cache entry {key}: {source}")]
pub struct InvalidateError {
    pub key: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid {axis}: {value} (must be a finite, non-negative pixel size)")]
    InvalidDimension { axis: &'static str, value: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

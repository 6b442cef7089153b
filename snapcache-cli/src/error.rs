use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] snapcache_engine::FetchError),

    #[error("State error: {0}")]
    State(#[from] snapcache_engine::NotifyError),

    #[error("Invalid request: {0}")]
    Request(#[from] snapcache_engine::RequestError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}

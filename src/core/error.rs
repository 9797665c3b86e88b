use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeySweepError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Curl error: {0}")]
    Curl(#[from] curl::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Search backend error: {0}")]
    SearchBackend(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, KeySweepError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CipeWatchError {
    #[error("CIPE source failed: {0}")]
    Source(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Monitoring service is no longer running")]
    ServiceStopped,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CipeWatchError>;

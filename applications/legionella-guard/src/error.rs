use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} failed: status code {status}, body: {body}")]
    Status {
        context: &'static str,
        status: u16,
        body: String,
    },
    #[error("{context} rejected credentials: status code {status}")]
    Unauthorized { context: &'static str, status: u16 },
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("checkpoint file not found: {0}")]
    CheckpointMissing(String),
    #[error("checkpoint I/O error: {0}")]
    CheckpointIo(#[from] std::io::Error),
    #[error("checkpoint parse error: {0}")]
    CheckpointParse(#[from] chrono::ParseError),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

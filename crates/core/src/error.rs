use thiserror::Error;

pub type MediaHubResult<T> = Result<T, MediaHubError>;

#[derive(Error, Debug)]
pub enum MediaHubError {
    #[error("Document store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

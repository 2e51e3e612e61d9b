use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Invalid camera config: {0}")]
    InvalidConfig(String),

    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    #[error("Unknown decode mode: {0}")]
    UnknownDecodeMode(String),

    #[error("History store error: {0}")]
    HistoryError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

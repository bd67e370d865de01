//! Upload and configuration error types.

use stowage_protocol::{SessionError, UploadStatus};
use stowage_transfer::TransferError;

/// Errors produced by the upload coordinator.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection failure: {0}")]
    Connection(String),

    #[error("remote object is larger than the local file ({remote} > {local} bytes)")]
    RemoteLargerThanLocal { remote: u64, local: u64 },

    #[error("could not delete {0} before restarting the upload")]
    DeleteFailed(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("could not materialize remote directories: {}", .0.join(", "))]
    Directory(Vec<String>),

    #[error("invalid remote target: {0:?}")]
    InvalidTarget(String),
}

impl UploadError {
    /// Caller-facing classification of this error.
    pub fn status(&self) -> UploadStatus {
        match self {
            UploadError::Connection(_) => UploadStatus::ConnectionFailure,
            UploadError::RemoteLargerThanLocal { .. } => UploadStatus::RemoteLargerThanLocal,
            UploadError::DeleteFailed(_) => UploadStatus::DeleteFailed,
            UploadError::Io(_)
            | UploadError::TransferFailed(_)
            | UploadError::Directory(_)
            | UploadError::InvalidTarget(_) => UploadStatus::TransferFailed,
        }
    }
}

impl From<SessionError> for UploadError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Unencodable { name, .. } => UploadError::InvalidTarget(name),
            e if e.is_fatal() => UploadError::Connection(e.to_string()),
            e => UploadError::TransferFailed(e.to_string()),
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Session(s) => s.into(),
            other => UploadError::TransferFailed(other.to_string()),
        }
    }
}

/// Errors produced while loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

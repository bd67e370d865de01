//! File operations on a remote store: directory materialization, listing
//! and lookup, single and bulk deletion, and asset relocation.
//!
//! Every operation re-roots the session before navigating, so none of them
//! depends on where a previous call left the working directory.

mod browse;
mod delete;
mod dirs;
mod policy;
mod relocate;
mod store;

pub use browse::{
    exists, find_by_stem, list_children, list_directory, list_remote_files, open_absolute_stream,
    open_read_stream, read_file,
};
pub use delete::{CleanupReport, delete_all, delete_remote_dir, delete_remote_file};
pub use dirs::{Materialized, ensure_directory, ensure_parent_directory};
pub use policy::{FailurePolicy, SequenceReport, run_sequence};
pub use relocate::{
    AssetCategory, AssetPatterns, DEFAULT_THUMBNAIL_MARKER, Destination, RelocateReport,
    RelocateRequest, relocate,
};
pub use store::{rename_file, store_file};

use stowage_protocol::SessionError;

/// Errors produced by file operations.
#[derive(Debug, thiserror::Error)]
pub enum FileOpsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("could not materialize directories: {}", .0.join(", "))]
    PartialDirectoryCreation(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("copy failed: {0}")]
    CopyFailed(String),

    #[error("refused by server: {0}")]
    Refused(String),
}

impl FileOpsError {
    /// Returns `true` if the underlying session is no longer usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FileOpsError::Session(e) if e.is_fatal())
    }
}

/// Keeps fatal session errors, logs and flattens the rest to `false`.
fn soften(
    result: Result<bool, SessionError>,
    op: &str,
    target: &str,
) -> Result<bool, SessionError> {
    match result {
        Ok(ok) => Ok(ok),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(op, path = %target, error = %e, "remote command failed");
            Ok(false)
        }
    }
}

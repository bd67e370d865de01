//! Block-streamed uploads with byte-offset resume, and fragment merging.
//!
//! Everything here runs on a caller-owned [`Session`](stowage_protocol::Session).
//! Nothing in this crate opens or closes the session.

mod merge;
mod progress;
mod source;
mod types;
mod upload;

pub use merge::{MergeStrategy, merge_fragments};
pub use progress::{ProgressCallback, ProgressFn};
pub use source::LocalSource;
pub use types::{FragmentSet, TransferState};
pub use upload::stream_upload;

use stowage_protocol::SessionError;

/// Default streaming block size: 1 KiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("rejected: {0}")]
    Rejected(String),
}

impl TransferError {
    /// Returns `true` if the underlying session is no longer usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::Session(e) if e.is_fatal())
    }
}

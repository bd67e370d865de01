//! Remote file-store session capability and shared value types.
//!
//! The remote protocol itself (framing, control/data channels, passive
//! negotiation) lives behind [`RemoteSession`]. Everything above it talks to
//! a [`Session`], which owns the negotiated name charset and the mutable
//! session cursor (working directory, transfer mode).

mod charset;
pub mod memory;
pub mod path;
mod session;
mod types;

pub use charset::Charset;
pub use session::{RemoteSession, Session, SessionState};
pub use types::{EntryKind, RawEntry, RemoteEntry, TransferProgress, UploadStatus};

/// Errors produced by a remote session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session is unusable (dropped, refused, or never opened).
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("command rejected: {0}")]
    Rejected(String),

    /// A name has no representation in the negotiated charset.
    #[error("name {name:?} cannot be encoded as {charset}")]
    Unencodable { name: String, charset: Charset },
}

impl SessionError {
    /// Returns `true` if the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Connection(_))
    }
}

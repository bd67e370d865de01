//! Upload orchestration over a remote store session.
//!
//! Library crate with no transport of its own: callers bring a
//! [`RemoteSession`](stowage_protocol::RemoteSession) implementation and
//! this crate decides how to get a local file onto it.
//!
//! # Decision flow
//!
//! 1. **Materialize** the target's parent directory
//! 2. **Look up** an existing object with the target name
//! 3. **Skip** if sizes match, **refuse** if the remote is larger
//! 4. **Resume** from the remote size, falling back to delete-and-restart

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::{TransferSettings, config_path};
pub use coordinator::{UploadCoordinator, UploadMode, UploadReport};
pub use error::{ConfigError, UploadError};

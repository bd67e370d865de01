use serde::{Deserialize, Serialize};

/// Kind of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "directory")]
    Directory,
}

/// A listing entry exactly as the session reports it, name still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: Vec<u8>,
    pub size: u64,
    pub kind: EntryKind,
}

/// A decoded remote directory entry.
///
/// Produced by a listing and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    pub kind: EntryKind,
}

impl RemoteEntry {
    /// Returns `true` for regular files.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Returns `true` for directories.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Name without its extension.
    pub fn stem(&self) -> &str {
        crate::path::split_extension(&self.name).0
    }
}

/// Caller-facing classification of an upload outcome.
///
/// Callers get this small enumeration instead of raw protocol text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "remote_larger_than_local")]
    RemoteLargerThanLocal,
    #[serde(rename = "delete_failed")]
    DeleteFailed,
    #[serde(rename = "transfer_failed")]
    TransferFailed,
    #[serde(rename = "connection_failure")]
    ConnectionFailure,
}

/// Percent-granular progress of a single streamed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub remote_name: String,
    /// Whole percent reached, 1..=100.
    pub percent: u8,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

//! Remote file and directory deletion.

use stowage_protocol::{RemoteSession, Session, SessionError, path};
use tracing::info;

use crate::policy::{FailurePolicy, run_sequence};
use crate::{FileOpsError, soften};

/// What a bulk cleanup removed and what it had to leave behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_files: Vec<String>,
    pub deleted_dirs: Vec<String>,
    pub failed: Vec<String>,
}

impl CleanupReport {
    /// Returns `true` if every requested path was removed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes the file at `remote_path`.
///
/// Returns `false` when the parent cannot be entered or the server refuses;
/// the cause is logged. Only a dead session is an error.
pub fn delete_remote_file<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
) -> Result<bool, SessionError> {
    remove(session, remote_path, Kind::File)
}

/// Deletes the empty directory at `remote_path`.
///
/// Same result contract as [`delete_remote_file`]. The root is never
/// removed.
pub fn delete_remote_dir<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
) -> Result<bool, SessionError> {
    remove(session, remote_path, Kind::Dir)
}

/// Deletes every path in `files`, then every path in `dirs`.
///
/// Each item is attempted regardless of earlier failures; a failed item is
/// logged and listed in [`CleanupReport::failed`]. List directories
/// deepest first, since only empty directories can be removed.
pub fn delete_all<S: RemoteSession>(
    session: &mut Session<S>,
    dirs: &[String],
    files: &[String],
) -> Result<CleanupReport, FileOpsError> {
    let files = run_sequence(FailurePolicy::BestEffortBatch, files.iter(), |p| {
        expect_removed(delete_remote_file(session, p)?, p)
    })?;
    let dirs = run_sequence(FailurePolicy::BestEffortBatch, dirs.iter(), |p| {
        expect_removed(delete_remote_dir(session, p)?, p)
    })?;

    let report = CleanupReport {
        deleted_files: files.done.into_iter().cloned().collect(),
        deleted_dirs: dirs.done.into_iter().cloned().collect(),
        failed: files.failed.into_iter().chain(dirs.failed).cloned().collect(),
    };
    info!(
        files = report.deleted_files.len(),
        dirs = report.deleted_dirs.len(),
        failed = report.failed.len(),
        "remote cleanup finished"
    );
    Ok(report)
}

#[derive(Clone, Copy)]
enum Kind {
    File,
    Dir,
}

fn remove<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
    kind: Kind,
) -> Result<bool, SessionError> {
    let (dir, name) = path::split(remote_path);
    if name.is_empty() || name == "." || name == ".." {
        tracing::warn!(path = %remote_path, "refusing to delete path without a leaf name");
        return Ok(false);
    }
    if !soften(session.enter(dir), "enter", dir)? {
        tracing::warn!(path = %remote_path, "parent directory not reachable");
        return Ok(false);
    }

    let (op, removed) = match kind {
        Kind::File => ("delete", session.delete_file(name)),
        Kind::Dir => ("rmdir", session.remove_dir(name)),
    };
    let removed = soften(removed, op, remote_path)?;
    if removed {
        info!(path = %remote_path, op, "removed remote entry");
    } else {
        tracing::warn!(path = %remote_path, op, "server refused removal");
    }
    Ok(removed)
}

fn expect_removed(removed: bool, remote_path: &str) -> Result<(), FileOpsError> {
    if removed {
        Ok(())
    } else {
        Err(FileOpsError::Refused(remote_path.to_string()))
    }
}

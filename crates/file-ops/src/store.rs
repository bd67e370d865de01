//! Whole-file writes and renames.

use std::io::{self, Read, Write};

use stowage_protocol::{RemoteSession, Session, SessionError, path};
use tracing::{info, warn};

use crate::dirs::ensure_parent_directory;
use crate::{FileOpsError, soften};

/// Writes everything from `reader` to `remote_path`, replacing any existing
/// file and creating missing parent directories.
///
/// Returns `false` if the server did not confirm the write. Reader and
/// stream errors are returned after the command has been finalized.
pub fn store_file<S: RemoteSession>(
    session: &mut Session<S>,
    reader: &mut dyn Read,
    remote_path: &str,
) -> Result<bool, FileOpsError> {
    let name = path::leaf(remote_path);
    if name.is_empty() {
        return Err(FileOpsError::NotFound(remote_path.to_string()));
    }
    ensure_parent_directory(session, remote_path)?.into_result()?;

    let copied = {
        let mut out = session.store(name)?;
        io::copy(reader, &mut out).and_then(|n| out.flush().map(|_| n))
    };
    let completed = session.complete()?;
    let bytes = copied?;
    if completed {
        info!(path = %remote_path, bytes, "stored remote file");
    } else {
        warn!(path = %remote_path, bytes, "store not confirmed by server");
    }
    Ok(completed)
}

/// Renames `from` (relative to the directory of `to_path`) to the leaf of
/// `to_path`.
///
/// Returns `false` if the directory cannot be entered or the server
/// refuses; the cause is logged.
pub fn rename_file<S: RemoteSession>(
    session: &mut Session<S>,
    from: &str,
    to_path: &str,
) -> Result<bool, SessionError> {
    let (dir, to) = path::split(to_path);
    if !soften(session.enter(dir), "enter", dir)? {
        warn!(dir = %dir, "rename directory not reachable");
        return Ok(false);
    }
    let renamed = soften(session.rename(from, to), "rename", to_path)?;
    if renamed {
        info!(from = %from, to = %to_path, "renamed remote file");
    } else {
        warn!(from = %from, to = %to_path, "server refused rename");
    }
    Ok(renamed)
}

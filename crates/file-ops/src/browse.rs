//! Remote directory listing, lookup and read streams.

use std::io::{self, Read};

use stowage_protocol::{RemoteEntry, RemoteSession, Session, path};
use tracing::{debug, warn};

use crate::FileOpsError;

/// Lists the entries of `dir`.
///
/// A directory that cannot be entered is [`FileOpsError::NotFound`]; a
/// listing failure is surfaced as the session error.
pub fn list_directory<S: RemoteSession>(
    session: &mut Session<S>,
    dir: &str,
) -> Result<Vec<RemoteEntry>, FileOpsError> {
    if !session.enter(dir)? {
        return Err(FileOpsError::NotFound(dir.to_string()));
    }
    let entries = session.list(None)?;
    debug!(dir = %dir, count = entries.len(), "listed remote directory");
    Ok(entries)
}

/// Lists the directory containing `remote_path`.
pub fn list_remote_files<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
) -> Result<Vec<RemoteEntry>, FileOpsError> {
    list_directory(session, path::parent(remote_path))
}

/// Full paths of every entry directly inside `dir`.
pub fn list_children<S: RemoteSession>(
    session: &mut Session<S>,
    dir: &str,
) -> Result<Vec<String>, FileOpsError> {
    Ok(list_directory(session, dir)?
        .into_iter()
        .map(|e| path::join(dir, &e.name))
        .collect())
}

/// Finds a file next to `remote_path` whose name without extension is `stem`.
///
/// When several files share the stem the lexicographically smallest name
/// wins.
pub fn find_by_stem<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
    stem: &str,
) -> Result<Option<RemoteEntry>, FileOpsError> {
    Ok(list_remote_files(session, remote_path)?
        .into_iter()
        .filter(|e| e.is_file() && e.stem() == stem)
        .min_by(|a, b| a.name.cmp(&b.name)))
}

/// Returns `true` if a file or directory exists at `remote_path`.
///
/// A missing parent directory or a refused listing counts as absent;
/// only a dead session is an error.
pub fn exists<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
) -> Result<bool, FileOpsError> {
    let (dir, name) = path::split(remote_path);
    if !session.enter(dir)? {
        return Ok(false);
    }
    if name.is_empty() {
        return Ok(true);
    }
    match session.list(None) {
        Ok(entries) => Ok(entries.iter().any(|e| e.name == name)),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            warn!(path = %remote_path, error = %e, "existence check failed");
            Ok(false)
        }
    }
}

/// Opens `remote_path` for reading, hands the stream to `f`, then
/// finalizes the command.
///
/// The stream is only valid inside `f`. The command is finalized even when
/// `f` fails, so the session is ready for the next command either way.
pub fn open_read_stream<S, T, F>(
    session: &mut Session<S>,
    remote_path: &str,
    f: F,
) -> Result<T, FileOpsError>
where
    S: RemoteSession,
    F: FnOnce(&mut dyn Read) -> io::Result<T>,
{
    let (dir, name) = path::split(remote_path);
    if !session.enter(dir)? {
        return Err(FileOpsError::NotFound(dir.to_string()));
    }
    read_and_complete(session, name, remote_path, f)
}

/// Like [`open_read_stream`] but passes the full path to the server from
/// the root instead of entering the parent first.
pub fn open_absolute_stream<S, T, F>(
    session: &mut Session<S>,
    remote_path: &str,
    f: F,
) -> Result<T, FileOpsError>
where
    S: RemoteSession,
    F: FnOnce(&mut dyn Read) -> io::Result<T>,
{
    if !session.cd_root()? {
        return Err(FileOpsError::NotFound("/".into()));
    }
    read_and_complete(session, remote_path, remote_path, f)
}

/// Reads the whole of `remote_path` into memory.
pub fn read_file<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
) -> Result<Vec<u8>, FileOpsError> {
    open_read_stream(session, remote_path, |r| {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        Ok(data)
    })
}

fn read_and_complete<S, T, F>(
    session: &mut Session<S>,
    name: &str,
    shown: &str,
    f: F,
) -> Result<T, FileOpsError>
where
    S: RemoteSession,
    F: FnOnce(&mut dyn Read) -> io::Result<T>,
{
    let result = {
        let mut stream = match session.retrieve(name) {
            Ok(s) => s,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(_) => return Err(FileOpsError::NotFound(shown.to_string())),
        };
        let reader: &mut dyn Read = &mut stream;
        f(reader)
    };
    let completed = session.complete()?;
    let value = result?;
    if !completed {
        warn!(path = %shown, "read not confirmed by server");
    }
    Ok(value)
}

use std::io::{Read, Seek, Write};

use stowage_protocol::{RemoteSession, Session};
use tracing::{debug, info, warn};

use crate::progress::{ProgressFn, report};
use crate::{LocalSource, TransferError, TransferState};

/// Streams `source` into `remote_name` in the working directory.
///
/// With `resume_offset > 0` the source cursor is moved to that offset and
/// the session is told to restart there; the remaining bytes are appended.
/// With 0 the whole source is appended to an empty or missing target.
///
/// The write stream is flushed and closed, the source dropped, and the
/// pending command finalized on every path. Returns the finalization
/// result. The session stays open; its owner decides when to close it.
pub fn stream_upload<S, R>(
    session: &mut Session<S>,
    remote_name: &str,
    mut source: LocalSource<R>,
    resume_offset: u64,
    progress: Option<ProgressFn<'_>>,
) -> Result<bool, TransferError>
where
    S: RemoteSession,
    R: Read + Seek,
{
    let mut state = TransferState::new(source.size(), resume_offset);

    if resume_offset > 0 {
        source.seek_to(resume_offset)?;
        session.restart_at(resume_offset)?;
        info!(
            remote = %remote_name,
            offset = resume_offset,
            total = source.size(),
            "resuming upload"
        );
    } else {
        debug!(remote = %remote_name, total = source.size(), "starting upload");
    }

    let pumped = {
        let mut out = session.append(remote_name)?;
        pump(out.as_mut(), &mut source, &mut state, remote_name, progress)
    };
    drop(source);

    let completed = session.complete();
    match (pumped, completed) {
        (Ok(()), Ok(true)) => {
            info!(remote = %remote_name, bytes = state.transferred(), "upload finished");
            Ok(true)
        }
        (Ok(()), Ok(false)) => {
            warn!(remote = %remote_name, "server did not confirm the upload");
            Ok(false)
        }
        (Ok(()), Err(e)) => Err(e.into()),
        (Err(e), completed) => {
            warn!(
                remote = %remote_name,
                sent = state.transferred(),
                error = %e,
                finalized = ?completed.as_ref().ok(),
                "upload stream failed"
            );
            match completed {
                Err(fatal) if fatal.is_fatal() => Err(fatal.into()),
                _ => Err(e),
            }
        }
    }
}

fn pump<W, R>(
    out: &mut W,
    source: &mut LocalSource<R>,
    state: &mut TransferState,
    remote_name: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<(), TransferError>
where
    W: Write + ?Sized,
    R: Read + Seek,
{
    let mut buf = vec![0u8; source.block_size()];
    loop {
        let n = source.read_block(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        report(state, n as u64, remote_name, progress);
    }
    out.flush()?;
    Ok(())
}

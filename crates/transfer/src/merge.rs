//! Reassembly of a file from previously uploaded fragments.

use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use stowage_protocol::{RemoteSession, Session, path};
use tracing::{debug, error, info, warn};

use crate::{FragmentSet, TransferError};

/// How fragment bytes are held between retrieval and append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Retrieve every fragment into memory, validate the sum, then append.
    #[default]
    #[serde(rename = "buffered")]
    Buffered,
    /// Validate the sum from listing sizes, then move one fragment at a
    /// time through a single reusable buffer.
    #[serde(rename = "per_fragment")]
    PerFragment,
}

/// Appends `fragments`, in order, into the object at `destination`.
///
/// Fragment names are relative to the destination's directory. If the
/// fragment sizes do not add up to `expected_total` nothing is written.
/// Once appending has begun, a failure leaves the destination partially
/// written. Returns the number of bytes appended.
pub fn merge_fragments<S: RemoteSession>(
    session: &mut Session<S>,
    destination: &str,
    fragments: &FragmentSet,
    strategy: MergeStrategy,
) -> Result<u64, TransferError> {
    let (dir, target) = path::split(destination);
    if target.is_empty() {
        return Err(TransferError::Rejected(format!(
            "destination has no file name: {destination}"
        )));
    }
    if !session.enter(dir)? {
        return Err(TransferError::Rejected(format!(
            "cannot enter directory {dir:?}"
        )));
    }

    let written = match strategy {
        MergeStrategy::Buffered => merge_buffered(session, target, fragments)?,
        MergeStrategy::PerFragment => merge_per_fragment(session, target, fragments)?,
    };

    info!(
        destination = %destination,
        fragments = fragments.len(),
        bytes = written,
        "fragments merged"
    );
    Ok(written)
}

fn merge_buffered<S: RemoteSession>(
    session: &mut Session<S>,
    target: &str,
    fragments: &FragmentSet,
) -> Result<u64, TransferError> {
    let mut buffers = Vec::with_capacity(fragments.len());
    let mut total: u64 = 0;
    for name in &fragments.names {
        debug!(fragment = %name, "retrieving fragment");
        let mut buf = Vec::new();
        retrieve_into(session, name, &mut buf)?;
        total += buf.len() as u64;
        buffers.push(buf);
    }

    check_total(fragments.expected_total, total)?;

    for (idx, buf) in buffers.iter().enumerate() {
        append_bytes(session, target, buf, idx)?;
    }
    Ok(total)
}

fn merge_per_fragment<S: RemoteSession>(
    session: &mut Session<S>,
    target: &str,
    fragments: &FragmentSet,
) -> Result<u64, TransferError> {
    let sizes: HashMap<String, u64> = session
        .list(None)?
        .into_iter()
        .filter(|e| e.is_file())
        .map(|e| (e.name, e.size))
        .collect();

    let mut listed = Vec::with_capacity(fragments.len());
    for name in &fragments.names {
        let size = sizes
            .get(name)
            .copied()
            .ok_or_else(|| TransferError::Rejected(format!("fragment not found: {name}")))?;
        listed.push(size);
    }
    check_total(fragments.expected_total, listed.iter().sum())?;

    let mut buf = Vec::new();
    let mut total: u64 = 0;
    for (idx, (name, &size)) in fragments.names.iter().zip(&listed).enumerate() {
        buf.clear();
        retrieve_into(session, name, &mut buf)?;
        if buf.len() as u64 != size {
            error!(fragment = %name, listed = size, read = buf.len(), "fragment changed size");
            return Err(TransferError::SizeMismatch {
                expected: size,
                actual: buf.len() as u64,
            });
        }
        append_bytes(session, target, &buf, idx)?;
        total += size;
    }
    Ok(total)
}

fn check_total(expected: u64, actual: u64) -> Result<(), TransferError> {
    if expected != actual {
        error!(expected, actual, "fragment sizes do not add up");
        return Err(TransferError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Retrieves `name` fully into `buf` and finalizes the command.
fn retrieve_into<S: RemoteSession>(
    session: &mut Session<S>,
    name: &str,
    buf: &mut Vec<u8>,
) -> Result<(), TransferError> {
    let read = session.retrieve(name)?.read_to_end(buf);
    let completed = session.complete()?;
    read?;
    if !completed {
        warn!(fragment = %name, "retrieval not confirmed by server");
    }
    Ok(())
}

fn append_bytes<S: RemoteSession>(
    session: &mut Session<S>,
    target: &str,
    data: &[u8],
    idx: usize,
) -> Result<(), TransferError> {
    let written = {
        let mut out = session.append(target)?;
        out.write_all(data).and_then(|_| out.flush())
    };
    let completed = session.complete()?;
    written?;
    if !completed {
        return Err(TransferError::Rejected(format!(
            "append of fragment #{idx} into {target} not confirmed"
        )));
    }
    Ok(())
}

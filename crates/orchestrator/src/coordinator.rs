//! Upload decision flow.
//!
//! Compares the local file against whatever already sits at the remote
//! target and picks one of: skip, resume, restart, or refuse.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use stowage_file_ops::{
    FileOpsError, RelocateReport, RelocateRequest, ensure_directory, relocate,
};
use stowage_protocol::{RemoteEntry, RemoteSession, Session, UploadStatus, path};
use stowage_transfer::{
    FragmentSet, LocalSource, ProgressCallback, TransferError, merge_fragments, stream_upload,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{TransferSettings, UploadError};

/// How an upload reached the remote target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadMode {
    /// Nothing was there; the whole file was sent.
    Full,
    /// A shorter remote object was extended from `offset`.
    Resumed { offset: u64 },
    /// Resuming failed; the remote object was deleted and the whole file sent.
    Restarted,
    /// The remote object already had the local size.
    AlreadyComplete,
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub remote_path: String,
    pub mode: UploadMode,
    pub local_size: u64,
    /// Bytes sent by the attempt that succeeded.
    pub bytes_sent: u64,
}

impl UploadReport {
    pub fn status(&self) -> UploadStatus {
        UploadStatus::Success
    }
}

/// Drives single-object uploads, one at a time.
///
/// The coordinator owns the session lifecycle for an upload: it opens or
/// re-prepares the session at the start and, unless configured otherwise,
/// logs it out at the end. The engine and helpers it calls never close it.
pub struct UploadCoordinator {
    settings: TransferSettings,
    progress: Option<ProgressCallback>,
    in_flight: Mutex<()>,
}

impl UploadCoordinator {
    pub fn new(settings: TransferSettings) -> Self {
        Self {
            settings,
            progress: None,
            in_flight: Mutex::new(()),
        }
    }

    /// Registers a callback receiving every percent tick.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Uploads `local` to `remote_path`.
    ///
    /// Blocks until done. Concurrent calls on one coordinator are serialized.
    pub fn upload<S: RemoteSession>(
        &self,
        session: &mut Session<S>,
        local: &Path,
        remote_path: &str,
    ) -> Result<UploadReport, UploadError> {
        let _guard = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let result = if session.is_open() {
            session.prepare().map_err(UploadError::from)
        } else {
            session.open().map_err(UploadError::from)
        }
        .and_then(|()| self.decide(session, local, remote_path));

        if self.settings.close_session_after_upload {
            if let Err(e) = session.close() {
                warn!(error = %e, "session logout failed");
            }
        }

        match &result {
            Ok(report) => info!(
                remote = %remote_path,
                mode = ?report.mode,
                bytes = report.bytes_sent,
                "upload done"
            ),
            Err(e) => error!(
                remote = %remote_path,
                status = ?e.status(),
                error = %e,
                "upload failed"
            ),
        }
        result
    }

    /// Runs [`upload`](Self::upload) on tokio's blocking pool.
    ///
    /// The session is handed back with the result.
    pub fn spawn_upload<S>(
        self: &Arc<Self>,
        mut session: Session<S>,
        local: PathBuf,
        remote_path: String,
    ) -> JoinHandle<(Session<S>, Result<UploadReport, UploadError>)>
    where
        S: RemoteSession + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = this.upload(&mut session, &local, &remote_path);
            (session, result)
        })
    }

    /// Merges fragments with the configured strategy.
    pub fn merge<S: RemoteSession>(
        &self,
        session: &mut Session<S>,
        destination: &str,
        fragments: &FragmentSet,
    ) -> Result<u64, TransferError> {
        merge_fragments(session, destination, fragments, self.settings.merge_strategy)
    }

    /// Relocates an asset with the configured thumbnail marker.
    pub fn relocate<S: RemoteSession>(
        &self,
        session: &mut Session<S>,
        request: &RelocateRequest<'_>,
    ) -> Result<RelocateReport, FileOpsError> {
        relocate(session, request, &self.settings.asset_patterns())
    }

    fn decide<S: RemoteSession>(
        &self,
        session: &mut Session<S>,
        local: &Path,
        remote_path: &str,
    ) -> Result<UploadReport, UploadError> {
        let local_size = std::fs::metadata(local)?.len();
        let (dir, name) = path::split(remote_path);
        if name.is_empty() {
            return Err(UploadError::InvalidTarget(remote_path.to_string()));
        }
        // Nothing is created for a target the negotiated charset cannot carry.
        session.charset().encode(remote_path)?;

        let made = ensure_directory(session, dir)?;
        if !made.is_complete() {
            return Err(UploadError::Directory(made.failed));
        }

        let existing = pick_match(session.list(None)?, name);
        let report = |mode, bytes_sent| UploadReport {
            remote_path: remote_path.to_string(),
            mode,
            local_size,
            bytes_sent,
        };

        let Some(existing) = existing else {
            debug!(remote = %remote_path, "no remote object, full upload");
            self.send(session, name, local, 0)?;
            return Ok(report(UploadMode::Full, local_size));
        };

        let remote_size = existing.size;
        if remote_size == local_size {
            info!(remote = %remote_path, size = local_size, "already uploaded");
            return Ok(report(UploadMode::AlreadyComplete, 0));
        }
        if remote_size > local_size {
            return Err(UploadError::RemoteLargerThanLocal {
                remote: remote_size,
                local: local_size,
            });
        }

        match self.attempt(session, name, local, remote_size) {
            Ok(true) => {
                return Ok(report(
                    UploadMode::Resumed {
                        offset: remote_size,
                    },
                    local_size - remote_size,
                ));
            }
            Ok(false) => warn!(remote = %remote_path, "resume not confirmed, restarting"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!(remote = %remote_path, error = %e, "resume failed, restarting"),
        }

        match session.delete_file(name) {
            Ok(true) => {}
            Ok(false) => return Err(UploadError::DeleteFailed(remote_path.to_string())),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(remote = %remote_path, error = %e, "delete before restart failed");
                return Err(UploadError::DeleteFailed(remote_path.to_string()));
            }
        }

        self.send(session, name, local, 0)?;
        Ok(report(UploadMode::Restarted, local_size))
    }

    /// One streamed attempt; an unconfirmed or failed transfer is an error.
    fn send<S: RemoteSession>(
        &self,
        session: &mut Session<S>,
        name: &str,
        local: &Path,
        offset: u64,
    ) -> Result<(), UploadError> {
        if self.attempt(session, name, local, offset)? {
            Ok(())
        } else {
            Err(UploadError::TransferFailed(format!(
                "server did not confirm {name}"
            )))
        }
    }

    fn attempt<S: RemoteSession>(
        &self,
        session: &mut Session<S>,
        name: &str,
        local: &Path,
        offset: u64,
    ) -> Result<bool, TransferError> {
        let source = LocalSource::open(local, self.settings.block_size)?;
        stream_upload(session, name, source, offset, self.progress.as_deref())
    }
}

/// Chooses the entry an upload compares against.
///
/// Only files named exactly `name` count. If a listing reports more than
/// one, the smallest wins so a resume never skips bytes another copy lacks.
fn pick_match(entries: Vec<RemoteEntry>, name: &str) -> Option<RemoteEntry> {
    entries
        .into_iter()
        .filter(|e| e.is_file() && e.name == name)
        .min_by_key(|e| e.size)
}

//! Fan-out of an asset's staged files into their final directories.
//!
//! An asset is a base name plus a handful of companion files: an archive
//! (`.zip` or `.rar`), an image (`.jpg` or `.png`), and a thumbnail named
//! with a marker prefix (`{marker}{base}.png`). Which destination a file
//! lands in depends on whether the asset itself is a picture.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use stowage_protocol::{RemoteSession, Session, SessionError};
use tracing::{debug, info, warn};

use crate::FileOpsError;
use crate::dirs::ensure_directory;
use crate::policy::{FailurePolicy, run_sequence};

/// Prefix that marks a thumbnail image in a staging directory.
pub const DEFAULT_THUMBNAIL_MARKER: &str = "thum&";

/// Kind of companion file recognized for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Archive,
    Image,
    Thumbnail,
}

/// Which of the two destination directories a file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Picture,
    File,
}

impl AssetCategory {
    /// Routing table. `None` means the file is left in staging.
    ///
    /// Picture assets send both their image and thumbnail to the file
    /// destination and have no archive. Other assets send the archive to
    /// the file destination and the image to the picture destination.
    pub fn route(self, is_picture: bool) -> Option<Destination> {
        match (self, is_picture) {
            (AssetCategory::Image | AssetCategory::Thumbnail, true) => Some(Destination::File),
            (AssetCategory::Archive, true) => None,
            (AssetCategory::Archive, false) => Some(Destination::File),
            (AssetCategory::Image, false) => Some(Destination::Picture),
            (AssetCategory::Thumbnail, false) => None,
        }
    }
}

/// Name patterns used to recognize an asset's companion files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPatterns {
    pub thumbnail_marker: String,
    pub archive_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
}

impl Default for AssetPatterns {
    fn default() -> Self {
        Self {
            thumbnail_marker: DEFAULT_THUMBNAIL_MARKER.to_string(),
            archive_extensions: vec!["zip".into(), "rar".into()],
            image_extensions: vec!["jpg".into(), "png".into()],
        }
    }
}

impl AssetPatterns {
    /// Classifies `name` against the asset `base`. Matching is exact.
    pub fn classify(&self, base: &str, name: &str) -> Option<AssetCategory> {
        if !self.thumbnail_marker.is_empty() {
            let rest = name.strip_prefix(self.thumbnail_marker.as_str());
            if rest == Some(format!("{base}.png").as_str()) {
                return Some(AssetCategory::Thumbnail);
            }
        }
        let ext = name.strip_prefix(base)?.strip_prefix('.')?;
        if self.archive_extensions.iter().any(|e| e == ext) {
            Some(AssetCategory::Archive)
        } else if self.image_extensions.iter().any(|e| e == ext) {
            Some(AssetCategory::Image)
        } else {
            None
        }
    }
}

/// Inputs for one [`relocate`] call.
#[derive(Debug, Clone, Copy)]
pub struct RelocateRequest<'a> {
    pub staging_dir: &'a str,
    pub base_name: &'a str,
    pub picture_dest: &'a str,
    pub file_dest: &'a str,
    pub is_picture: bool,
}

impl RelocateRequest<'_> {
    fn dest_dir(&self, dest: Destination) -> &str {
        match dest {
            Destination::Picture => self.picture_dest,
            Destination::File => self.file_dest,
        }
    }
}

/// Files copied by [`relocate`] and files it recognized but left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocateReport {
    /// `(file name, destination directory)` in processing order.
    pub copied: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

/// Copies the recognized files of `req.base_name` out of staging.
///
/// Both destination directories are materialized first. Matches are
/// processed in lexicographic order and the first failed copy ends the
/// call. Staged files are copied, not moved.
pub fn relocate<S: RemoteSession>(
    session: &mut Session<S>,
    req: &RelocateRequest<'_>,
    patterns: &AssetPatterns,
) -> Result<RelocateReport, FileOpsError> {
    for dir in [req.picture_dest, req.file_dest] {
        let made = ensure_directory(session, dir)?;
        if !made.is_complete() {
            warn!(dir = %dir, failed = ?made.failed, "destination not fully materialized");
        }
    }

    if !session.enter(req.staging_dir)? {
        return Err(FileOpsError::NotFound(req.staging_dir.to_string()));
    }
    let mut matched: Vec<(String, AssetCategory)> = session
        .list(None)?
        .into_iter()
        .filter(|e| e.is_file())
        .filter_map(|e| {
            let category = patterns.classify(req.base_name, &e.name)?;
            Some((e.name, category))
        })
        .collect();
    matched.sort_by(|a, b| a.0.cmp(&b.0));

    let mut report = RelocateReport::default();
    let mut plan = Vec::new();
    for (name, category) in matched {
        match category.route(req.is_picture) {
            Some(dest) => plan.push(Planned {
                name,
                dest: req.dest_dir(dest).to_string(),
            }),
            None => {
                debug!(file = %name, ?category, "not routed for this asset kind");
                report.skipped.push(name);
            }
        }
    }

    let done = run_sequence(FailurePolicy::FailFastSequence, plan, |p| {
        if !session.enter(req.staging_dir)? {
            return Err(FileOpsError::NotFound(req.staging_dir.to_string()));
        }
        copy_file(session, &p.name, &p.dest)
    })?;
    report.copied = done.done.into_iter().map(|p| (p.name, p.dest)).collect();

    info!(
        asset = %req.base_name,
        picture = req.is_picture,
        copied = report.copied.len(),
        skipped = report.skipped.len(),
        "asset relocated"
    );
    Ok(report)
}

struct Planned {
    name: String,
    dest: String,
}

impl std::fmt::Display for Planned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.name, self.dest)
    }
}

/// Copies `name` from the working directory into `dest_dir` under the same
/// name.
fn copy_file<S: RemoteSession>(
    session: &mut Session<S>,
    name: &str,
    dest_dir: &str,
) -> Result<(), FileOpsError> {
    let mut data = Vec::new();
    let read = session
        .retrieve(name)
        .map_err(|e| copy_error(e, name, "retrieve"))?
        .read_to_end(&mut data);
    let completed = session.complete()?;
    read.map_err(|e| FileOpsError::CopyFailed(format!("{name}: read: {e}")))?;
    if !completed {
        return Err(FileOpsError::CopyFailed(format!("{name}: retrieve not confirmed")));
    }

    if !session.enter(dest_dir)? {
        return Err(FileOpsError::CopyFailed(format!("{name}: cannot enter {dest_dir}")));
    }
    let written = {
        let mut out = session
            .store(name)
            .map_err(|e| copy_error(e, name, "store"))?;
        out.write_all(&data).and_then(|_| out.flush())
    };
    let completed = session.complete()?;
    written.map_err(|e| FileOpsError::CopyFailed(format!("{name}: write: {e}")))?;
    if !completed {
        return Err(FileOpsError::CopyFailed(format!("{name}: store not confirmed")));
    }
    debug!(file = %name, dest = %dest_dir, bytes = data.len(), "copied");
    Ok(())
}

fn copy_error(e: SessionError, name: &str, step: &str) -> FileOpsError {
    if e.is_fatal() {
        e.into()
    } else {
        FileOpsError::CopyFailed(format!("{name}: {step}: {e}"))
    }
}

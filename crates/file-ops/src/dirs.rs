//! Recursive remote directory creation.

use stowage_protocol::{RemoteSession, Session, SessionError, path};
use tracing::{debug, warn};

use crate::FileOpsError;

/// Result of materializing a directory path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    /// Absolute paths of directories created by this call.
    pub created: Vec<String>,
    /// Absolute paths of segments that could neither be entered nor created.
    pub failed: Vec<String>,
}

impl Materialized {
    /// Returns `true` if every segment was entered.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Hardens a permissive result into an error on any failed segment.
    pub fn into_result(self) -> Result<Self, FileOpsError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(FileOpsError::PartialDirectoryCreation(self.failed))
        }
    }
}

/// Ensures every segment of `dir` exists, leaving the session inside it.
///
/// Starts at the root. Each segment is entered, or created then entered.
/// A segment that can be neither is recorded in [`Materialized::failed`]
/// and the walk continues from wherever the session is; use
/// [`Materialized::into_result`] for fail-fast semantics. Calling this
/// again on an existing path only changes directories.
pub fn ensure_directory<S: RemoteSession>(
    session: &mut Session<S>,
    dir: &str,
) -> Result<Materialized, SessionError> {
    let mut report = Materialized::default();
    if !session.cd_root()? {
        return Err(SessionError::Rejected("cannot change to root".into()));
    }

    for seg in path::segments(dir) {
        if session.cd(seg)? {
            continue;
        }
        let attempted = path::resolve(&session.state().cwd, seg);
        if session.make_dir(seg)? && session.cd(seg)? {
            debug!(dir = %attempted, "created remote directory");
            report.created.push(attempted);
            continue;
        }
        warn!(dir = %attempted, "could not enter or create directory segment");
        report.failed.push(attempted);
    }
    Ok(report)
}

/// Ensures the directory part of `remote_path` exists.
///
/// `/a/b/c/file.txt` materializes `/a/b/c`; a trailing slash
/// (`/a/b/c/`) materializes the whole path.
pub fn ensure_parent_directory<S: RemoteSession>(
    session: &mut Session<S>,
    remote_path: &str,
) -> Result<Materialized, SessionError> {
    ensure_directory(session, path::parent(remote_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_protocol::memory::{Call, MemorySession, MemoryStore};

    fn open(store: &MemoryStore) -> Session<MemorySession> {
        let mut session = Session::new(store.session());
        session.open().unwrap();
        session
    }

    fn mkdirs(store: &MemoryStore) -> usize {
        store.count_calls(|c| matches!(c, Call::MakeDir(_)))
    }

    #[test]
    fn creates_missing_segments_and_enters_last() {
        let store = MemoryStore::new();
        store.add_dir("/a");
        let mut session = open(&store);

        let report = ensure_directory(&mut session, "/a/b/c").unwrap();
        assert!(report.is_complete());
        assert_eq!(report.created, vec!["/a/b", "/a/b/c"]);
        assert!(store.has_dir("/a/b/c"));
        assert_eq!(session.state().cwd, "/a/b/c");
        assert_eq!(session.pwd().unwrap(), "/a/b/c");
    }

    #[test]
    fn second_call_only_changes_directories() {
        let store = MemoryStore::new();
        let mut session = open(&store);

        ensure_parent_directory(&mut session, "/a/b/c/file.txt").unwrap();
        assert_eq!(mkdirs(&store), 3);
        store.clear_calls();

        let report = ensure_parent_directory(&mut session, "/a/b/c/file.txt").unwrap();
        assert!(report.created.is_empty());
        assert_eq!(mkdirs(&store), 0);
        assert_eq!(
            store.calls(),
            vec![
                Call::ChangeDir("/".into()),
                Call::ChangeDir("a".into()),
                Call::ChangeDir("b".into()),
                Call::ChangeDir("c".into()),
            ]
        );
        assert!(!store.has_dir("/a/b/c/file.txt"));
    }

    #[test]
    fn tolerates_extra_slashes() {
        let store = MemoryStore::new();
        let mut session = open(&store);
        let report = ensure_directory(&mut session, "//x//y/").unwrap();
        assert_eq!(report.created, vec!["/x", "/x/y"]);
    }

    #[test]
    fn starts_from_root_regardless_of_cwd() {
        let store = MemoryStore::new();
        store.add_dir("/elsewhere");
        let mut session = open(&store);
        session.cd("elsewhere").unwrap();

        ensure_directory(&mut session, "a").unwrap();
        assert!(store.has_dir("/a"));
        assert!(!store.has_dir("/elsewhere/a"));
    }

    #[test]
    fn failed_segment_is_recorded_and_walk_continues() {
        let store = MemoryStore::new();
        store.refuse_mkdir("/a/b");
        store.add_dir("/a");
        let mut session = open(&store);

        let report = ensure_directory(&mut session, "/a/b/c").unwrap();
        assert_eq!(report.failed, vec!["/a/b"]);
        // The walk went on from /a.
        assert_eq!(report.created, vec!["/a/c"]);
        assert!(!report.is_complete());

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, FileOpsError::PartialDirectoryCreation(ref f) if f == &["/a/b"]));
    }

    #[test]
    fn root_only_path_is_a_no_op() {
        let store = MemoryStore::new();
        let mut session = open(&store);
        let report = ensure_directory(&mut session, "/").unwrap();
        assert_eq!(report, Materialized::default());
        assert_eq!(session.state().cwd, "/");
    }
}

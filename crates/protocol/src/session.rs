use std::io::{Read, Write};

use tracing::debug;

use crate::SessionError;
use crate::charset::Charset;
use crate::path;
use crate::types::{RawEntry, RemoteEntry};

/// Raw capability of a connected remote file store.
///
/// Implemented outside this workspace on top of a real protocol client.
/// Names cross this boundary as bytes in the remote charset; callers go
/// through [`Session`], which does the transcoding.
///
/// Streams borrow the session. Dropping a stream closes it, after which
/// [`complete_pending`](Self::complete_pending) finalizes the command.
/// Implementations are sequential and not safe for concurrent use.
pub trait RemoteSession {
    /// Connects and authenticates.
    fn connect(&mut self) -> Result<(), SessionError>;

    /// Logs out and disconnects.
    fn logout(&mut self) -> Result<(), SessionError>;

    fn set_binary(&mut self) -> Result<(), SessionError>;

    fn enter_passive(&mut self) -> Result<(), SessionError>;

    /// Asks the server to accept UTF-8 names. Returns `false` if refused.
    fn enable_utf8(&mut self) -> Result<bool, SessionError>;

    /// Changes the working directory (absolute or relative).
    fn change_dir(&mut self, path: &[u8]) -> Result<bool, SessionError>;

    fn print_dir(&mut self) -> Result<Vec<u8>, SessionError>;

    /// Lists `path`, or the working directory when `None`.
    ///
    /// Listing a file yields that single entry.
    fn list(&mut self, path: Option<&[u8]>) -> Result<Vec<RawEntry>, SessionError>;

    /// Opens an overwrite stream for `name`.
    fn store(&mut self, name: &[u8]) -> Result<Box<dyn Write + '_>, SessionError>;

    /// Opens an append stream for `name`, creating it if missing.
    fn append(&mut self, name: &[u8]) -> Result<Box<dyn Write + '_>, SessionError>;

    /// Sets the byte offset the next transfer restarts at.
    fn set_restart_offset(&mut self, offset: u64);

    fn retrieve(&mut self, name: &[u8]) -> Result<Box<dyn Read + '_>, SessionError>;

    /// Finalizes the pending streaming command.
    fn complete_pending(&mut self) -> Result<bool, SessionError>;

    fn rename(&mut self, from: &[u8], to: &[u8]) -> Result<bool, SessionError>;

    fn delete_file(&mut self, name: &[u8]) -> Result<bool, SessionError>;

    fn remove_dir(&mut self, name: &[u8]) -> Result<bool, SessionError>;

    fn make_dir(&mut self, name: &[u8]) -> Result<bool, SessionError>;
}

/// Mutable cursor of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub connected: bool,
    pub binary: bool,
    pub passive: bool,
    pub utf8: bool,
    /// Absolute working directory as last confirmed by a successful change.
    pub cwd: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connected: false,
            binary: false,
            passive: false,
            utf8: false,
            cwd: "/".to_string(),
        }
    }
}

/// A remote session with name transcoding and explicit state.
///
/// Preconditions are checked here rather than assumed from call order:
/// every operation requires an open session, and stream operations switch
/// to binary mode when the state says it is not set.
pub struct Session<S> {
    remote: S,
    fallback: Charset,
    charset: Charset,
    state: SessionState,
}

impl<S: RemoteSession> Session<S> {
    /// Wraps a capability. Names fall back to GBK if UTF-8 is refused.
    pub fn new(remote: S) -> Self {
        Self::with_fallback_charset(remote, Charset::default())
    }

    /// Wraps a capability with an explicit fallback charset.
    pub fn with_fallback_charset(remote: S, fallback: Charset) -> Self {
        Self {
            remote,
            fallback,
            charset: fallback,
            state: SessionState::default(),
        }
    }

    /// Connects and prepares the session. No-op if already open.
    pub fn open(&mut self) -> Result<(), SessionError> {
        if self.state.connected {
            return Ok(());
        }
        self.remote.connect()?;
        self.state.connected = true;
        self.state.cwd = "/".to_string();
        self.prepare()
    }

    /// Enters passive mode, binary mode and negotiates the name charset.
    pub fn prepare(&mut self) -> Result<(), SessionError> {
        self.require_open()?;
        self.remote.enter_passive()?;
        self.state.passive = true;
        self.remote.set_binary()?;
        self.state.binary = true;

        let utf8 = self.remote.enable_utf8()?;
        self.state.utf8 = utf8;
        self.charset = if utf8 { Charset::Utf8 } else { self.fallback };
        debug!(charset = ?self.charset, "session prepared");
        Ok(())
    }

    /// Logs out and disconnects. No-op if already closed.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if !self.state.connected {
            return Ok(());
        }
        self.state = SessionState::default();
        self.charset = self.fallback;
        self.remote.logout()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.connected
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut S {
        &mut self.remote
    }

    pub fn into_remote(self) -> S {
        self.remote
    }

    /// Changes to the root directory.
    pub fn cd_root(&mut self) -> Result<bool, SessionError> {
        self.cd("/")
    }

    /// Changes the working directory, absolute or relative.
    pub fn cd(&mut self, dir: &str) -> Result<bool, SessionError> {
        self.require_open()?;
        let encoded = self.charset.encode(dir)?;
        let ok = self.remote.change_dir(&encoded)?;
        if ok {
            self.state.cwd = path::resolve(&self.state.cwd, dir);
        }
        Ok(ok)
    }

    /// Re-roots, then enters `dir` relative to the root.
    ///
    /// An empty `dir` (or `/`) leaves the session at the root.
    pub fn enter(&mut self, dir: &str) -> Result<bool, SessionError> {
        if !self.cd_root()? {
            return Ok(false);
        }
        let rel = dir.trim_start_matches('/');
        if rel.is_empty() {
            return Ok(true);
        }
        self.cd(rel)
    }

    /// Asks the server for the working directory.
    pub fn pwd(&mut self) -> Result<String, SessionError> {
        self.require_open()?;
        let raw = self.remote.print_dir()?;
        Ok(self.charset.decode(&raw))
    }

    /// Lists `name` (or the working directory) and decodes entry names.
    pub fn list(&mut self, name: Option<&str>) -> Result<Vec<RemoteEntry>, SessionError> {
        self.require_open()?;
        let encoded = name.map(|n| self.charset.encode(n)).transpose()?;
        let raw = self.remote.list(encoded.as_deref())?;
        let charset = self.charset;
        Ok(raw
            .into_iter()
            .map(|e| RemoteEntry {
                name: charset.decode(&e.name),
                size: e.size,
                kind: e.kind,
            })
            .collect())
    }

    pub fn store(&mut self, name: &str) -> Result<Box<dyn Write + '_>, SessionError> {
        self.require_binary()?;
        let encoded = self.charset.encode(name)?;
        self.remote.store(&encoded)
    }

    pub fn append(&mut self, name: &str) -> Result<Box<dyn Write + '_>, SessionError> {
        self.require_binary()?;
        let encoded = self.charset.encode(name)?;
        self.remote.append(&encoded)
    }

    pub fn retrieve(&mut self, name: &str) -> Result<Box<dyn Read + '_>, SessionError> {
        self.require_binary()?;
        let encoded = self.charset.encode(name)?;
        self.remote.retrieve(&encoded)
    }

    pub fn restart_at(&mut self, offset: u64) -> Result<(), SessionError> {
        self.require_open()?;
        self.remote.set_restart_offset(offset);
        Ok(())
    }

    /// Finalizes the pending streaming command.
    pub fn complete(&mut self) -> Result<bool, SessionError> {
        self.require_open()?;
        self.remote.complete_pending()
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<bool, SessionError> {
        self.require_open()?;
        let from = self.charset.encode(from)?;
        let to = self.charset.encode(to)?;
        self.remote.rename(&from, &to)
    }

    pub fn delete_file(&mut self, name: &str) -> Result<bool, SessionError> {
        self.require_open()?;
        let encoded = self.charset.encode(name)?;
        self.remote.delete_file(&encoded)
    }

    pub fn remove_dir(&mut self, name: &str) -> Result<bool, SessionError> {
        self.require_open()?;
        let encoded = self.charset.encode(name)?;
        self.remote.remove_dir(&encoded)
    }

    pub fn make_dir(&mut self, name: &str) -> Result<bool, SessionError> {
        self.require_open()?;
        let encoded = self.charset.encode(name)?;
        self.remote.make_dir(&encoded)
    }

    fn require_open(&self) -> Result<(), SessionError> {
        if self.state.connected {
            Ok(())
        } else {
            Err(SessionError::Connection("session is not open".into()))
        }
    }

    fn require_binary(&mut self) -> Result<(), SessionError> {
        self.require_open()?;
        if !self.state.binary {
            self.remote.set_binary()?;
            self.state.binary = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryStore};

    fn open_session(store: &MemoryStore) -> Session<crate::memory::MemorySession> {
        let mut session = Session::new(store.session());
        session.open().unwrap();
        session
    }

    #[test]
    fn open_prepares_modes_and_charset() {
        let store = MemoryStore::new();
        let session = open_session(&store);
        let state = session.state();
        assert!(state.connected);
        assert!(state.binary);
        assert!(state.passive);
        assert!(state.utf8);
        assert_eq!(state.cwd, "/");
        assert_eq!(session.charset(), Charset::Utf8);
    }

    #[test]
    fn utf8_refused_falls_back() {
        let store = MemoryStore::new();
        store.refuse_utf8();
        let session = open_session(&store);
        assert!(!session.state().utf8);
        assert_eq!(session.charset(), Charset::Gbk);

        let store = MemoryStore::new();
        store.refuse_utf8();
        let mut session = Session::with_fallback_charset(store.session(), Charset::Utf8);
        session.open().unwrap();
        assert_eq!(session.charset(), Charset::Utf8);
    }

    #[test]
    fn operations_require_open_session() {
        let store = MemoryStore::new();
        let mut session = Session::new(store.session());
        let err = session.cd_root().unwrap_err();
        assert!(err.is_fatal());
        assert!(session.list(None).is_err());
    }

    #[test]
    fn cd_tracks_working_directory() {
        let store = MemoryStore::new();
        store.add_dir("/a/b");
        let mut session = open_session(&store);

        assert!(session.cd("a").unwrap());
        assert_eq!(session.state().cwd, "/a");
        assert!(session.cd("b").unwrap());
        assert_eq!(session.state().cwd, "/a/b");
        assert!(!session.cd("missing").unwrap());
        assert_eq!(session.state().cwd, "/a/b");
        assert_eq!(session.pwd().unwrap(), "/a/b");
    }

    #[test]
    fn enter_always_starts_from_root() {
        let store = MemoryStore::new();
        store.add_dir("/a/b");
        store.add_dir("/x");
        let mut session = open_session(&store);
        session.cd("x").unwrap();
        store.clear_calls();

        assert!(session.enter("/a/b").unwrap());
        assert_eq!(session.state().cwd, "/a/b");
        assert_eq!(
            store.calls(),
            vec![Call::ChangeDir("/".into()), Call::ChangeDir("a/b".into())]
        );
    }

    #[test]
    fn enter_empty_stays_at_root() {
        let store = MemoryStore::new();
        let mut session = open_session(&store);
        assert!(session.enter("").unwrap());
        assert!(session.enter("/").unwrap());
        assert_eq!(session.state().cwd, "/");
    }

    #[test]
    fn list_decodes_names() {
        let store = MemoryStore::new();
        store.add_file("/docs/café.txt", b"x");
        store.refuse_utf8();
        let mut session = Session::with_fallback_charset(store.session(), Charset::Latin1);
        session.open().unwrap();
        session.enter("docs").unwrap();
        let entries = session.list(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "café.txt");
        assert_eq!(entries[0].size, 1);
    }

    #[test]
    fn gbk_names_survive_store_and_list() {
        let store = MemoryStore::new();
        store.refuse_utf8();
        let mut session = open_session(&store);
        for name in ["封面.png", "资料.png"] {
            session.store(name).unwrap().write_all(b"img").unwrap();
            assert!(session.complete().unwrap());
        }
        let mut names: Vec<String> = session
            .list(None)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        let mut expected = vec!["封面.png".to_string(), "资料.png".to_string()];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn unencodable_name_is_rejected_before_reaching_the_server() {
        let store = MemoryStore::new();
        store.refuse_utf8();
        let mut session = open_session(&store);
        store.clear_calls();
        let err = session.make_dir("相册😀").unwrap_err();
        assert!(matches!(err, SessionError::Unencodable { charset: Charset::Gbk, .. }));
        assert!(!err.is_fatal());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn close_is_idempotent_and_resets_state() {
        let store = MemoryStore::new();
        let mut session = open_session(&store);
        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(session.state(), &SessionState::default());
        let logouts = store
            .calls()
            .into_iter()
            .filter(|c| *c == Call::Logout)
            .count();
        assert_eq!(logouts, 1);
    }

    #[test]
    fn store_and_retrieve_through_session() {
        let store = MemoryStore::new();
        let mut session = open_session(&store);
        {
            let mut w = session.store("hello.txt").unwrap();
            w.write_all(b"hello").unwrap();
        }
        assert!(session.complete().unwrap());

        let mut buf = Vec::new();
        session
            .retrieve("hello.txt")
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert!(session.complete().unwrap());
        assert_eq!(buf, b"hello");
        assert_eq!(store.file("/hello.txt").unwrap(), b"hello");
    }
}

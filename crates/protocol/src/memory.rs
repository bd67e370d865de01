//! In-memory remote file store.
//!
//! A complete [`RemoteSession`] backed by maps, with a shared call log and
//! fault injection. Sessions created from one [`MemoryStore`] share its
//! tree but keep their own working directory and pending command.
//!
//! Wire names are keyed by their Latin-1 reading, so any byte sequence
//! round-trips through listings unchanged.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::path;
use crate::types::{EntryKind, RawEntry};
use crate::{RemoteSession, SessionError};

/// A command issued against the store, names in their Latin-1 reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Logout,
    SetBinary,
    EnterPassive,
    EnableUtf8,
    ChangeDir(String),
    PrintDir,
    List(Option<String>),
    Store(String),
    Append(String),
    RestartOffset(u64),
    Retrieve(String),
    CompletePending,
    Rename(String, String),
    DeleteFile(String),
    RemoveDir(String),
    MakeDir(String),
}

#[derive(Default)]
struct Faults {
    refuse_connect: bool,
    refuse_utf8: bool,
    drop_on_list: bool,
    fail_write_after: VecDeque<u64>,
    fail_complete: bool,
    refuse_delete: BTreeSet<String>,
    refuse_mkdir: BTreeSet<String>,
}

struct StoreInner {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<Call>,
    faults: Faults,
}

/// Shared handle to an in-memory tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a store containing only the root directory.
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                dirs,
                files: BTreeMap::new(),
                calls: Vec::new(),
                faults: Faults::default(),
            })),
        }
    }

    /// Opens a new, not yet connected session on this store.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            connected: false,
            cwd: "/".to_string(),
            pending: None,
        }
    }

    /// Creates a directory and all of its parents.
    pub fn add_dir(&self, dir: &str) {
        let mut inner = self.lock();
        let mut current = String::from("/");
        inner.dirs.insert(current.clone());
        for seg in path::segments(dir) {
            current = path::join(&current, seg);
            inner.dirs.insert(current.clone());
        }
    }

    /// Creates a file (and its parent directories) with `data`.
    pub fn add_file(&self, file: &str, data: &[u8]) {
        let abs = path::resolve("/", file);
        self.add_dir(path::parent(&abs));
        self.lock().files.insert(abs, data.to_vec());
    }

    /// Returns the content of a file, if present.
    pub fn file(&self, file: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&path::resolve("/", file)).cloned()
    }

    pub fn has_dir(&self, dir: &str) -> bool {
        self.lock().dirs.contains(&path::resolve("/", dir))
    }

    /// All file paths currently in the store, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Commands issued so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of logged calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Makes every subsequent `connect` fail.
    pub fn refuse_connect(&self) {
        self.lock().faults.refuse_connect = true;
    }

    /// Makes the server refuse UTF-8 names.
    pub fn refuse_utf8(&self) {
        self.lock().faults.refuse_utf8 = true;
    }

    /// Drops the connection on the next listing.
    pub fn drop_connection_on_list(&self) {
        self.lock().faults.drop_on_list = true;
    }

    /// Breaks the next write stream once `bytes` have passed through it.
    pub fn fail_next_write_after(&self, bytes: u64) {
        self.lock().faults.fail_write_after.push_back(bytes);
    }

    /// Breaks each of the upcoming write streams in turn, one limit per
    /// stream. Streams past the end of `limits` are unaffected.
    pub fn fail_writes_after(&self, limits: impl IntoIterator<Item = u64>) {
        self.lock().faults.fail_write_after.extend(limits);
    }

    /// Makes the next finalization report failure.
    pub fn fail_next_complete(&self) {
        self.lock().faults.fail_complete = true;
    }

    /// Refuses deletion of `file` (absolute path).
    pub fn refuse_delete(&self, file: &str) {
        self.lock().faults.refuse_delete.insert(path::resolve("/", file));
    }

    /// Refuses creation of `dir` (absolute path).
    pub fn refuse_mkdir(&self, dir: &str) {
        self.lock().faults.refuse_mkdir.insert(path::resolve("/", dir));
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Pending {
    failed: Arc<AtomicBool>,
}

/// One connection to a [`MemoryStore`].
pub struct MemorySession {
    store: MemoryStore,
    connected: bool,
    cwd: String,
    pending: Option<Pending>,
}

impl MemorySession {
    fn record(&self, call: Call) -> Result<MutexGuard<'_, StoreInner>, SessionError> {
        let mut inner = self.store.lock();
        inner.calls.push(call);
        if !self.connected {
            return Err(SessionError::Connection("not connected".into()));
        }
        Ok(inner)
    }

    fn resolve(&self, name: &[u8]) -> String {
        path::resolve(&self.cwd, &latin1(name))
    }

    fn begin_transfer(&mut self) -> Result<Arc<AtomicBool>, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::Rejected(
                "425 transfer already in progress".into(),
            ));
        }
        let failed = Arc::new(AtomicBool::new(false));
        self.pending = Some(Pending {
            failed: Arc::clone(&failed),
        });
        Ok(failed)
    }

    fn open_writer(&mut self, name: &[u8], truncate: bool) -> Result<MemoryWriter, SessionError> {
        let target = self.resolve(name);
        let call = if truncate {
            Call::Store(latin1(name))
        } else {
            Call::Append(latin1(name))
        };
        let fail_after = {
            let mut inner = self.record(call)?;
            if !inner.dirs.contains(path::parent_or_root(&target)) || inner.dirs.contains(&target)
            {
                return Err(SessionError::Rejected(format!("553 cannot write {target}")));
            }
            if truncate {
                inner.files.insert(target.clone(), Vec::new());
            } else {
                inner.files.entry(target.clone()).or_default();
            }
            inner.faults.fail_write_after.pop_front()
        };
        let failed = self.begin_transfer()?;
        Ok(MemoryWriter {
            store: self.store.clone(),
            path: target,
            written: 0,
            fail_after,
            failed,
        })
    }
}

impl RemoteSession for MemorySession {
    fn connect(&mut self) -> Result<(), SessionError> {
        let mut inner = self.store.lock();
        inner.calls.push(Call::Connect);
        if inner.faults.refuse_connect {
            return Err(SessionError::Connection("421 service not available".into()));
        }
        drop(inner);
        self.connected = true;
        self.cwd = "/".to_string();
        Ok(())
    }

    fn logout(&mut self) -> Result<(), SessionError> {
        self.record(Call::Logout)?;
        self.connected = false;
        self.pending = None;
        Ok(())
    }

    fn set_binary(&mut self) -> Result<(), SessionError> {
        self.record(Call::SetBinary)?;
        Ok(())
    }

    fn enter_passive(&mut self) -> Result<(), SessionError> {
        self.record(Call::EnterPassive)?;
        Ok(())
    }

    fn enable_utf8(&mut self) -> Result<bool, SessionError> {
        let inner = self.record(Call::EnableUtf8)?;
        Ok(!inner.faults.refuse_utf8)
    }

    fn change_dir(&mut self, dir: &[u8]) -> Result<bool, SessionError> {
        let target = self.resolve(dir);
        let exists = self
            .record(Call::ChangeDir(latin1(dir)))?
            .dirs
            .contains(&target);
        if exists {
            self.cwd = target;
        }
        Ok(exists)
    }

    fn print_dir(&mut self) -> Result<Vec<u8>, SessionError> {
        self.record(Call::PrintDir)?;
        Ok(encode_latin1(&self.cwd))
    }

    fn list(&mut self, name: Option<&[u8]>) -> Result<Vec<RawEntry>, SessionError> {
        let target = match name {
            Some(n) => self.resolve(n),
            None => self.cwd.clone(),
        };
        let mut inner = self.record(Call::List(name.map(latin1)))?;
        if std::mem::take(&mut inner.faults.drop_on_list) {
            drop(inner);
            self.connected = false;
            return Err(SessionError::Connection("connection reset during listing".into()));
        }

        if let Some(data) = inner.files.get(&target) {
            return Ok(vec![RawEntry {
                name: encode_latin1(path::leaf(&target)),
                size: data.len() as u64,
                kind: EntryKind::File,
            }]);
        }
        if !inner.dirs.contains(&target) {
            return Ok(Vec::new());
        }

        let mut entries: Vec<RawEntry> = inner
            .dirs
            .iter()
            .filter(|d| d.as_str() != "/" && path::parent_or_root(d) == target)
            .map(|d| RawEntry {
                name: encode_latin1(path::leaf(d)),
                size: 0,
                kind: EntryKind::Directory,
            })
            .collect();
        entries.extend(
            inner
                .files
                .iter()
                .filter(|(f, _)| path::parent_or_root(f) == target)
                .map(|(f, data)| RawEntry {
                    name: encode_latin1(path::leaf(f)),
                    size: data.len() as u64,
                    kind: EntryKind::File,
                }),
        );
        Ok(entries)
    }

    fn store(&mut self, name: &[u8]) -> Result<Box<dyn Write + '_>, SessionError> {
        Ok(Box::new(self.open_writer(name, true)?))
    }

    fn append(&mut self, name: &[u8]) -> Result<Box<dyn Write + '_>, SessionError> {
        Ok(Box::new(self.open_writer(name, false)?))
    }

    fn set_restart_offset(&mut self, offset: u64) {
        self.store.lock().calls.push(Call::RestartOffset(offset));
    }

    fn retrieve(&mut self, name: &[u8]) -> Result<Box<dyn Read + '_>, SessionError> {
        let target = self.resolve(name);
        let data = self
            .record(Call::Retrieve(latin1(name)))?
            .files
            .get(&target)
            .cloned()
            .ok_or_else(|| SessionError::Rejected(format!("550 no such file {target}")))?;
        self.begin_transfer()?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn complete_pending(&mut self) -> Result<bool, SessionError> {
        let fail = std::mem::take(&mut self.record(Call::CompletePending)?.faults.fail_complete);
        match self.pending.take() {
            Some(p) => Ok(!fail && !p.failed.load(Ordering::SeqCst)),
            None => Ok(false),
        }
    }

    fn rename(&mut self, from: &[u8], to: &[u8]) -> Result<bool, SessionError> {
        let src = self.resolve(from);
        let dst = self.resolve(to);
        let mut inner = self.record(Call::Rename(latin1(from), latin1(to)))?;
        if !inner.dirs.contains(path::parent_or_root(&dst)) || inner.files.contains_key(&dst) {
            return Ok(false);
        }
        match inner.files.remove(&src) {
            Some(data) => {
                inner.files.insert(dst, data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_file(&mut self, name: &[u8]) -> Result<bool, SessionError> {
        let target = self.resolve(name);
        let mut inner = self.record(Call::DeleteFile(latin1(name)))?;
        if inner.faults.refuse_delete.contains(&target) {
            return Ok(false);
        }
        Ok(inner.files.remove(&target).is_some())
    }

    fn remove_dir(&mut self, name: &[u8]) -> Result<bool, SessionError> {
        let target = self.resolve(name);
        let mut inner = self.record(Call::RemoveDir(latin1(name)))?;
        let has_children = inner
            .dirs
            .iter()
            .any(|d| d.as_str() != "/" && path::parent_or_root(d) == target)
            || inner.files.keys().any(|f| path::parent_or_root(f) == target);
        if target == "/" || has_children {
            return Ok(false);
        }
        Ok(inner.dirs.remove(&target))
    }

    fn make_dir(&mut self, name: &[u8]) -> Result<bool, SessionError> {
        let target = self.resolve(name);
        let mut inner = self.record(Call::MakeDir(latin1(name)))?;
        if inner.faults.refuse_mkdir.contains(&target)
            || !inner.dirs.contains(path::parent_or_root(&target))
            || inner.files.contains_key(&target)
        {
            return Ok(false);
        }
        Ok(inner.dirs.insert(target))
    }
}

/// Write stream into a stored file. Bytes land as they are written.
struct MemoryWriter {
    store: MemoryStore,
    path: String,
    written: u64,
    fail_after: Option<u64>,
    failed: Arc<AtomicBool>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "data connection closed"));
        }
        let allowed = match self.fail_after {
            Some(limit) => {
                let room = limit.saturating_sub(self.written) as usize;
                room.min(buf.len())
            }
            None => buf.len(),
        };
        if allowed == 0 && !buf.is_empty() {
            self.failed.store(true, Ordering::SeqCst);
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "data connection reset",
            ));
        }

        let mut inner = self.store.lock();
        inner
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(&buf[..allowed]);
        self.written += allowed as u64;
        Ok(allowed)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn encode_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(store: &MemoryStore) -> MemorySession {
        let mut s = store.session();
        s.connect().unwrap();
        s
    }

    #[test]
    fn mkdir_requires_parent() {
        let store = MemoryStore::new();
        let mut s = connected(&store);
        assert!(!s.make_dir(b"a/b").unwrap());
        assert!(s.make_dir(b"a").unwrap());
        assert!(s.make_dir(b"a/b").unwrap());
        assert!(!s.make_dir(b"a").unwrap());
        assert!(store.has_dir("/a/b"));
    }

    #[test]
    fn list_file_returns_single_entry() {
        let store = MemoryStore::new();
        store.add_file("/d/f.bin", b"1234");
        let mut s = connected(&store);
        s.change_dir(b"/d").unwrap();
        let entries = s.list(Some(b"f.bin")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 4);
        assert!(s.list(Some(b"nope")).unwrap().is_empty());
    }

    #[test]
    fn list_directory_children() {
        let store = MemoryStore::new();
        store.add_file("/d/a.txt", b"a");
        store.add_dir("/d/sub/deeper");
        store.add_file("/other.txt", b"x");
        let mut s = connected(&store);
        let entries = s.list(Some(b"/d")).unwrap();
        let names: Vec<_> = entries.iter().map(|e| latin1(&e.name)).collect();
        assert_eq!(names, vec!["sub", "a.txt"]);
    }

    #[test]
    fn append_extends_existing_file() {
        let store = MemoryStore::new();
        store.add_file("/f.bin", b"abc");
        let mut s = connected(&store);
        {
            let mut w = s.append(b"f.bin").unwrap();
            w.write_all(b"def").unwrap();
        }
        assert!(s.complete_pending().unwrap());
        assert_eq!(store.file("/f.bin").unwrap(), b"abcdef");
    }

    #[test]
    fn injected_write_failure_keeps_prefix_and_fails_completion() {
        let store = MemoryStore::new();
        store.fail_next_write_after(2);
        let mut s = connected(&store);
        {
            let mut w = s.append(b"f.bin").unwrap();
            assert!(w.write_all(b"abcdef").is_err());
        }
        assert!(!s.complete_pending().unwrap());
        assert_eq!(store.file("/f.bin").unwrap(), b"ab");

        // One-shot: the next stream works.
        {
            let mut w = s.append(b"f.bin").unwrap();
            w.write_all(b"cd").unwrap();
        }
        assert!(s.complete_pending().unwrap());
    }

    #[test]
    fn queued_write_failures_apply_one_per_stream() {
        let store = MemoryStore::new();
        store.fail_writes_after([3, 1]);
        let mut s = connected(&store);
        {
            let mut w = s.store(b"f.bin").unwrap();
            assert!(w.write_all(b"abcdef").is_err());
        }
        assert!(!s.complete_pending().unwrap());
        assert_eq!(store.file("/f.bin").unwrap(), b"abc");
        {
            let mut w = s.append(b"f.bin").unwrap();
            assert!(w.write_all(b"def").is_err());
        }
        assert!(!s.complete_pending().unwrap());
        assert_eq!(store.file("/f.bin").unwrap(), b"abcd");
        {
            let mut w = s.append(b"f.bin").unwrap();
            w.write_all(b"ef").unwrap();
        }
        assert!(s.complete_pending().unwrap());
        assert_eq!(store.file("/f.bin").unwrap(), b"abcdef");
    }

    #[test]
    fn second_stream_rejected_while_pending() {
        let store = MemoryStore::new();
        store.add_file("/f.bin", b"abc");
        let mut s = connected(&store);
        drop(s.retrieve(b"f.bin").unwrap());
        assert!(s.retrieve(b"f.bin").is_err());
        assert!(s.complete_pending().unwrap());
        assert!(s.retrieve(b"f.bin").is_ok());
    }

    #[test]
    fn remove_dir_requires_empty() {
        let store = MemoryStore::new();
        store.add_file("/d/f", b"");
        let mut s = connected(&store);
        assert!(!s.remove_dir(b"/d").unwrap());
        assert!(s.delete_file(b"/d/f").unwrap());
        assert!(s.remove_dir(b"/d").unwrap());
        assert!(!store.has_dir("/d"));
    }

    #[test]
    fn disconnected_session_fails() {
        let store = MemoryStore::new();
        let mut s = store.session();
        let err = s.change_dir(b"/").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn dropped_connection_on_list() {
        let store = MemoryStore::new();
        store.drop_connection_on_list();
        let mut s = connected(&store);
        assert!(s.list(None).unwrap_err().is_fatal());
        assert!(s.change_dir(b"/").unwrap_err().is_fatal());
    }

    #[test]
    fn rename_moves_file() {
        let store = MemoryStore::new();
        store.add_file("/d/old.txt", b"data");
        let mut s = connected(&store);
        s.change_dir(b"/d").unwrap();
        assert!(s.rename(b"old.txt", b"new.txt").unwrap());
        assert!(store.file("/d/old.txt").is_none());
        assert_eq!(store.file("/d/new.txt").unwrap(), b"data");
        assert!(!s.rename(b"old.txt", b"x.txt").unwrap());
    }
}

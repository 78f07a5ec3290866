//! File-backed state store with per-key exclusive locking.
//!
//! Layout:
//!   <root>/dedup/<stream>.json        one DedupRecord per stream
//!   <root>/votes/<message_id>.json    one VoteLedger per delivered message
//!   <root>/<ns>/<key>.json.lock       advisory lock sidecar
//!
//! Writers take an exclusive `flock` on the sidecar, so two writers of the
//! same key serialize (across threads and processes) while different keys
//! never contend. Commits go through [`io::atomic_write`]; readers take no
//! lock and observe either the previous or the new file, never a partial one.
//! The lock lives on a sidecar because the rename swaps the data file's inode.

use crate::error::{CoachError, Result};
use crate::{io, paths};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// The two logical records the store owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Dedup,
    Votes,
}

impl Namespace {
    pub fn dir(&self) -> &'static str {
        match self {
            Namespace::Dedup => paths::DEDUP_DIR,
            Namespace::Votes => paths::VOTES_DIR,
        }
    }

    pub fn all() -> &'static [Namespace] {
        &[Namespace::Dedup, Namespace::Votes]
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open the store rooted at `root`, creating namespace directories.
    ///
    /// Fails with [`CoachError::StoreUnavailable`] when a directory cannot be
    /// created or written. That is a deployment problem (ownership, read-only
    /// mount) and is reported rather than retried.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for ns in Namespace::all() {
            let dir = paths::namespace_dir(&root, ns.dir());
            std::fs::create_dir_all(&dir)
                .and_then(|_| io::check_writable(&dir))
                .map_err(|e| unavailable(&dir, &e))?;
        }
        tracing::debug!(root = %root.display(), "state store opened");
        Ok(Self { root })
    }

    /// Open an existing store for inspection without creating or probing
    /// anything. Writes through this handle still take the usual locks.
    pub fn open_read_only(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoachError::StoreUnavailable {
                path: root.display().to_string(),
                reason: "state directory does not exist".to_string(),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the committed value for `key`, or `None` if it was never written.
    pub fn get<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Result<Option<T>> {
        paths::validate_key(key)?;
        read_record(&paths::record_path(&self.root, ns.dir(), key))
    }

    /// Read-modify-write `key` under its exclusive lock. Returns the new value.
    pub fn put<T, F>(&self, ns: Namespace, key: &str, mutator: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        self.try_put(ns, key, |current| Ok(mutator(current)))
    }

    /// Like [`Store::put`], but the mutator may refuse. A refusal leaves the
    /// committed value untouched.
    pub fn try_put<T, F>(&self, ns: Namespace, key: &str, mutator: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Result<T>,
    {
        let guard = self.lock(ns, key)?;
        let next = mutator(guard.read()?)?;
        guard.write(&next)?;
        Ok(next)
    }

    /// Acquire the exclusive lock for `key`, blocking until it is free.
    ///
    /// Use this when several steps must observe the same value, e.g. a
    /// dedup check that has to stay valid until the commit.
    pub fn lock(&self, ns: Namespace, key: &str) -> Result<KeyGuard> {
        paths::validate_key(key)?;
        let lock_path = paths::lock_path(&self.root, ns.dir(), key);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| classify(&lock_path, e))?;
        file.lock_exclusive().map_err(|e| classify(&lock_path, e))?;
        Ok(KeyGuard {
            file,
            path: paths::record_path(&self.root, ns.dir(), key),
        })
    }

    /// List the keys that have a committed value in `ns`, sorted.
    pub fn keys(&self, ns: Namespace) -> Result<Vec<String>> {
        let dir = paths::namespace_dir(&self.root, ns.dir());
        let suffix = format!(".{}", paths::RECORD_EXT);
        let mut keys = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(classify(&dir, e)),
        };
        for entry in entries {
            let name = entry?.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(&suffix)) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// KeyGuard
// ---------------------------------------------------------------------------

/// Holds the exclusive lock for one key until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    file: File,
    path: PathBuf,
}

impl KeyGuard {
    pub fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        read_record(&self.path)
    }

    pub fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(value)?;
        data.push(b'\n');
        io::atomic_write(&self.path, &data).map_err(|e| match e {
            CoachError::Io(io_err) => classify(&self.path, io_err),
            other => other,
        })
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(classify(path, e)),
    };
    Ok(Some(serde_json::from_slice(&data)?))
}

fn unavailable(path: &Path, err: &std::io::Error) -> CoachError {
    CoachError::StoreUnavailable {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn classify(path: &Path, err: std::io::Error) -> CoachError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        unavailable(path, &err)
    } else {
        CoachError::Io(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Crash-safe file commits for the state store.

use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

const PENDING_PREFIX: &str = ".pending-";

/// Replace `path` with `data` in one rename.
///
/// The bytes go to a hidden sibling tempfile that is fsynced before it is
/// persisted over `path`, then the directory is synced so the rename itself
/// is durable. A failed write (full disk, crash) leaves the previous
/// contents untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut pending = pending_in(dir)?;
    pending.write_all(data)?;
    pending.as_file().sync_all()?;
    pending.persist(path).map_err(|e| e.error)?;
    sync_dir(dir)?;
    Ok(())
}

/// Flush a directory's entries to disk.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

/// Directories cannot be opened as files here; the rename is left to the OS.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Fail unless `dir` accepts new files. The scratch file is removed on drop.
pub fn check_writable(dir: &Path) -> std::io::Result<()> {
    pending_in(dir)?.write_all(b"ok")
}

fn pending_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    Builder::new().prefix(PENDING_PREFIX).tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn commit_then_overwrite_with_shorter_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("team-a.json");
        atomic_write(&path, b"{\"last_period\":\"2026-02-06\"}").unwrap();
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn missing_parents_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/votes/1.2.json");
        atomic_write(&path, b"{}").unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn no_pending_files_survive_a_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("k.json");
        atomic_write(&path, b"1").unwrap();
        atomic_write(&path, b"2").unwrap();
        assert_eq!(entries(dir.path()), vec!["k.json".to_string()]);
    }

    #[test]
    fn writable_check_cleans_up_after_itself() {
        let dir = TempDir::new().unwrap();
        check_writable(dir.path()).unwrap();
        assert!(entries(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn sync_dir_needs_an_existing_directory() {
        let dir = TempDir::new().unwrap();
        sync_dir(dir.path()).unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn writable_check_rejects_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(check_writable(&dir.path().join("missing")).is_err());
    }
}

use crate::error::{CoachError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DEDUP_DIR: &str = "dedup";
pub const VOTES_DIR: &str = "votes";

pub const RECORD_EXT: &str = "json";
pub const LOCK_EXT: &str = "json.lock";

pub const DEFAULT_CONFIG_FILE: &str = "coach.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn namespace_dir(root: &Path, namespace: &str) -> PathBuf {
    root.join(namespace)
}

pub fn record_path(root: &Path, namespace: &str, key: &str) -> PathBuf {
    namespace_dir(root, namespace).join(format!("{key}.{RECORD_EXT}"))
}

pub fn lock_path(root: &Path, namespace: &str, key: &str) -> PathBuf {
    namespace_dir(root, namespace).join(format!("{key}.{LOCK_EXT}"))
}

// ---------------------------------------------------------------------------
// Key validation
// ---------------------------------------------------------------------------

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9._\-]*$").unwrap())
}

/// Keys become file names, so anything that could escape the namespace
/// directory (separators, a leading dot) is rejected.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 200 || !key_re().is_match(key) {
        return Err(CoachError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

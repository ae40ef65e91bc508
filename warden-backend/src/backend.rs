//! The filesystem capability contract shared by local and remote backends.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::BackendError;

/// One `(local source, destination)` pair for [`FilesystemBackend::copy_files_batch`].
pub type CopyPair = (PathBuf, String);

/// Outcome of [`FilesystemBackend::copy_files_batch`]: one entry per input
/// pair, in input order.
pub type BatchOutcome = Vec<Result<(), BackendError>>;

/// Filesystem operations the synchronization engine needs, implemented once
/// for local disk ([`crate::LocalBackend`]) and once for ssh hosts
/// ([`crate::RemoteBackend`]).
///
/// Destination paths are strings because remote paths are interpreted by the
/// remote shell, not the local OS. Relative destinations resolve against the
/// backend's base path. Sources are always local files.
pub trait FilesystemBackend: Send + Sync + fmt::Debug {
    /// Non-failing existence check. An unreachable host reads as "absent";
    /// use [`FilesystemBackend::try_exists`] to tell the two apart.
    fn exists(&self, path: &str) -> bool {
        self.try_exists(path).unwrap_or(false)
    }

    /// Non-failing directory check.
    fn is_dir(&self, path: &str) -> bool {
        self.try_is_dir(path).unwrap_or(false)
    }

    /// Existence check that surfaces connectivity failures.
    fn try_exists(&self, path: &str) -> Result<bool, BackendError>;

    /// Directory check that surfaces connectivity failures.
    fn try_is_dir(&self, path: &str) -> Result<bool, BackendError>;

    /// Create a directory. With `exist_ok` an existing directory is a no-op;
    /// with `parents` missing ancestors are created.
    fn mkdir(&self, path: &str, parents: bool, exist_ok: bool) -> Result<(), BackendError>;

    /// Copy a local file to `dest`, creating parent directories and replacing
    /// whatever is already there.
    fn copy_file(&self, source: &Path, dest: &str) -> Result<(), BackendError>;

    /// Same result as calling [`FilesystemBackend::copy_file`] for every pair,
    /// reported per pair. Implementations may batch pairs sharing a
    /// destination directory; a failed transfer fails only the pairs it
    /// carried. When `create_dirs` is false the destination directories must
    /// already exist.
    fn copy_files_batch(&self, pairs: &[CopyPair], create_dirs: bool) -> BatchOutcome {
        pairs
            .iter()
            .map(|(source, dest)| {
                if create_dirs {
                    if let Some(parent) = parent_of(dest) {
                        self.mkdir(&parent, true, true)?;
                    }
                }
                self.copy_file(source, dest)
            })
            .collect()
    }

    /// Remove a file. Removing an absent file succeeds.
    fn remove_file(&self, path: &str) -> Result<(), BackendError>;

    /// SHA-256 hex digest of the file. Fails with a not-found error when the
    /// path is absent.
    fn checksum(&self, path: &str) -> Result<String, BackendError>;

    /// Read a text file.
    fn read_to_string(&self, path: &str) -> Result<String, BackendError>;

    fn supports_symlinks(&self) -> bool;

    /// Create `dest` as a symlink to the local `source`. Callers must check
    /// [`FilesystemBackend::supports_symlinks`] first.
    fn create_symlink(&self, source: &Path, dest: &str) -> Result<(), BackendError> {
        let _ = (source, dest);
        Err(BackendError::SymlinksUnsupported {
            backend: self.kind().to_string(),
        })
    }

    /// Canonical display form: absolute path, or `user@host:path`.
    fn location_string(&self) -> String;

    /// `"local"` or `"remote"`.
    fn kind(&self) -> &'static str;

    fn is_remote(&self) -> bool {
        self.kind() == "remote"
    }
}

/// Join a destination directory and a relative file name with `/`.
pub fn join_dest(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Parent directory of a `/`-separated destination path, if it has one.
pub fn parent_of(dest: &str) -> Option<String> {
    let trimmed = dest.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        return Some("/".to_string());
    }
    Some(trimmed[..idx].to_string())
}

/// Final component of a `/`-separated destination path.
pub fn file_name_of(dest: &str) -> &str {
    let trimmed = dest.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

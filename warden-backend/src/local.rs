//! Local-disk backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::backend::FilesystemBackend;
use crate::checksum;
use crate::error::{io_err, BackendError};

/// Backend for paths on the controlling host.
///
/// Relative paths resolve against `base` when set, else the process's
/// current directory. A leading `~` expands to the user's home directory.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    base: Option<PathBuf>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    /// Absolute filesystem path for `path`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let expanded = expand_tilde(path);
        if expanded.is_absolute() {
            return expanded;
        }
        match &self.base {
            Some(base) => base.join(expanded),
            None => std::env::current_dir()
                .map(|cwd| cwd.join(&expanded))
                .unwrap_or(expanded),
        }
    }

    /// Remove `path` if it is a file or a symlink (dangling or not).
    fn clear(path: &Path) -> Result<(), BackendError> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => Err(io_err(
                path,
                std::io::Error::other("destination is a directory"),
            )),
            Ok(_) => std::fs::remove_file(path).map_err(|e| io_err(path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(path, e)),
        }
    }

    fn ensure_parent(path: &Path) -> Result<(), BackendError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl FilesystemBackend for LocalBackend {
    fn try_exists(&self, path: &str) -> Result<bool, BackendError> {
        Ok(self.resolve(path).exists())
    }

    fn try_is_dir(&self, path: &str) -> Result<bool, BackendError> {
        Ok(self.resolve(path).is_dir())
    }

    fn mkdir(&self, path: &str, parents: bool, exist_ok: bool) -> Result<(), BackendError> {
        let dir = self.resolve(path);
        if exist_ok && dir.is_dir() {
            return Ok(());
        }
        let result = if parents {
            std::fs::create_dir_all(&dir)
        } else {
            std::fs::create_dir(&dir)
        };
        result.map_err(|e| io_err(&dir, e))
    }

    fn copy_file(&self, source: &Path, dest: &str) -> Result<(), BackendError> {
        let dest_path = self.resolve(dest);
        Self::ensure_parent(&dest_path)?;
        // A symlinked destination may point at `source`; copying through it
        // would truncate the source.
        Self::clear(&dest_path)?;
        std::fs::copy(source, &dest_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound if !source.exists() => BackendError::PathNotFound {
                path: source.display().to_string(),
            },
            _ => io_err(&dest_path, e),
        })?;
        tracing::debug!(source = %source.display(), dest = %dest_path.display(), "copied");
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), BackendError> {
        Self::clear(&self.resolve(path))
    }

    fn checksum(&self, path: &str) -> Result<String, BackendError> {
        checksum::digest_file(&self.resolve(path))
    }

    fn read_to_string(&self, path: &str) -> Result<String, BackendError> {
        let resolved = self.resolve(path);
        std::fs::read_to_string(&resolved).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::PathNotFound {
                path: resolved.display().to_string(),
            },
            _ => io_err(&resolved, e),
        })
    }

    fn supports_symlinks(&self) -> bool {
        true
    }

    fn create_symlink(&self, source: &Path, dest: &str) -> Result<(), BackendError> {
        let dest_path = self.resolve(dest);
        Self::ensure_parent(&dest_path)?;
        Self::clear(&dest_path)?;
        symlink(source, &dest_path).map_err(|e| io_err(&dest_path, e))?;
        tracing::debug!(source = %source.display(), dest = %dest_path.display(), "symlinked");
        Ok(())
    }

    fn location_string(&self) -> String {
        match &self.base {
            Some(base) => base.display().to_string(),
            None => std::env::current_dir()
                .map(|cwd| cwd.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        }
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, dest)
}

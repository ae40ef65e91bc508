//! Error types for warden-backend.

use std::path::PathBuf;

use thiserror::Error;

/// All errors a [`crate::FilesystemBackend`] operation can raise.
///
/// Remote variants carry the ssh target so callers can wrap them with
/// artifact/target context without losing where the failure happened.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Host unreachable, authentication refused, or the operation timed out.
    #[error("cannot reach {target}: {detail}")]
    Connection { target: String, detail: String },

    /// The remote side refused the operation.
    #[error("permission denied on {target}: {detail}")]
    Permission { target: String, detail: String },

    /// The path does not exist.
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// Any other failed remote command or transfer.
    #[error("remote operation failed: {detail}")]
    Operation { detail: String },

    /// `ssh`, `rsync` or `scp` is not installed locally.
    #[error("{tool} not found; please install it")]
    ToolMissing { tool: String },

    /// Symlink creation requested on a backend that cannot create symlinks.
    #[error("{backend} backend does not support symlinks")]
    SymlinksUnsupported { backend: String },

    /// Local I/O failure, with annotated path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A batch transfer fails every file of a group with the same error, so
/// errors are cloned per file. `io::Error` is not `Clone`; its kind and
/// message are kept.
impl Clone for BackendError {
    fn clone(&self) -> Self {
        match self {
            BackendError::Connection { target, detail } => BackendError::Connection {
                target: target.clone(),
                detail: detail.clone(),
            },
            BackendError::Permission { target, detail } => BackendError::Permission {
                target: target.clone(),
                detail: detail.clone(),
            },
            BackendError::PathNotFound { path } => BackendError::PathNotFound { path: path.clone() },
            BackendError::Operation { detail } => BackendError::Operation {
                detail: detail.clone(),
            },
            BackendError::ToolMissing { tool } => BackendError::ToolMissing { tool: tool.clone() },
            BackendError::SymlinksUnsupported { backend } => BackendError::SymlinksUnsupported {
                backend: backend.clone(),
            },
            BackendError::Io { path, source } => BackendError::Io {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
        }
    }
}

impl BackendError {
    /// True for failures that say nothing about the path itself: the host
    /// could not be reached or did not answer in time.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BackendError::Connection { .. })
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::PathNotFound { .. } => true,
            BackendError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convenience constructor for [`BackendError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BackendError {
    BackendError::Io {
        path: path.into(),
        source,
    }
}

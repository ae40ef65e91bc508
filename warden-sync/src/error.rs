//! Error types for warden-sync.

use std::path::PathBuf;

use thiserror::Error;

use warden_backend::BackendError;
use warden_core::{ArtifactKind, ConfigError, StateError};
use warden_render::RenderError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("project '{0}' already exists")]
    ProjectAlreadyExists(String),

    #[error("unknown target '{target}' (available: {})", available.join(", "))]
    InvalidTarget {
        target: String,
        available: Vec<String>,
    },

    #[error("project '{project}' does not have target '{target}' installed")]
    TargetNotInstalled { project: String, target: String },

    #[error("project '{project}' already has target '{target}' installed; use `warden add` to install more items")]
    TargetAlreadyInstalled { project: String, target: String },

    #[error("target '{0}' does not support custom commands")]
    CommandsUnsupported(String),

    /// The location does not name a reachable directory.
    #[error("invalid project location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("{kind} '{name}' not found")]
    ArtifactNotFound { kind: ArtifactKind, name: String },

    #[error("specify at least one rule or command")]
    NothingSpecified,

    #[error("invalid project name: {0}")]
    InvalidName(String),

    #[error("no projects registered; use `warden install <path>` first")]
    NoProjects,

    #[error("'{name}' is not installed in project '{project}'")]
    ItemNotInstalled { project: String, name: String },

    #[error("target '{0}' does not support global configuration")]
    GlobalConfigUnsupported(String),

    #[error("global config already exists: {}; use --force to overwrite", path.display())]
    GlobalConfigExists { path: PathBuf },

    #[error("cannot encode global config: {0}")]
    Toml(#[from] toml::ser::Error),

    /// A backend failure while handling one artifact.
    #[error("'{name}' on target '{target}': {source}")]
    Artifact {
        name: String,
        target: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Whether the failure came from an unreachable or unresponsive host.
    pub fn is_connectivity(&self) -> bool {
        match self {
            SyncError::Backend(e) | SyncError::Artifact { source: e, .. } => e.is_connectivity(),
            _ => false,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Attach artifact context to a backend failure.
pub(crate) fn artifact_err(name: &str, target: &str, source: BackendError) -> SyncError {
    SyncError::Artifact {
        name: name.to_string(),
        target: target.to_string(),
        source,
    }
}

//! Error types for warden-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, locking or saving the state ledger.
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ledger exists but is not valid JSON, or a record cannot be migrated.
    #[error("failed to parse state ledger at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error on save.
    #[error("state serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another invocation holds the ledger lock and it could not be acquired.
    #[error("could not lock state ledger at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from resolving the warden home or reading `.warden_config.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file exists but is not valid JSON for [`crate::WardenConfig`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error on save.
    #[error("config serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// `dirs::home_dir()` returned `None` and no `WARDEN_HOME` was set.
    #[error("cannot determine home directory; set $WARDEN_HOME or $HOME")]
    HomeNotFound,
}

pub(crate) fn state_io(path: impl Into<PathBuf>, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

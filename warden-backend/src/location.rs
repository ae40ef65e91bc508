//! Location grammar and backend selection.
//!
//! A location is either a local path or `[user@]host:path`. Parsing never
//! fails: anything that does not look like an ssh target is a local path, and
//! a bad local path is caught later when the project directory is validated.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::backend::FilesystemBackend;
use crate::local::LocalBackend;
use crate::remote::RemoteBackend;
use crate::runner::{CommandRunner, SystemRunner};

static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([^@/]+)@)?([^:/]+):(.+)$").expect("valid remote location regex")
});

static WINDOWS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:").expect("valid drive letter regex"));

/// A parsed location string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local {
        path: String,
    },
    Remote {
        host: String,
        user: Option<String>,
        path: String,
    },
}

impl Location {
    pub fn parse(input: &str) -> Self {
        if is_windows_path(input) {
            return Location::Local {
                path: input.to_string(),
            };
        }
        match REMOTE_RE.captures(input) {
            Some(caps) => Location::Remote {
                user: caps.get(1).map(|m| m.as_str().to_string()),
                host: caps[2].to_string(),
                path: caps[3].to_string(),
            },
            None => Location::Local {
                path: input.to_string(),
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote { .. })
    }

    pub fn path(&self) -> &str {
        match self {
            Location::Local { path } | Location::Remote { path, .. } => path,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local { path } => f.write_str(path),
            Location::Remote {
                host,
                user: Some(user),
                path,
            } => write!(f, "{user}@{host}:{path}"),
            Location::Remote {
                host,
                user: None,
                path,
            } => write!(f, "{host}:{path}"),
        }
    }
}

/// `C:\...` / `c:/...` style paths, which would otherwise parse as host `C`.
pub fn is_windows_path(input: &str) -> bool {
    WINDOWS_RE.is_match(input)
}

/// A location bound to its backend.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub location: Location,
    /// Canonical location string: absolute path for local, the original
    /// `[user@]host:path` for remote.
    pub canonical: String,
    /// Backend rooted at the location; relative paths passed to it resolve
    /// inside the project directory.
    pub backend: Arc<dyn FilesystemBackend>,
}

impl Resolved {
    /// Whether the project root exists and is a directory. Connectivity
    /// failures are returned rather than read as "absent".
    pub fn validate_root(&self) -> Result<bool, crate::BackendError> {
        self.backend.try_is_dir(".")
    }
}

/// Turns location strings into backends.
///
/// Holds the command runner remote backends are built with, and the base
/// directory relative local paths resolve against (the process's current
/// directory when unset).
#[derive(Debug, Clone)]
pub struct Resolver {
    runner: Arc<dyn CommandRunner>,
    base: Option<PathBuf>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner, base: None }
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn resolve(&self, input: &str) -> Resolved {
        let location = Location::parse(input);
        match &location {
            Location::Local { path } => {
                let absolute = self.absolute(path);
                let canonical = absolute.display().to_string();
                Resolved {
                    backend: Arc::new(LocalBackend::with_base(absolute)),
                    canonical,
                    location,
                }
            }
            Location::Remote { host, user, path } => {
                let backend = RemoteBackend::with_runner(
                    host.clone(),
                    user.clone(),
                    Some(path.clone()),
                    Arc::clone(&self.runner),
                );
                Resolved {
                    backend: Arc::new(backend),
                    canonical: location.to_string(),
                    location,
                }
            }
        }
    }

    /// Absolute form of a local path; symlinks are resolved when the path
    /// exists.
    fn absolute(&self, path: &str) -> PathBuf {
        let unrooted = match &self.base {
            Some(base) => LocalBackend::with_base(base),
            None => LocalBackend::new(),
        };
        let joined = unrooted.resolve(path);
        std::fs::canonicalize(&joined).unwrap_or_else(|_| normalize(&joined))
    }
}

/// Lexically drop `.` components and fold `..`.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve with real ssh processes and the current directory as base.
pub fn resolve(input: &str) -> Resolved {
    Resolver::new().resolve(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn display_round_trips_remote_form() {
        let loc = Location::parse("deploy@web1:~/app");
        assert_eq!(loc.to_string(), "deploy@web1:~/app");
        assert_eq!(Location::parse("web1:/srv").to_string(), "web1:/srv");
    }

    #[test]
    fn local_resolution_is_absolute_and_rooted() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("proj")).unwrap();
        let resolved = Resolver::new().with_base(tmp.path()).resolve("proj/./");
        let expected = std::fs::canonicalize(tmp.path().join("proj")).unwrap();
        assert_eq!(resolved.canonical, expected.display().to_string());
        assert_eq!(resolved.backend.kind(), "local");
        assert!(resolved.validate_root().unwrap());
    }

    #[test]
    fn missing_local_path_degrades_to_invalid_root() {
        let tmp = TempDir::new().unwrap();
        let resolved = Resolver::new().with_base(tmp.path()).resolve("nope");
        assert!(!resolved.location.is_remote());
        assert!(!resolved.validate_root().unwrap());
    }
}

//! Writing prepared artifacts through a backend.
//!
//! Copy mode stages every prepared file in a temporary directory that
//! mirrors the destination layout, then hands the whole set to
//! [`FilesystemBackend::copy_files_batch`], which issues one transfer per
//! destination directory and reports one outcome per file. Files whose
//! transfer failed for a reason other than connectivity are retried on
//! their own; files that landed are never rewritten.

use std::path::PathBuf;

use tempfile::TempDir;

use warden_backend::{BackendError, CopyPair, FilesystemBackend};
use warden_core::{ArtifactKind, InstallMode};

use crate::error::{io_err, SyncError};
use crate::prepare::Prepared;

/// One artifact ready to be written.
#[derive(Debug, Clone)]
pub struct Planned {
    pub name: String,
    pub kind: ArtifactKind,
    pub source: PathBuf,
    /// Relative to the project root.
    pub dest: String,
    pub prepared: Prepared,
}

/// Write every planned artifact. The result has one entry per input, in
/// input order.
pub fn write_all(
    backend: &dyn FilesystemBackend,
    mode: InstallMode,
    planned: &[Planned],
) -> Result<Vec<Result<(), BackendError>>, SyncError> {
    if planned.is_empty() {
        return Ok(Vec::new());
    }
    if !mode.is_copy() && backend.supports_symlinks() {
        return Ok(planned
            .iter()
            .map(|item| backend.create_symlink(&item.source, &item.dest))
            .collect());
    }

    let staging = TempDir::new().map_err(|e| io_err(std::env::temp_dir(), e))?;
    let mut pairs: Vec<CopyPair> = Vec::with_capacity(planned.len());
    for item in planned {
        let staged = staging.path().join(item.dest.trim_start_matches('/'));
        if let Some(parent) = staged.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(&staged, &item.prepared.content).map_err(|e| io_err(&staged, e))?;
        pairs.push((staged, item.dest.clone()));
    }

    let outcome = backend.copy_files_batch(&pairs, true);
    let copied = outcome.iter().filter(|r| r.is_ok()).count();
    tracing::info!(
        location = %backend.location_string(),
        files = pairs.len(),
        copied,
        "copied artifacts"
    );
    Ok(outcome
        .into_iter()
        .zip(&pairs)
        .map(|(result, (staged, dest))| match result {
            Err(e) if !e.is_connectivity() => {
                tracing::warn!(dest = %dest, error = %e, "batch copy failed, retrying file on its own");
                backend.copy_file(staged, dest)
            }
            other => other,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir as FsDir;
    use predicates::prelude::*;
    use warden_backend::LocalBackend;

    fn planned(dest: &str, body: &str, source: PathBuf) -> Planned {
        Planned {
            name: dest.to_string(),
            kind: ArtifactKind::Rule,
            source,
            dest: dest.to_string(),
            prepared: Prepared {
                content: body.as_bytes().to_vec(),
                checksum: warden_backend::checksum::digest(body),
            },
        }
    }

    #[test]
    fn copy_mode_writes_prepared_bytes() {
        let project = FsDir::new().unwrap();
        let backend = LocalBackend::with_base(project.path());
        let items = vec![
            planned(".claude/rules/a.md", "alpha", project.path().join("unused")),
            planned(".claude/commands/b.md", "beta", project.path().join("unused")),
        ];

        let results = write_all(&backend, InstallMode::Copy, &items).unwrap();
        assert!(results.iter().all(Result::is_ok));
        project.child(".claude/rules/a.md").assert("alpha");
        project.child(".claude/commands/b.md").assert("beta");
    }

    #[test]
    fn symlink_mode_links_sources() {
        let home = FsDir::new().unwrap();
        let source = home.child("style.md");
        source.write_str("raw").unwrap();
        let project = FsDir::new().unwrap();
        let backend = LocalBackend::with_base(project.path());
        let items = vec![planned(".cursor/rules/style.mdc", "raw", source.path().to_path_buf())];

        let results = write_all(&backend, InstallMode::Symlink, &items).unwrap();
        assert!(results[0].is_ok());
        let link = project.child(".cursor/rules/style.mdc");
        link.assert(predicate::path::is_symlink());
        link.assert("raw");
    }

    /// Local backend whose batch transfer loses every file under one
    /// directory to a dropped connection.
    #[derive(Debug)]
    struct DropsDir {
        inner: LocalBackend,
        dropped: &'static str,
    }

    impl FilesystemBackend for DropsDir {
        fn try_exists(&self, path: &str) -> Result<bool, BackendError> {
            self.inner.try_exists(path)
        }
        fn try_is_dir(&self, path: &str) -> Result<bool, BackendError> {
            self.inner.try_is_dir(path)
        }
        fn mkdir(&self, path: &str, parents: bool, exist_ok: bool) -> Result<(), BackendError> {
            self.inner.mkdir(path, parents, exist_ok)
        }
        fn copy_file(&self, source: &std::path::Path, dest: &str) -> Result<(), BackendError> {
            self.inner.copy_file(source, dest)
        }
        fn copy_files_batch(&self, pairs: &[CopyPair], create_dirs: bool) -> warden_backend::BatchOutcome {
            pairs
                .iter()
                .map(|pair| {
                    if pair.1.starts_with(self.dropped) {
                        Err(BackendError::Connection {
                            target: "web1".to_string(),
                            detail: "operation timed out after 60s".to_string(),
                        })
                    } else {
                        self.inner
                            .copy_files_batch(std::slice::from_ref(pair), create_dirs)
                            .remove(0)
                    }
                })
                .collect()
        }
        fn remove_file(&self, path: &str) -> Result<(), BackendError> {
            self.inner.remove_file(path)
        }
        fn checksum(&self, path: &str) -> Result<String, BackendError> {
            self.inner.checksum(path)
        }
        fn read_to_string(&self, path: &str) -> Result<String, BackendError> {
            self.inner.read_to_string(path)
        }
        fn supports_symlinks(&self) -> bool {
            false
        }
        fn location_string(&self) -> String {
            self.inner.location_string()
        }
        fn kind(&self) -> &'static str {
            "remote"
        }
    }

    #[test]
    fn failed_directory_does_not_fail_its_siblings() {
        let project = FsDir::new().unwrap();
        let backend = DropsDir {
            inner: LocalBackend::with_base(project.path()),
            dropped: ".claude/rules",
        };
        let items = vec![
            planned(".claude/rules/a.md", "alpha", project.path().join("unused")),
            planned(".claude/commands/b.md", "beta", project.path().join("unused")),
        ];

        let results = write_all(&backend, InstallMode::Copy, &items).unwrap();
        assert!(matches!(&results[0], Err(e) if e.is_connectivity()));
        assert!(results[1].is_ok());
        project.child(".claude/rules/a.md").assert(predicate::path::missing());
        project.child(".claude/commands/b.md").assert("beta");
    }

    #[test]
    fn empty_plan_writes_nothing() {
        let project = FsDir::new().unwrap();
        let backend = LocalBackend::with_base(project.path());
        assert!(write_all(&backend, InstallMode::Copy, &[]).unwrap().is_empty());
        project.child(".claude").assert(predicate::path::missing());
    }
}

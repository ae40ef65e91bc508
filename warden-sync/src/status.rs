//! Read-only status passes.
//!
//! One project is reconciled sequentially on one thread so a single remote
//! host never sees interleaved checks. Many projects are spread over a
//! bounded worker pool; an unreachable host only holds up its own worker.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use serde::Serialize;

use warden_backend::{FilesystemBackend, Resolver};
use warden_core::{ArtifactKind, InstallMode, InstalledItem, Project, TargetSpec, WardenConfig};
use warden_render::ConverterRegistry;

use crate::error::{artifact_err, SyncError};
use crate::library::destination;
use crate::prepare::prepare;
use crate::reconcile::{classify, ItemError, ItemStatus, ProjectStatus};

/// Upper bound on concurrent project checks.
pub const MAX_WORKERS: usize = 10;

/// Everything a status pass reads.
#[derive(Debug, Clone, Copy)]
pub struct StatusContext<'a> {
    pub config: &'a WardenConfig,
    pub registry: &'a ConverterRegistry,
    pub resolver: &'a Resolver,
}

/// Outcome of checking one project in a batch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCheck {
    Status(ProjectStatus),
    Error(String),
}

/// Reconcile every item of every target of `project`.
///
/// Per-item failures are collected in [`ProjectStatus::errors`]. A
/// connectivity failure ends the pass and is returned, since every further
/// check of the same host would fail the same way.
pub fn check_project(ctx: &StatusContext<'_>, project: &Project) -> Result<ProjectStatus, SyncError> {
    let resolved = ctx.resolver.resolve(&project.path);
    let backend = resolved.backend.as_ref();
    let mut status = ProjectStatus {
        project: project.name.0.clone(),
        ..ProjectStatus::default()
    };

    for (target_name, installation) in &project.targets {
        let Some(spec) = ctx.config.target(target_name) else {
            for kind in ArtifactKind::ALL {
                for item in installation.items(kind).values() {
                    status.errors.push(ItemError {
                        name: item.name.clone(),
                        target: target_name.clone(),
                        message: format!("target '{target_name}' is not configured"),
                    });
                }
            }
            continue;
        };

        for kind in ArtifactKind::ALL {
            for item in installation.items(kind).values() {
                let checker = ItemChecker {
                    ctx,
                    backend,
                    target_name,
                    spec,
                    mode: installation.install_type,
                };
                match checker.check(kind, item) {
                    Ok(item_status) => status.items.push(item_status),
                    Err(e) if e.is_connectivity() => return Err(e),
                    Err(e) => status.errors.push(ItemError {
                        name: item.name.clone(),
                        target: target_name.clone(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    tracing::debug!(
        project = %project.name,
        items = status.items.len(),
        errors = status.errors.len(),
        "checked project"
    );
    Ok(status)
}

struct ItemChecker<'a> {
    ctx: &'a StatusContext<'a>,
    backend: &'a dyn FilesystemBackend,
    target_name: &'a str,
    spec: &'a TargetSpec,
    mode: InstallMode,
}

impl ItemChecker<'_> {
    fn check(&self, kind: ArtifactKind, item: &InstalledItem) -> Result<ItemStatus, SyncError> {
        let dest = destination(self.spec, kind, &item.name);

        let source_now = match &item.source {
            Some(source) if source.is_file() => Some(
                prepare(kind, source, self.target_name, self.spec, self.mode, self.ctx.registry)?
                    .checksum,
            ),
            _ => None,
        };

        let installed_now = match source_now {
            // Not needed for the classification.
            None => None,
            Some(_) => {
                let present = self
                    .backend
                    .try_exists(&dest)
                    .map_err(|e| artifact_err(&item.name, self.target_name, e))?;
                if present {
                    Some(
                        self.backend
                            .checksum(&dest)
                            .map_err(|e| artifact_err(&item.name, self.target_name, e))?,
                    )
                } else {
                    None
                }
            }
        };

        Ok(ItemStatus {
            name: item.name.clone(),
            kind,
            target: self.target_name.to_string(),
            classification: classify(
                item.checksum.as_deref(),
                source_now.as_deref(),
                installed_now.as_deref(),
            ),
            source: item.source.clone(),
            dest,
            stored_checksum: item.checksum.clone(),
            source_checksum: source_now,
            installed_checksum: installed_now,
        })
    }
}

/// Check many projects on at most [`MAX_WORKERS`] threads. Only projects with
/// findings or errors are returned.
pub fn check_projects(ctx: &StatusContext<'_>, projects: &[&Project]) -> BTreeMap<String, ProjectCheck> {
    let workers = projects.len().min(MAX_WORKERS);
    if workers == 0 {
        return BTreeMap::new();
    }

    let (job_tx, job_rx) = mpsc::channel::<&Project>();
    for project in projects {
        // The receiver is alive until the end of this function.
        let _ = job_tx.send(project);
    }
    drop(job_tx);
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = mpsc::channel::<(String, ProjectCheck)>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let result_tx = result_tx.clone();
            let job_rx = &job_rx;
            scope.spawn(move || loop {
                let job = match job_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                let Ok(project) = job else { break };
                let check = match check_project(ctx, project) {
                    Ok(status) => ProjectCheck::Status(status),
                    Err(e) => ProjectCheck::Error(e.to_string()),
                };
                if result_tx.send((project.name.0.clone(), check)).is_err() {
                    break;
                }
            });
        }
    });
    drop(result_tx);

    result_rx
        .into_iter()
        .filter(|(_, check)| match check {
            ProjectCheck::Status(status) => status.has_findings(),
            ProjectCheck::Error(_) => true,
        })
        .collect()
}

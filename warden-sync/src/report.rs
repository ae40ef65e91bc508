//! Structured results of engine operations. The CLI renders these; nothing
//! in the engine prints.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use warden_core::{ArtifactKind, InstallMode};

use crate::reconcile::{ItemError, ItemStatus};

/// One artifact on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub name: String,
    pub kind: ArtifactKind,
    pub target: String,
}

impl ItemRef {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
        }
    }
}

impl From<&ItemStatus> for ItemRef {
    fn from(status: &ItemStatus) -> Self {
        Self::new(status.name.clone(), status.kind, status.target.clone())
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.name, self.target)
    }
}

/// An item left alone, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    #[serde(flatten)]
    pub item: ItemRef,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub project: String,
    pub target: String,
    pub location: String,
    pub install_type: InstallMode,
    /// Whether the install created the project record.
    pub new_project: bool,
    pub rules: Vec<String>,
    pub commands: Vec<String>,
    pub errors: Vec<ItemError>,
    pub notices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddReport {
    pub project: String,
    pub added: Vec<ItemRef>,
    pub skipped: Vec<SkippedItem>,
    pub errors: Vec<ItemError>,
    pub notices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub project: String,
    pub updated: Vec<ItemRef>,
    pub skipped: Vec<SkippedItem>,
    /// Conflicts held back under [`crate::ConflictPolicy::AskCaller`].
    pub awaiting_confirmation: Vec<ItemStatus>,
    pub errors: Vec<ItemError>,
}

impl UpdateReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.skipped.is_empty()
            && self.awaiting_confirmation.is_empty()
            && self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveReport {
    pub project: String,
    pub removed: Vec<ItemRef>,
    /// Requested names that were not installed; removing them was a no-op.
    pub not_installed: Vec<ItemRef>,
    pub errors: Vec<ItemError>,
}

/// Result of dropping one target from a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveTargetReport {
    pub project: String,
    pub target: String,
    pub removed: Vec<ItemRef>,
    pub errors: Vec<ItemError>,
    /// The target record was dropped. Stays false while any file could not
    /// be deleted, so a rerun can finish the job.
    pub target_removed: bool,
}

/// Result of converting symlink installs to copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverReport {
    pub project: String,
    /// Targets now recorded as copy installs.
    pub severed: Vec<String>,
    pub converted: Vec<ItemRef>,
    /// Targets that were already copy installs.
    pub already_copies: Vec<String>,
    pub errors: Vec<ItemError>,
}

/// Result of writing a target's user-level config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalReport {
    pub target: String,
    pub config_path: PathBuf,
    /// Every file written, the config file included.
    pub written: Vec<PathBuf>,
    pub rules: Vec<String>,
}

/// A failure scoped to one project of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectError {
    pub project: String,
    pub message: String,
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.project, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallAllReport {
    pub installed: Vec<AddReport>,
    pub errors: Vec<ProjectError>,
}

/// Items of one project, grouped for batch reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectItems {
    pub project: String,
    pub items: Vec<ItemRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateAllReport {
    pub dry_run: bool,
    pub updated: Vec<UpdateReport>,
    /// Dry run only: what a real run would rewrite.
    pub would_update: Vec<ProjectItems>,
    pub skipped_conflicts: Vec<ProjectItems>,
    pub skipped_uptodate: Vec<String>,
    pub skipped_remote: Vec<String>,
    pub errors: Vec<ProjectError>,
}

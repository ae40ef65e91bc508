//! # warden-sync
//!
//! Reconciliation and synchronization of rules and commands across tracked
//! projects.
//!
//! Open a [`Warden`] over a home directory and call its operations:
//! [`Warden::install`], [`Warden::add_to_project`], [`Warden::update_items`],
//! [`Warden::remove_items`], [`Warden::status`], [`Warden::sever`],
//! [`Warden::install_global_config`] and the batch variants. Each
//! returns a structured report; nothing here prints.

pub mod batch;
pub mod conflict;
pub mod diff;
pub mod engine;
pub mod error;
pub mod global;
pub mod library;
pub mod prepare;
pub mod reconcile;
pub mod report;
pub mod status;

pub use conflict::{resolve_conflict, ConflictPolicy, Resolution};
pub use engine::{GlobalInstallRequest, InstallRequest, Selection, UpdateRequest, Warden};
pub use error::SyncError;
pub use library::{destination, Artifact, Library};
pub use prepare::{prepare, Prepared};
pub use reconcile::{classify, Classification, ItemError, ItemStatus, ProjectStatus};
pub use report::{
    AddReport, GlobalReport, InstallAllReport, InstallReport, ItemRef, ProjectError, ProjectItems,
    RemoveReport, RemoveTargetReport, SeverReport, SkippedItem, UpdateAllReport, UpdateReport,
};
pub use status::{check_project, check_projects, ProjectCheck, StatusContext, MAX_WORKERS};

//! Warden core library: domain types, state ledger persistence, configuration.
//!
//! - [`types`]: projects, target installations and installed items
//! - [`ledger`]: load / migrate / lock / save the JSON state ledger
//! - [`config`]: warden home layout and the target table
//! - [`error`]: [`StateError`] and [`ConfigError`]

pub mod config;
pub mod error;
pub mod ledger;
pub mod types;

pub use config::{TargetSpec, WardenConfig, WardenPaths};
pub use error::{ConfigError, StateError};
pub use ledger::{migrate_record, Ledger, LedgerLock};
pub use types::{
    ArtifactKind, InstallMode, InstalledItem, Project, ProjectName, SourceKind,
    TargetInstallation,
};

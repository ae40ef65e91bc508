//! The state ledger: every tracked project, persisted as one JSON document.
//!
//! ```text
//! { "projects": { "<name>": { "name", "path", "timestamp",
//!                             "default_targets", "targets": { ... } } } }
//! ```
//!
//! Reads go through [`migrate_record`], the only place that knows about the
//! legacy single-target record shape. Writes always emit the multi-target
//! shape, atomically (`.tmp` + rename).
//!
//! Mutating commands hold a [`LedgerLock`] from load until save so two
//! invocations cannot interleave their read-modify-write cycles.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::config::WardenPaths;
use crate::error::{state_io, StateError};
use crate::types::{
    ArtifactKind, InstallMode, InstalledItem, Project, ProjectName, SourceKind,
    TargetInstallation,
};

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// Exclusive advisory lock on `.warden_state.json.lock`. Released on drop.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Acquire the lock, waiting for any other warden process holding it.
    pub fn acquire(paths: &WardenPaths) -> Result<Self, StateError> {
        let path = paths.lock_file();
        std::fs::create_dir_all(paths.home()).map_err(|e| state_io(paths.home(), e))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| state_io(&path, e))?;
        let lock_err = |source: std::io::Error| StateError::Lock {
            path: path.clone(),
            source,
        };
        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                tracing::info!(path = %path.display(), "waiting for another warden process to release the ledger");
                file.lock_exclusive().map_err(lock_err)?;
            }
            Err(e) => return Err(lock_err(e)),
        }
        tracing::debug!(path = %path.display(), "acquired ledger lock");
        Ok(Self { file, path })
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release ledger lock");
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// All tracked projects, keyed by their stored name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ledger {
    pub projects: BTreeMap<String, Project>,
}

impl Ledger {
    /// Load the ledger, returning an empty one when the file does not exist.
    pub fn load_at(paths: &WardenPaths) -> Result<Self, StateError> {
        let path = paths.state_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| state_io(&path, e))?;
        Self::from_json(&contents).map_err(|source| StateError::Parse { path, source })
    }

    /// Parse a ledger document, migrating every record.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let raw: LedgerFile = serde_json::from_str(contents)?;
        let projects = raw
            .projects
            .into_iter()
            .map(|(key, record)| {
                let project = migrate_record(&key, record);
                (key, project)
            })
            .collect();
        Ok(Self { projects })
    }

    /// Save atomically: write `<file>.tmp`, then rename over the ledger.
    pub fn save_at(&self, paths: &WardenPaths) -> Result<(), StateError> {
        let path = paths.state_file();
        std::fs::create_dir_all(paths.home()).map_err(|e| state_io(paths.home(), e))?;
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| state_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(state_io(&path, e));
        }
        tracing::debug!(path = %path.display(), projects = self.projects.len(), "saved ledger");
        Ok(())
    }

    /// Resolve a user-supplied name to the stored key: exact match first, then
    /// case-insensitive.
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        if self.projects.contains_key(name) {
            return Some(name.to_string());
        }
        let wanted = name.to_lowercase();
        self.projects
            .keys()
            .find(|stored| stored.to_lowercase() == wanted)
            .cloned()
    }

    pub fn find(&self, name: &str) -> Option<&Project> {
        let key = self.resolve_name(name)?;
        self.projects.get(&key)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Project> {
        let key = self.resolve_name(name)?;
        self.projects.get_mut(&key)
    }

    pub fn find_by_location(&self, location: &str) -> Option<&Project> {
        self.projects.values().find(|p| p.path == location)
    }

    pub fn contains_exact(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.name.0.clone(), project);
    }

    /// Remove by user-supplied name (case-insensitive).
    pub fn remove(&mut self, name: &str) -> Option<Project> {
        let key = self.resolve_name(name)?;
        self.projects.remove(&key)
    }

    /// `base`, or `base_1`, `base_2`, ... whichever is free first.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.projects.contains_key(base) {
            return base.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{base}_{counter}");
            if !self.projects.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Projects sorted by name.
    pub fn list(&self) -> Vec<&Project> {
        self.projects.values().collect()
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    projects: BTreeMap<String, RecordCompat>,
}

/// Union of every project record shape ever written.
///
/// Multi-target records carry `targets`; legacy records carry a single
/// `target` with its items inline; records with neither are bare.
#[derive(Debug, Deserialize)]
pub struct RecordCompat {
    #[serde(default)]
    name: Option<String>,
    path: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    default_targets: Vec<String>,
    #[serde(default)]
    targets: Option<BTreeMap<String, TargetCompat>>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    install_type: Option<InstallMode>,
    #[serde(default)]
    installed_rules: Vec<ItemCompat>,
    #[serde(default)]
    installed_commands: Vec<ItemCompat>,
}

#[derive(Debug, Deserialize)]
struct TargetCompat {
    #[serde(default)]
    install_type: Option<InstallMode>,
    #[serde(default)]
    installed_rules: Vec<ItemCompat>,
    #[serde(default)]
    installed_commands: Vec<ItemCompat>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemCompat {
    /// Oldest ledgers stored bare artifact names.
    Name(String),
    Record(ItemRecord),
}

#[derive(Debug, Deserialize)]
struct ItemRecord {
    name: String,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    source_type: Option<String>,
    #[serde(default)]
    installed_at: Option<String>,
}

/// Lift any record shape into a [`Project`].
///
/// The ledger key is authoritative for the name. Legacy single-target records
/// become a one-entry `targets` map (`install_type` defaults to `copy`);
/// bare-string items become items with no checksum or source, stamped with the
/// record timestamp. `has_rules`/`has_commands` are not read: they are derived
/// from the item maps.
pub fn migrate_record(key: &str, record: RecordCompat) -> Project {
    let timestamp = record
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    let mut targets = BTreeMap::new();
    match record.targets {
        Some(compat_targets) => {
            for (target_name, compat) in compat_targets {
                let installation = build_target(
                    compat.install_type.unwrap_or_default(),
                    compat.installed_rules,
                    compat.installed_commands,
                    timestamp,
                );
                targets.insert(target_name, installation);
            }
        }
        None => {
            if let Some(target_name) = record.target {
                tracing::debug!(project = key, target = %target_name, "migrating legacy single-target record");
                let installation = build_target(
                    record.install_type.unwrap_or(InstallMode::Copy),
                    record.installed_rules,
                    record.installed_commands,
                    timestamp,
                );
                targets.insert(target_name, installation);
            }
        }
    }

    let name = if key.is_empty() {
        record.name.unwrap_or_default()
    } else {
        key.to_string()
    };

    let mut default_targets = record.default_targets;
    default_targets.retain(|t| targets.contains_key(t));

    Project {
        name: ProjectName::from(name),
        path: record.path,
        timestamp,
        default_targets,
        targets,
    }
}

fn build_target(
    install_type: InstallMode,
    rules: Vec<ItemCompat>,
    commands: Vec<ItemCompat>,
    timestamp: DateTime<Utc>,
) -> TargetInstallation {
    let mut installation = TargetInstallation::new(install_type);
    for (kind, items) in [(ArtifactKind::Rule, rules), (ArtifactKind::Command, commands)] {
        for item in items {
            installation.insert(kind, normalize_item(item, timestamp));
        }
    }
    installation
}

fn normalize_item(item: ItemCompat, timestamp: DateTime<Utc>) -> InstalledItem {
    match item {
        ItemCompat::Name(name) => InstalledItem {
            name,
            checksum: None,
            source: None,
            source_type: None,
            installed_at: timestamp,
        },
        ItemCompat::Record(record) => InstalledItem {
            name: record.name,
            checksum: record.checksum,
            source: record.source,
            source_type: record
                .source_type
                .as_deref()
                .and_then(|s| s.parse::<SourceKind>().ok()),
            installed_at: record
                .installed_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(timestamp),
        },
    }
}

/// Accept RFC 3339 and offset-less ISO-8601 (taken as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

//! The synchronization engine.
//!
//! [`Warden`] owns the loaded config and ledger for one invocation. Every
//! operation takes plain identifiers and returns a structured report;
//! mutating operations save the ledger before returning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use warden_backend::{FilesystemBackend, Location, Resolved, Resolver};
use warden_core::{
    ArtifactKind, InstallMode, InstalledItem, Ledger, LedgerLock, Project, ProjectName,
    SourceKind, TargetInstallation, TargetSpec, WardenConfig, WardenPaths,
};
use warden_render::ConverterRegistry;

use crate::batch::{self, Planned};
use crate::conflict::{resolve_conflict, ConflictPolicy, Resolution};
use crate::diff;
use crate::error::{artifact_err, io_err, SyncError};
use crate::global::{self, RuleSection, CLAUDE_RULES_FILE};
use crate::library::{destination, Artifact, Library};
use crate::prepare::prepare;
use crate::reconcile::{Classification, ItemError, ItemStatus, ProjectStatus};
use crate::report::{
    AddReport, GlobalReport, InstallAllReport, InstallReport, ItemRef, ProjectError, ProjectItems,
    RemoveReport, RemoveTargetReport, SeverReport, SkippedItem, UpdateAllReport, UpdateReport,
};
use crate::status::{check_project, check_projects, ProjectCheck, StatusContext};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Which artifacts of one kind an install asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Nothing,
    /// Everything the library offers.
    All,
    Only(Vec<String>),
}

impl Selection {
    pub fn is_requested(&self) -> bool {
        !matches!(self, Selection::Nothing)
    }

    fn specs(&self, library: &Library, kind: ArtifactKind) -> Result<Vec<String>, SyncError> {
        match self {
            Selection::Nothing => Ok(Vec::new()),
            Selection::All => library.available(kind),
            Selection::Only(specs) => Ok(specs.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub location: String,
    /// Defaults to the configured default target.
    pub target: Option<String>,
    /// Symlink mode is requested unless this is set.
    pub copy: bool,
    pub rules: Selection,
    pub commands: Selection,
    pub name: Option<String>,
}

impl InstallRequest {
    /// All available rules, no commands, symlink mode.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            target: None,
            copy: false,
            rules: Selection::All,
            commands: Selection::Nothing,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub target: Option<String>,
    pub rules: Vec<String>,
    pub commands: Vec<String>,
    /// Ignore the name lists and update every outdated item.
    pub all_outdated: bool,
    pub policy: ConflictPolicy,
}

impl UpdateRequest {
    pub fn all_outdated(policy: ConflictPolicy) -> Self {
        Self {
            all_outdated: true,
            policy,
            ..Self::default()
        }
    }

    pub fn named(rules: Vec<String>, commands: Vec<String>, policy: ConflictPolicy) -> Self {
        Self {
            rules,
            commands,
            policy,
            ..Self::default()
        }
    }
}

/// A user-level config install for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalInstallRequest {
    pub target: String,
    pub rules: Selection,
    /// Replace an existing config file.
    pub force: bool,
    /// The user's home directory, under which target configs live.
    pub user_home: PathBuf,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Warden {
    paths: WardenPaths,
    config: WardenConfig,
    ledger: Ledger,
    registry: ConverterRegistry,
    resolver: Resolver,
    library: Library,
    _lock: Option<LedgerLock>,
}

impl Warden {
    /// Load config and ledger without locking. For read-only commands.
    pub fn open(paths: WardenPaths, registry: ConverterRegistry) -> Result<Self, SyncError> {
        let config = WardenConfig::load_at(&paths)?;
        let ledger = Ledger::load_at(&paths)?;
        Ok(Self {
            library: Library::new(paths.clone()),
            paths,
            config,
            ledger,
            registry,
            resolver: Resolver::new(),
            _lock: None,
        })
    }

    /// Lock the ledger, then load. The lock is held until the engine drops.
    pub fn open_locked(paths: WardenPaths, registry: ConverterRegistry) -> Result<Self, SyncError> {
        paths.ensure_layout()?;
        let lock = LedgerLock::acquire(&paths)?;
        let mut warden = Self::open(paths, registry)?;
        warden._lock = Some(lock);
        Ok(warden)
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn paths(&self) -> &WardenPaths {
        &self.paths
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn available(&self, kind: ArtifactKind) -> Result<Vec<String>, SyncError> {
        self.library.available(kind)
    }

    fn save(&self) -> Result<(), SyncError> {
        self.ledger.save_at(&self.paths)?;
        Ok(())
    }

    fn status_context(&self) -> StatusContext<'_> {
        StatusContext {
            config: &self.config,
            registry: &self.registry,
            resolver: &self.resolver,
        }
    }

    fn target_spec(&self, target: &str) -> Result<&TargetSpec, SyncError> {
        self.config.target(target).ok_or_else(|| SyncError::InvalidTarget {
            target: target.to_string(),
            available: self.config.available_targets(),
        })
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// All projects, sorted by name.
    pub fn list_projects(&self) -> Vec<&Project> {
        self.ledger.list()
    }

    /// Exact name first, then case-insensitive.
    pub fn project(&self, name: &str) -> Result<&Project, SyncError> {
        self.ledger
            .find(name)
            .ok_or_else(|| SyncError::ProjectNotFound(name.to_string()))
    }

    /// Forget a project. Installed files are left alone.
    pub fn untrack(&mut self, name: &str) -> Result<bool, SyncError> {
        let removed = self.ledger.remove(name);
        if let Some(project) = &removed {
            self.save()?;
            tracing::info!(project = %project.name, "untracked project");
        }
        Ok(removed.is_some())
    }

    /// Rename a project; returns the stored new name.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<String, SyncError> {
        let key = self
            .ledger
            .resolve_name(old)
            .ok_or_else(|| SyncError::ProjectNotFound(old.to_string()))?;
        let new_name = new.trim();
        if new_name.is_empty() {
            return Err(SyncError::InvalidName("project name cannot be empty".into()));
        }
        if self.ledger.contains_exact(new_name) {
            return Err(SyncError::ProjectAlreadyExists(new_name.to_string()));
        }
        let mut project = self
            .ledger
            .remove(&key)
            .ok_or_else(|| SyncError::ProjectNotFound(old.to_string()))?;
        project.name = ProjectName::from(new_name);
        project.touch();
        self.ledger.insert(project);
        self.save()?;
        tracing::info!(from = %key, to = new_name, "renamed project");
        Ok(new_name.to_string())
    }

    /// Set the targets `add` uses when none is named.
    pub fn configure_targets(&mut self, name: &str, targets: &[String]) -> Result<(), SyncError> {
        let project = self
            .ledger
            .find_mut(name)
            .ok_or_else(|| SyncError::ProjectNotFound(name.to_string()))?;
        if let Some(missing) = targets.iter().find(|t| !project.has_target(t)) {
            return Err(SyncError::TargetNotInstalled {
                project: project.name.0.clone(),
                target: missing.clone(),
            });
        }
        let mut defaults: Vec<String> = Vec::with_capacity(targets.len());
        for target in targets {
            if !defaults.contains(target) {
                defaults.push(target.clone());
            }
        }
        project.default_targets = defaults;
        project.touch();
        tracing::info!(project = %project.name, targets = ?project.default_targets, "configured default targets");
        self.save()
    }

    // -----------------------------------------------------------------------
    // Install / add
    // -----------------------------------------------------------------------

    /// Install a target into a location, creating the project record on first
    /// sight of the location.
    pub fn install(&mut self, request: InstallRequest) -> Result<InstallReport, SyncError> {
        let target_name = request
            .target
            .clone()
            .unwrap_or_else(|| self.config.default_target.clone());
        let spec = self.target_spec(&target_name)?.clone();

        let resolved = self.resolver.resolve(&request.location);
        validate_location(&resolved)?;
        let backend = resolved.backend.as_ref();

        let mut notices = Vec::new();
        let mut mode = if request.copy {
            InstallMode::Copy
        } else {
            InstallMode::Symlink
        };
        if !mode.is_copy() && !backend.supports_symlinks() {
            mode = InstallMode::Copy;
            let notice = format!(
                "{} does not support symlinks; installing copies instead",
                resolved.canonical
            );
            tracing::warn!("{notice}");
            notices.push(notice);
        } else if !mode.is_copy() && spec.requires_copy {
            mode = InstallMode::Copy;
            let notice = format!("target '{target_name}' requires copies; installing copies instead");
            tracing::warn!("{notice}");
            notices.push(notice);
        }

        if request.commands.is_requested() && !spec.supports_commands {
            return Err(SyncError::CommandsUnsupported(target_name));
        }

        let rule_specs = request.rules.specs(&self.library, ArtifactKind::Rule)?;
        let command_specs = request.commands.specs(&self.library, ArtifactKind::Command)?;
        let mut artifacts = self.library.resolve_all(ArtifactKind::Rule, &rule_specs)?;
        artifacts.extend(self.library.resolve_all(ArtifactKind::Command, &command_specs)?);

        let (mut project, new_project) = match self.ledger.find_by_location(&resolved.canonical) {
            Some(existing) if existing.has_target(&target_name) => {
                return Err(SyncError::TargetAlreadyInstalled {
                    project: existing.name.0.clone(),
                    target: target_name,
                });
            }
            Some(existing) => (existing.clone(), false),
            None => {
                let name = self.new_project_name(request.name.as_deref(), &resolved)?;
                (Project::new(name, resolved.canonical.clone()), true)
            }
        };

        let (installed, errors) = self.write_artifacts(backend, &target_name, &spec, mode, &artifacts)?;
        let mut installation = TargetInstallation::new(mode);
        let mut report = InstallReport {
            project: project.name.0.clone(),
            target: target_name.clone(),
            location: resolved.canonical.clone(),
            install_type: mode,
            new_project,
            rules: Vec::new(),
            commands: Vec::new(),
            errors,
            notices,
        };
        for (kind, item) in installed {
            match kind {
                ArtifactKind::Rule => report.rules.push(item.name.clone()),
                ArtifactKind::Command => report.commands.push(item.name.clone()),
            }
            installation.insert(kind, item);
        }
        project.add_target(target_name.clone(), installation);
        project.touch();

        tracing::info!(
            project = %project.name,
            target = %target_name,
            mode = %mode,
            rules = report.rules.len(),
            commands = report.commands.len(),
            "installed target"
        );
        self.ledger.insert(project);
        self.save()?;
        Ok(report)
    }

    fn new_project_name(&self, custom: Option<&str>, resolved: &Resolved) -> Result<String, SyncError> {
        let base = match custom {
            Some(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(SyncError::InvalidName("project name cannot be empty".into()));
                }
                trimmed.to_string()
            }
            None => default_project_name(resolved),
        };
        Ok(self.ledger.unique_name(&base))
    }

    /// Add artifacts to installed targets of a project. Already-installed
    /// items are skipped.
    pub fn add_to_project(
        &mut self,
        name: &str,
        rules: &[String],
        commands: &[String],
        target: Option<&str>,
    ) -> Result<AddReport, SyncError> {
        if rules.is_empty() && commands.is_empty() {
            return Err(SyncError::NothingSpecified);
        }
        let mut project = self.project(name)?.clone();
        let targets = select_targets(&project, target)?;
        let rule_artifacts = self.library.resolve_all(ArtifactKind::Rule, rules)?;
        let command_artifacts = self.library.resolve_all(ArtifactKind::Command, commands)?;

        let resolved = self.resolver.resolve(&project.path);
        validate_location(&resolved)?;
        let backend = resolved.backend.as_ref();

        let mut report = AddReport {
            project: project.name.0.clone(),
            ..AddReport::default()
        };

        for target_name in targets {
            let Some(spec) = self.config.target(&target_name).cloned() else {
                report.errors.extend(rule_artifacts.iter().chain(&command_artifacts).map(|a| ItemError {
                    name: a.spec.clone(),
                    target: target_name.clone(),
                    message: format!("target '{target_name}' is not configured"),
                }));
                continue;
            };
            let Some(installation) = project.target(&target_name) else {
                continue;
            };
            let mode = installation.install_type;

            let mut pending: Vec<Artifact> = Vec::new();
            for artifact in &rule_artifacts {
                if installation.contains(ArtifactKind::Rule, &artifact.spec) {
                    report.skipped.push(skipped(artifact, &target_name, "already installed"));
                } else {
                    pending.push(artifact.clone());
                }
            }
            if !command_artifacts.is_empty() && !spec.supports_commands {
                let notice = format!(
                    "target '{target_name}' does not support commands; skipped {}",
                    command_artifacts.len()
                );
                tracing::warn!("{notice}");
                report.notices.push(notice);
                report.skipped.extend(
                    command_artifacts
                        .iter()
                        .map(|a| skipped(a, &target_name, "target does not support commands")),
                );
            } else {
                for artifact in &command_artifacts {
                    if installation.contains(ArtifactKind::Command, &artifact.spec) {
                        report.skipped.push(skipped(artifact, &target_name, "already installed"));
                    } else {
                        pending.push(artifact.clone());
                    }
                }
            }

            let (installed, errors) = self.write_artifacts(backend, &target_name, &spec, mode, &pending)?;
            report.errors.extend(errors);
            let Some(installation) = project.target_mut(&target_name) else {
                continue;
            };
            for (kind, item) in installed {
                report.added.push(ItemRef::new(item.name.clone(), kind, target_name.clone()));
                installation.insert(kind, item);
            }
        }

        if !report.added.is_empty() {
            project.touch();
            tracing::info!(project = %project.name, added = report.added.len(), "added artifacts");
            self.ledger.insert(project);
            self.save()?;
        }
        Ok(report)
    }

    /// Add artifacts to every tracked project.
    pub fn install_to_all_projects(
        &mut self,
        rules: &[String],
        commands: &[String],
        target: Option<&str>,
    ) -> Result<InstallAllReport, SyncError> {
        if rules.is_empty() && commands.is_empty() {
            return Err(SyncError::NothingSpecified);
        }
        if self.ledger.projects.is_empty() {
            return Err(SyncError::NoProjects);
        }
        // Unknown artifacts fail the call before any project is touched.
        self.library.resolve_all(ArtifactKind::Rule, rules)?;
        self.library.resolve_all(ArtifactKind::Command, commands)?;

        let names: Vec<String> = self.ledger.projects.keys().cloned().collect();
        let mut report = InstallAllReport::default();
        for name in names {
            match self.add_to_project(&name, rules, commands, target) {
                Ok(added) => report.installed.push(added),
                Err(e) => report.errors.push(ProjectError {
                    project: name,
                    message: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Prepare and write `artifacts` for one target. Returns the items that
    /// reached the destination and the failures of the rest.
    fn write_artifacts(
        &self,
        backend: &dyn FilesystemBackend,
        target_name: &str,
        spec: &TargetSpec,
        mode: InstallMode,
        artifacts: &[Artifact],
    ) -> Result<(Vec<(ArtifactKind, InstalledItem)>, Vec<ItemError>), SyncError> {
        let mut errors = Vec::new();
        let mut planned = Vec::with_capacity(artifacts.len());
        let mut source_kinds: Vec<SourceKind> = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            match prepare(artifact.kind, &artifact.source, target_name, spec, mode, &self.registry) {
                Ok(prepared) => {
                    planned.push(Planned {
                        name: artifact.spec.clone(),
                        kind: artifact.kind,
                        source: artifact.source.clone(),
                        dest: destination(spec, artifact.kind, &artifact.spec),
                        prepared,
                    });
                    source_kinds.push(artifact.source_kind.clone());
                }
                Err(e) => errors.push(item_error(&artifact.spec, target_name, &e)),
            }
        }

        let results = batch::write_all(backend, mode, &planned)?;
        let mut installed = Vec::with_capacity(planned.len());
        for ((plan, source_kind), result) in planned.into_iter().zip(source_kinds).zip(results) {
            match result {
                Ok(()) => installed.push((
                    plan.kind,
                    InstalledItem::new(plan.name, plan.prepared.checksum, plan.source, source_kind),
                )),
                Err(e) => errors.push(item_error(&plan.name, target_name, &e)),
            }
        }
        Ok((installed, errors))
    }

    // -----------------------------------------------------------------------
    // Update / remove
    // -----------------------------------------------------------------------

    /// Rewrite outdated items (named ones, or all of them), applying the
    /// request's conflict policy to conflicts.
    pub fn update_items(&mut self, name: &str, request: &UpdateRequest) -> Result<UpdateReport, SyncError> {
        let mut project = self.project(name)?.clone();
        if let Some(target) = &request.target {
            if !project.has_target(target) {
                return Err(SyncError::TargetNotInstalled {
                    project: project.name.0.clone(),
                    target: target.clone(),
                });
            }
        }
        let status = check_project(&self.status_context(), &project)?;
        let target = request.target.as_deref();
        let in_scope = |t: &str| target.map(|wanted| wanted == t).unwrap_or(true);

        let mut report = UpdateReport {
            project: project.name.0.clone(),
            ..UpdateReport::default()
        };
        report
            .errors
            .extend(status.errors.iter().filter(|e| in_scope(&e.target)).cloned());

        let mut to_write: Vec<ItemStatus> = Vec::new();
        if request.all_outdated {
            for item in status.items.iter().filter(|i| in_scope(&i.target)) {
                plan_update(item, false, request.policy, &mut to_write, &mut report);
            }
        } else {
            for (kind, names) in [
                (ArtifactKind::Rule, &request.rules),
                (ArtifactKind::Command, &request.commands),
            ] {
                for name in names {
                    let matches = status.find(kind, name, target);
                    if matches.is_empty() && !status.errors.iter().any(|e| &e.name == name) {
                        report.errors.push(ItemError {
                            name: name.clone(),
                            target: target.unwrap_or("*").to_string(),
                            message: format!("{kind} is not installed"),
                        });
                    }
                    for item in matches {
                        plan_update(item, true, request.policy, &mut to_write, &mut report);
                    }
                }
            }
        }

        if !to_write.is_empty() {
            let resolved = self.resolver.resolve(&project.path);
            let backend = resolved.backend.as_ref();
            let mut by_target: BTreeMap<String, Vec<ItemStatus>> = BTreeMap::new();
            for item in to_write {
                by_target.entry(item.target.clone()).or_default().push(item);
            }
            for (target_name, items) in by_target {
                self.rewrite(backend, &mut project, &target_name, &items, &mut report)?;
            }
        }

        if !report.updated.is_empty() {
            project.touch();
            tracing::info!(project = %project.name, updated = report.updated.len(), "updated artifacts");
            self.ledger.insert(project);
            self.save()?;
        }
        Ok(report)
    }

    fn rewrite(
        &self,
        backend: &dyn FilesystemBackend,
        project: &mut Project,
        target_name: &str,
        items: &[ItemStatus],
        report: &mut UpdateReport,
    ) -> Result<(), SyncError> {
        let Some(spec) = self.config.target(target_name) else {
            return Ok(());
        };
        let Some(mode) = project.target(target_name).map(|t| t.install_type) else {
            return Ok(());
        };

        let mut planned = Vec::with_capacity(items.len());
        for item in items {
            let Some(source) = item.source.clone() else {
                report.errors.push(ItemError {
                    name: item.name.clone(),
                    target: target_name.to_string(),
                    message: "no source recorded".into(),
                });
                continue;
            };
            match prepare(item.kind, &source, target_name, spec, mode, &self.registry) {
                Ok(prepared) => planned.push(Planned {
                    name: item.name.clone(),
                    kind: item.kind,
                    source,
                    dest: item.dest.clone(),
                    prepared,
                }),
                Err(e) => report.errors.push(item_error(&item.name, target_name, &e)),
            }
        }

        let results = batch::write_all(backend, mode, &planned)?;
        let Some(installation) = project.target_mut(target_name) else {
            return Ok(());
        };
        for (plan, result) in planned.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    if let Some(recorded) = installation.item_mut(plan.kind, &plan.name) {
                        recorded.refresh(plan.prepared.checksum);
                    }
                    tracing::info!(dest = %plan.dest, "wrote: {}", plan.name);
                    report
                        .updated
                        .push(ItemRef::new(plan.name, plan.kind, target_name));
                }
                Err(e) => report.errors.push(item_error(&plan.name, target_name, &e)),
            }
        }
        Ok(())
    }

    /// Delete artifacts from a project's targets. Names that are not
    /// installed are reported, not treated as errors.
    pub fn remove_items(
        &mut self,
        name: &str,
        rules: &[String],
        commands: &[String],
        target: Option<&str>,
    ) -> Result<RemoveReport, SyncError> {
        if rules.is_empty() && commands.is_empty() {
            return Err(SyncError::NothingSpecified);
        }
        let mut project = self.project(name)?.clone();
        let targets = match target {
            Some(t) if !project.has_target(t) => {
                return Err(SyncError::TargetNotInstalled {
                    project: project.name.0.clone(),
                    target: t.to_string(),
                });
            }
            Some(t) => vec![t.to_string()],
            None => project.target_names(),
        };
        let resolved = self.resolver.resolve(&project.path);
        let backend = resolved.backend.as_ref();

        let mut report = RemoveReport {
            project: project.name.0.clone(),
            ..RemoveReport::default()
        };
        for target_name in targets {
            let spec = self.config.target(&target_name);
            for (kind, names) in [(ArtifactKind::Rule, rules), (ArtifactKind::Command, commands)] {
                for item in names {
                    let installed = project
                        .target(&target_name)
                        .map(|t| t.contains(kind, item))
                        .unwrap_or(false);
                    if !installed {
                        report
                            .not_installed
                            .push(ItemRef::new(item.clone(), kind, target_name.clone()));
                        continue;
                    }
                    let Some(spec) = spec else {
                        report.errors.push(ItemError {
                            name: item.clone(),
                            target: target_name.clone(),
                            message: format!("target '{target_name}' is not configured"),
                        });
                        continue;
                    };
                    let dest = destination(spec, kind, item);
                    match backend.remove_file(&dest) {
                        Ok(()) => {
                            if let Some(installation) = project.target_mut(&target_name) {
                                installation.remove(kind, item);
                            }
                            tracing::info!("removed: {dest}");
                            report
                                .removed
                                .push(ItemRef::new(item.clone(), kind, target_name.clone()));
                        }
                        Err(e) => report.errors.push(item_error(item, &target_name, &e)),
                    }
                }
            }
        }

        if !report.removed.is_empty() {
            project.touch();
            self.ledger.insert(project);
            self.save()?;
        }
        Ok(report)
    }

    /// Delete every installed item of `target` and drop the target from
    /// the project. Other targets are untouched.
    pub fn remove_target(&mut self, name: &str, target: &str) -> Result<RemoveTargetReport, SyncError> {
        let mut project = self.project(name)?.clone();
        let Some(installation) = project.target(target).cloned() else {
            return Err(SyncError::TargetNotInstalled {
                project: project.name.0.clone(),
                target: target.to_string(),
            });
        };
        let spec = self.target_spec(target)?;
        let resolved = self.resolver.resolve(&project.path);
        let backend = resolved.backend.as_ref();

        let mut report = RemoveTargetReport {
            project: project.name.0.clone(),
            target: target.to_string(),
            ..RemoveTargetReport::default()
        };
        for kind in ArtifactKind::ALL {
            for item in installation.items(kind).keys() {
                let dest = destination(spec, kind, item);
                match backend.remove_file(&dest) {
                    Ok(()) => {
                        if let Some(installation) = project.target_mut(target) {
                            installation.remove(kind, item);
                        }
                        tracing::info!("removed: {dest}");
                        report.removed.push(ItemRef::new(item.clone(), kind, target));
                    }
                    Err(e) => report.errors.push(item_error(item, target, &e)),
                }
            }
        }

        if report.errors.is_empty() {
            project.remove_target(target);
            report.target_removed = true;
            tracing::info!(project = %project.name, target, "removed target");
        }
        if report.target_removed || !report.removed.is_empty() {
            project.touch();
            self.ledger.insert(project);
            self.save()?;
        }
        Ok(report)
    }

    /// Replace symlink installs with copies so the project stops following
    /// library edits. A target flips to copy mode once every item on it has
    /// been converted; copy targets are left alone.
    pub fn sever(&mut self, name: &str, target: Option<&str>) -> Result<SeverReport, SyncError> {
        let mut project = self.project(name)?.clone();
        let targets = match target {
            Some(t) => select_targets(&project, Some(t))?,
            None => project.target_names(),
        };
        let resolved = self.resolver.resolve(&project.path);
        let backend = resolved.backend.as_ref();

        let mut report = SeverReport {
            project: project.name.0.clone(),
            ..SeverReport::default()
        };
        for target_name in targets {
            let Some(installation) = project.target(&target_name) else {
                continue;
            };
            if installation.install_type.is_copy() {
                report.already_copies.push(target_name);
                continue;
            }
            let spec = self.target_spec(&target_name)?;

            let errors_before = report.errors.len();
            let mut planned = Vec::with_capacity(installation.item_count());
            for kind in ArtifactKind::ALL {
                for item in installation.items(kind).values() {
                    let Some(source) = item.source.clone().filter(|s| s.is_file()) else {
                        report.errors.push(ItemError {
                            name: item.name.clone(),
                            target: target_name.clone(),
                            message: "source file not found".into(),
                        });
                        continue;
                    };
                    match prepare(kind, &source, &target_name, spec, InstallMode::Copy, &self.registry) {
                        Ok(prepared) => planned.push(Planned {
                            name: item.name.clone(),
                            kind,
                            source,
                            dest: destination(spec, kind, &item.name),
                            prepared,
                        }),
                        Err(e) => report.errors.push(item_error(&item.name, &target_name, &e)),
                    }
                }
            }

            let results = batch::write_all(backend, InstallMode::Copy, &planned)?;
            let Some(installation) = project.target_mut(&target_name) else {
                continue;
            };
            for (plan, result) in planned.into_iter().zip(results) {
                match result {
                    Ok(()) => {
                        if let Some(recorded) = installation.item_mut(plan.kind, &plan.name) {
                            recorded.refresh(plan.prepared.checksum);
                        }
                        report
                            .converted
                            .push(ItemRef::new(plan.name, plan.kind, target_name.clone()));
                    }
                    Err(e) => report.errors.push(item_error(&plan.name, &target_name, &e)),
                }
            }
            if report.errors.len() == errors_before {
                installation.install_type = InstallMode::Copy;
                tracing::info!(project = %project.name, target = %target_name, "severed target");
                report.severed.push(target_name);
            }
        }

        if !report.converted.is_empty() {
            project.touch();
            self.ledger.insert(project);
            self.save()?;
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Global config
    // -----------------------------------------------------------------------

    /// Write a target's user-level config from library rules. Global
    /// configs live outside any project and are not tracked in the ledger.
    pub fn install_global_config(&self, request: &GlobalInstallRequest) -> Result<GlobalReport, SyncError> {
        let spec = self.target_spec(&request.target)?;
        let config_path = spec
            .global_config_path(&request.target, &request.user_home)
            .ok_or_else(|| SyncError::GlobalConfigUnsupported(request.target.clone()))?;
        if config_path.exists() && !request.force {
            return Err(SyncError::GlobalConfigExists { path: config_path });
        }

        let specs = request.rules.specs(&self.library, ArtifactKind::Rule)?;
        let artifacts = self.library.resolve_all(ArtifactKind::Rule, &specs)?;
        let mut sections = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let prepared = prepare(
                ArtifactKind::Rule,
                &artifact.source,
                &request.target,
                spec,
                InstallMode::Copy,
                &self.registry,
            )?;
            sections.push(RuleSection {
                name: artifact.spec.clone(),
                content: prepared.text(),
            });
        }

        let mut written = Vec::new();
        match request.target.as_str() {
            "claude" => {
                let Some(dir) = config_path.parent() else {
                    return Err(SyncError::GlobalConfigUnsupported(request.target.clone()));
                };
                let rules_file = dir.join(CLAUDE_RULES_FILE);
                write_file(&rules_file, &global::claude_rules(&self.paths, &sections, Utc::now()))?;
                written.push(rules_file.clone());

                let existing = match std::fs::read_to_string(&config_path) {
                    Ok(text) => Some(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => return Err(io_err(&config_path, e)),
                };
                write_file(
                    &config_path,
                    &global::upsert_managed_section(existing.as_deref(), &rules_file),
                )?;
            }
            "codex" => write_file(&config_path, &global::codex_config(&self.paths, &self.config)?)?,
            _ => write_file(&config_path, &global::windsurf_rules(&self.paths, &sections))?,
        }
        written.push(config_path.clone());
        tracing::info!(target = %request.target, path = %config_path.display(), "installed global config");

        Ok(GlobalReport {
            target: request.target.clone(),
            config_path,
            written,
            rules: specs,
        })
    }

    // -----------------------------------------------------------------------
    // Status / diff
    // -----------------------------------------------------------------------

    pub fn status(&self, name: &str) -> Result<ProjectStatus, SyncError> {
        check_project(&self.status_context(), self.project(name)?)
    }

    /// Check every tracked project on a bounded pool. Only projects with
    /// findings or errors are returned. Remote projects are included per
    /// `include_remote`, defaulting to the `update_remote_projects` setting.
    pub fn check_all_projects_status(&self, include_remote: Option<bool>) -> BTreeMap<String, ProjectCheck> {
        let include = include_remote.unwrap_or(self.config.update_remote_projects);
        let projects: Vec<&Project> = self
            .ledger
            .list()
            .into_iter()
            .filter(|p| include || !is_remote(p))
            .collect();
        check_projects(&self.status_context(), &projects)
    }

    /// Unified diff between an installed item and what installing it now
    /// would write. Rules are searched before commands on each target.
    pub fn show_diff(&self, name: &str, item: &str, target: Option<&str>) -> Result<String, SyncError> {
        let project = self.project(name)?;
        let targets = match target {
            Some(t) if !project.has_target(t) => {
                return Err(SyncError::TargetNotInstalled {
                    project: project.name.0.clone(),
                    target: t.to_string(),
                });
            }
            Some(t) => vec![t.to_string()],
            None => project.target_names(),
        };
        let found = targets.iter().find_map(|t| {
            let installation = project.target(t)?;
            ArtifactKind::ALL.into_iter().find_map(|kind| {
                installation
                    .item(kind, item)
                    .map(|installed| (t.clone(), kind, installed.source.clone(), installation.install_type))
            })
        });
        let Some((target_name, kind, source, mode)) = found else {
            return Err(SyncError::ItemNotInstalled {
                project: project.name.0.clone(),
                name: item.to_string(),
            });
        };
        let spec = self.target_spec(&target_name)?;
        let source: PathBuf = source.filter(|s| s.is_file()).ok_or_else(|| SyncError::ArtifactNotFound {
            kind,
            name: item.to_string(),
        })?;

        let current = prepare(kind, &source, &target_name, spec, mode, &self.registry)?.text();
        let resolved = self.resolver.resolve(&project.path);
        let installed = resolved
            .backend
            .read_to_string(&destination(spec, kind, item))
            .map_err(|e| artifact_err(item, &target_name, e))?;
        Ok(diff::unified(item, &installed, &current))
    }

    // -----------------------------------------------------------------------
    // Batch update
    // -----------------------------------------------------------------------

    /// Update every project whose only findings are outdated items. Projects
    /// with any conflict are left for a per-project update.
    pub fn update_all_projects(
        &mut self,
        dry_run: bool,
        include_remote: Option<bool>,
    ) -> Result<UpdateAllReport, SyncError> {
        let include = include_remote.unwrap_or(self.config.update_remote_projects);
        let checks = self.check_all_projects_status(Some(include));
        let projects: Vec<(String, bool)> = self
            .ledger
            .list()
            .into_iter()
            .map(|p| (p.name.0.clone(), is_remote(p)))
            .collect();

        let mut report = UpdateAllReport {
            dry_run,
            ..UpdateAllReport::default()
        };
        for (name, remote) in projects {
            if remote && !include {
                report.skipped_remote.push(name);
                continue;
            }
            let status = match checks.get(&name) {
                None => {
                    report.skipped_uptodate.push(name);
                    continue;
                }
                Some(ProjectCheck::Error(message)) => {
                    report.errors.push(ProjectError {
                        project: name,
                        message: message.clone(),
                    });
                    continue;
                }
                Some(ProjectCheck::Status(status)) => status,
            };

            report.errors.extend(status.errors.iter().map(|e| ProjectError {
                project: name.clone(),
                message: e.to_string(),
            }));
            let conflicts: Vec<ItemRef> = status.conflicts().map(ItemRef::from).collect();
            if !conflicts.is_empty() {
                report.skipped_conflicts.push(ProjectItems {
                    project: name,
                    items: conflicts,
                });
                continue;
            }
            let outdated: Vec<ItemRef> = status.outdated().map(ItemRef::from).collect();
            if outdated.is_empty() {
                report.skipped_uptodate.push(name);
                continue;
            }
            if dry_run {
                report.would_update.push(ProjectItems {
                    project: name,
                    items: outdated,
                });
                continue;
            }
            match self.update_items(&name, &UpdateRequest::all_outdated(ConflictPolicy::Skip)) {
                Ok(updated) => report.updated.push(updated),
                Err(e) => report.errors.push(ProjectError {
                    project: name,
                    message: e.to_string(),
                }),
            }
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject locations that are not an existing directory. Connectivity
/// failures are reported the same way, with the backend's message.
fn validate_location(resolved: &Resolved) -> Result<(), SyncError> {
    let invalid = |reason: String| SyncError::InvalidLocation {
        location: resolved.canonical.clone(),
        reason,
    };
    match resolved.backend.try_exists(".") {
        Ok(true) => {}
        Ok(false) => return Err(invalid("path does not exist".into())),
        Err(e) => return Err(invalid(e.to_string())),
    }
    match resolved.validate_root() {
        Ok(true) => Ok(()),
        Ok(false) => Err(invalid("not a directory".into())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// Final path component of the location; the host for remote home
/// directories.
fn default_project_name(resolved: &Resolved) -> String {
    let path = match &resolved.location {
        Location::Local { .. } => resolved.canonical.as_str(),
        Location::Remote { path, .. } => path.as_str(),
    };
    let last = path
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    match (&resolved.location, last) {
        (Location::Remote { host, .. }, "" | "~" | ".") => host.clone(),
        (Location::Local { .. }, "" | ".") => "project".to_string(),
        (_, name) => name.to_string(),
    }
}

/// Explicit target, else the installed default targets, else every target.
fn select_targets(project: &Project, target: Option<&str>) -> Result<Vec<String>, SyncError> {
    if let Some(target) = target {
        if !project.has_target(target) {
            return Err(SyncError::TargetNotInstalled {
                project: project.name.0.clone(),
                target: target.to_string(),
            });
        }
        return Ok(vec![target.to_string()]);
    }
    if project.default_targets.is_empty() {
        return Ok(project.target_names());
    }
    let installed: Vec<String> = project
        .default_targets
        .iter()
        .filter(|t| project.has_target(t))
        .cloned()
        .collect();
    if installed.is_empty() {
        return Err(SyncError::TargetNotInstalled {
            project: project.name.0.clone(),
            target: project.default_targets.join(", "),
        });
    }
    Ok(installed)
}

fn write_file(path: &Path, content: &str) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| io_err(path, e))
}

fn is_remote(project: &Project) -> bool {
    Location::parse(&project.path).is_remote()
}

fn skipped(artifact: &Artifact, target: &str, reason: &str) -> SkippedItem {
    SkippedItem {
        item: ItemRef::new(artifact.spec.clone(), artifact.kind, target),
        reason: reason.to_string(),
    }
}

fn item_error(name: &str, target: &str, error: &dyn std::fmt::Display) -> ItemError {
    ItemError {
        name: name.to_string(),
        target: target.to_string(),
        message: error.to_string(),
    }
}

/// Sort one classified item into the update plan. `named` items were asked
/// for explicitly, so missing destinations are restored and other states
/// are reported rather than passed over.
fn plan_update(
    item: &ItemStatus,
    named: bool,
    policy: ConflictPolicy,
    to_write: &mut Vec<ItemStatus>,
    report: &mut UpdateReport,
) {
    match item.classification {
        Classification::Outdated => to_write.push(item.clone()),
        Classification::MissingInstalled if named => to_write.push(item.clone()),
        Classification::Conflict => match resolve_conflict(policy) {
            Resolution::Proceed => to_write.push(item.clone()),
            Resolution::Skip if policy == ConflictPolicy::AskCaller => {
                report.awaiting_confirmation.push(item.clone());
            }
            Resolution::Skip => report.skipped.push(SkippedItem {
                item: ItemRef::from(item),
                reason: "conflict: source and installed copy both changed".into(),
            }),
        },
        Classification::UserModified if named => report.skipped.push(SkippedItem {
            item: ItemRef::from(item),
            reason: "user-modified: local edits kept".into(),
        }),
        Classification::MissingSource if named => report.errors.push(ItemError {
            name: item.name.clone(),
            target: item.target.clone(),
            message: "source artifact no longer exists".into(),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("deploy@web1:/srv/app/", "app")]
    #[case("web1:~", "web1")]
    #[case("web1:projects/site", "site")]
    #[case("/tmp/warden-demo", "warden-demo")]
    fn project_names_come_from_the_last_component(#[case] location: &str, #[case] expected: &str) {
        let resolved = Resolver::new().resolve(location);
        assert_eq!(default_project_name(&resolved), expected);
    }

    #[test]
    fn targets_fall_back_from_defaults_to_all() {
        let mut project = Project::new("api", "/srv/api");
        project.add_target("claude", TargetInstallation::new(InstallMode::Copy));
        project.add_target("cursor", TargetInstallation::new(InstallMode::Symlink));
        assert_eq!(select_targets(&project, None).unwrap(), vec!["claude", "cursor"]);

        project.default_targets = vec!["cursor".into(), "codex".into()];
        assert_eq!(select_targets(&project, None).unwrap(), vec!["cursor"]);

        project.default_targets = vec!["codex".into()];
        assert!(matches!(
            select_targets(&project, None),
            Err(SyncError::TargetNotInstalled { .. })
        ));
        assert_eq!(select_targets(&project, Some("claude")).unwrap(), vec!["claude"]);
    }
}

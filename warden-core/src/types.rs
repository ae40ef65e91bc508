//! Domain types for the warden state ledger.
//!
//! A [`Project`] owns one [`TargetInstallation`] per integration target, and
//! each target owns two name-keyed maps of [`InstalledItem`]s (rules and
//! commands). Items are kept in `BTreeMap`s so the serialized ledger is stable
//! across runs; on disk they are written as JSON arrays.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A tracked project's unique name. Lookup is case-insensitive; storage keeps
/// the original casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectName(pub String);

impl ProjectName {
    /// Case-insensitive comparison used for every user-supplied lookup.
    pub fn matches(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How artifacts reach a target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Destination is a symlink to the source file.
    Symlink,
    /// Destination holds an independent, post-processed copy.
    #[default]
    Copy,
}

impl InstallMode {
    pub fn is_copy(self) -> bool {
        matches!(self, InstallMode::Copy)
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallMode::Symlink => write!(f, "symlink"),
            InstallMode::Copy => write!(f, "copy"),
        }
    }
}

/// The two artifact families a target can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Rule,
    Command,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Rule, ArtifactKind::Command];
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Rule => write!(f, "rule"),
            ArtifactKind::Command => write!(f, "command"),
        }
    }
}

/// Where an installed artifact originally came from.
///
/// Serialized as `built-in`, `built-in-rule` or `package:<owner/repo>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    BuiltIn,
    BuiltInRule,
    Package(String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::BuiltIn => write!(f, "built-in"),
            SourceKind::BuiltInRule => write!(f, "built-in-rule"),
            SourceKind::Package(name) => write!(f, "package:{name}"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "built-in" => Ok(SourceKind::BuiltIn),
            "built-in-rule" => Ok(SourceKind::BuiltInRule),
            other => match other.strip_prefix("package:") {
                Some(name) if !name.is_empty() => Ok(SourceKind::Package(name.to_string())),
                _ => Err(format!("unknown source kind '{other}'")),
            },
        }
    }
}

impl Serialize for SourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One installed artifact inside a target.
///
/// `checksum` is the digest of the bytes actually written to the destination
/// (after template processing or rule conversion). Legacy ledgers may have no
/// checksum or source recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledItem {
    pub name: String,
    pub checksum: Option<String>,
    pub source: Option<PathBuf>,
    pub source_type: Option<SourceKind>,
    pub installed_at: DateTime<Utc>,
}

impl InstalledItem {
    pub fn new(
        name: impl Into<String>,
        checksum: impl Into<String>,
        source: impl Into<PathBuf>,
        source_type: SourceKind,
    ) -> Self {
        Self {
            name: name.into(),
            checksum: Some(checksum.into()),
            source: Some(source.into()),
            source_type: Some(source_type),
            installed_at: Utc::now(),
        }
    }

    /// Record a successful rewrite of this item.
    pub fn refresh(&mut self, checksum: impl Into<String>) {
        self.checksum = Some(checksum.into());
        self.installed_at = Utc::now();
    }
}

/// Installation of one integration target inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetInstallation {
    pub install_type: InstallMode,
    installed_rules: BTreeMap<String, InstalledItem>,
    installed_commands: BTreeMap<String, InstalledItem>,
}

impl TargetInstallation {
    pub fn new(install_type: InstallMode) -> Self {
        Self {
            install_type,
            ..Self::default()
        }
    }

    pub fn has_rules(&self) -> bool {
        !self.installed_rules.is_empty()
    }

    pub fn has_commands(&self) -> bool {
        !self.installed_commands.is_empty()
    }

    pub fn items(&self, kind: ArtifactKind) -> &BTreeMap<String, InstalledItem> {
        match kind {
            ArtifactKind::Rule => &self.installed_rules,
            ArtifactKind::Command => &self.installed_commands,
        }
    }

    fn items_map_mut(&mut self, kind: ArtifactKind) -> &mut BTreeMap<String, InstalledItem> {
        match kind {
            ArtifactKind::Rule => &mut self.installed_rules,
            ArtifactKind::Command => &mut self.installed_commands,
        }
    }

    pub fn item(&self, kind: ArtifactKind, name: &str) -> Option<&InstalledItem> {
        self.items(kind).get(name)
    }

    pub fn item_mut(&mut self, kind: ArtifactKind, name: &str) -> Option<&mut InstalledItem> {
        self.items_map_mut(kind).get_mut(name)
    }

    pub fn contains(&self, kind: ArtifactKind, name: &str) -> bool {
        self.items(kind).contains_key(name)
    }

    /// Insert or replace the item keyed by its name.
    pub fn insert(&mut self, kind: ArtifactKind, item: InstalledItem) {
        self.items_map_mut(kind).insert(item.name.clone(), item);
    }

    pub fn remove(&mut self, kind: ArtifactKind, name: &str) -> Option<InstalledItem> {
        self.items_map_mut(kind).remove(name)
    }

    pub fn item_count(&self) -> usize {
        self.installed_rules.len() + self.installed_commands.len()
    }
}

impl Serialize for TargetInstallation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TargetInstallation", 5)?;
        state.serialize_field("install_type", &self.install_type)?;
        state.serialize_field("has_rules", &self.has_rules())?;
        state.serialize_field("has_commands", &self.has_commands())?;
        let rules: Vec<&InstalledItem> = self.installed_rules.values().collect();
        let commands: Vec<&InstalledItem> = self.installed_commands.values().collect();
        state.serialize_field("installed_rules", &rules)?;
        state.serialize_field("installed_commands", &commands)?;
        state.end()
    }
}

/// A tracked project.
///
/// `path` is the canonical location string: the resolved absolute path for
/// local projects, the original `user@host:path` form for remote ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: ProjectName,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub default_targets: Vec<String>,
    pub targets: BTreeMap<String, TargetInstallation>,
}

impl Project {
    pub fn new(name: impl Into<ProjectName>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            timestamp: Utc::now(),
            default_targets: Vec::new(),
            targets: BTreeMap::new(),
        }
    }

    pub fn has_target(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    pub fn target(&self, target: &str) -> Option<&TargetInstallation> {
        self.targets.get(target)
    }

    pub fn target_mut(&mut self, target: &str) -> Option<&mut TargetInstallation> {
        self.targets.get_mut(target)
    }

    pub fn add_target(&mut self, target: impl Into<String>, installation: TargetInstallation) {
        self.targets.insert(target.into(), installation);
    }

    pub fn remove_target(&mut self, target: &str) -> Option<TargetInstallation> {
        self.default_targets.retain(|t| t != target);
        self.targets.remove(target)
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Bump the last-modified timestamp.
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("built-in", SourceKind::BuiltIn)]
    #[case("built-in-rule", SourceKind::BuiltInRule)]
    #[case("package:acme/rules", SourceKind::Package("acme/rules".to_string()))]
    fn source_kind_parses_ledger_strings(#[case] raw: &str, #[case] expected: SourceKind) {
        assert_eq!(raw.parse::<SourceKind>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[test]
    fn source_kind_rejects_empty_package() {
        assert!("package:".parse::<SourceKind>().is_err());
        assert!("vendored".parse::<SourceKind>().is_err());
    }

    #[test]
    fn project_name_matches_case_insensitively() {
        let name = ProjectName::from("MyApp");
        assert!(name.matches("myapp"));
        assert!(name.matches("MYAPP"));
        assert!(!name.matches("my-app"));
    }

    #[test]
    fn flags_follow_item_maps() {
        let mut target = TargetInstallation::new(InstallMode::Copy);
        assert!(!target.has_rules());
        assert!(!target.has_commands());

        target.insert(
            ArtifactKind::Rule,
            InstalledItem::new("style", "abc", "/src/style.md", SourceKind::BuiltInRule),
        );
        assert!(target.has_rules());
        assert!(!target.has_commands());

        target.remove(ArtifactKind::Rule, "style");
        assert!(!target.has_rules());
    }

    #[test]
    fn target_serializes_items_as_arrays_with_derived_flags() {
        let mut target = TargetInstallation::new(InstallMode::Symlink);
        target.insert(
            ArtifactKind::Command,
            InstalledItem::new("review", "ff00", "/src/review.md", SourceKind::BuiltIn),
        );
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["install_type"], "symlink");
        assert_eq!(json["has_rules"], false);
        assert_eq!(json["has_commands"], true);
        assert!(json["installed_rules"].as_array().unwrap().is_empty());
        let commands = json["installed_commands"].as_array().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["name"], "review");
        assert_eq!(commands[0]["source_type"], "built-in");
    }

    #[test]
    fn removing_target_drops_it_from_defaults() {
        let mut project = Project::new("app", "/code/app");
        project.add_target("claude", TargetInstallation::new(InstallMode::Copy));
        project.add_target("cursor", TargetInstallation::new(InstallMode::Symlink));
        project.default_targets = vec!["claude".into(), "cursor".into()];

        assert!(project.remove_target("cursor").is_some());
        assert_eq!(project.default_targets, vec!["claude".to_string()]);
        assert_eq!(project.target_names(), vec!["claude".to_string()]);
    }
}

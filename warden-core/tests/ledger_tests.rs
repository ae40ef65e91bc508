//! Ledger persistence and legacy-record migration.

use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::rstest;

use warden_core::{
    ArtifactKind, InstallMode, InstalledItem, Ledger, Project, SourceKind, TargetInstallation,
    WardenPaths,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sample_project() -> Project {
    let mut project = Project::new("webapp", "/code/webapp");
    let mut claude = TargetInstallation::new(InstallMode::Copy);
    claude.insert(
        ArtifactKind::Rule,
        InstalledItem::new("style", "aa11", "/w/rules/style.md", SourceKind::BuiltInRule),
    );
    claude.insert(
        ArtifactKind::Command,
        InstalledItem::new(
            "acme/tools:review",
            "bb22",
            "/w/packages/acme-tools/commands/review.md",
            SourceKind::Package("acme/tools".to_string()),
        ),
    );
    project.add_target("claude", claude);
    project.add_target("cursor", TargetInstallation::new(InstallMode::Symlink));
    project.default_targets = vec!["claude".to_string()];
    project
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

#[test]
fn missing_ledger_loads_empty() {
    let home = assert_fs::TempDir::new().unwrap();
    let ledger = Ledger::load_at(&WardenPaths::at(home.path())).unwrap();
    assert!(ledger.projects.is_empty());
}

#[test]
fn save_writes_multi_target_shape_and_reloads_identically() {
    let home = assert_fs::TempDir::new().unwrap();
    let paths = WardenPaths::at(home.path());
    let mut ledger = Ledger::default();
    ledger.insert(sample_project());
    ledger.save_at(&paths).unwrap();

    let state = home.child(".warden_state.json");
    state.assert(predicate::path::exists());
    state.assert(predicate::str::contains("\"targets\""));
    state.assert(predicate::str::contains("\"installed_commands\""));
    state.assert(predicate::str::contains("package:acme/tools"));
    home.child(".warden_state.json.tmp")
        .assert(predicate::path::missing());

    let reloaded = Ledger::load_at(&paths).unwrap();
    assert_eq!(reloaded, ledger);
}

#[test]
fn corrupt_ledger_is_a_parse_error() {
    let home = assert_fs::TempDir::new().unwrap();
    home.child(".warden_state.json").write_str("{ nope").unwrap();
    let err = Ledger::load_at(&WardenPaths::at(home.path())).unwrap_err();
    assert!(err.to_string().contains(".warden_state.json"));
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[rstest]
#[case::string_items(
    r#"{"name": "old", "path": "/code/old", "target": "cursor", "install_type": "symlink",
        "timestamp": "2024-05-01T12:00:00",
        "installed_rules": ["style", "testing"]}"#,
    "cursor",
    InstallMode::Symlink,
    2
)]
#[case::dict_items(
    r#"{"name": "old", "path": "/code/old", "target": "augment",
        "installed_rules": [{"name": "style", "checksum": "abc", "source": "/w/rules/style.md",
                             "source_type": "built-in-rule", "installed_at": "2024-05-01T12:00:00+00:00"}],
        "installed_commands": [{"name": "review", "checksum": "def"}]}"#,
    "augment",
    InstallMode::Copy,
    2
)]
fn legacy_flat_record_lifts_into_targets(
    #[case] record: &str,
    #[case] target: &str,
    #[case] mode: InstallMode,
    #[case] item_count: usize,
) {
    let json = format!(r#"{{"projects": {{"old": {record}}}}}"#);
    let ledger = Ledger::from_json(&json).unwrap();
    let project = &ledger.projects["old"];

    assert_eq!(project.target_names(), vec![target.to_string()]);
    let installation = project.target(target).unwrap();
    assert_eq!(installation.install_type, mode);
    assert_eq!(installation.item_count(), item_count);
}

#[test]
fn bare_string_items_have_no_checksum_or_source() {
    let json = r#"{"projects": {"old": {"path": "/code/old", "target": "cursor",
        "timestamp": "2024-05-01T12:00:00+00:00", "installed_rules": ["style"]}}}"#;
    let ledger = Ledger::from_json(json).unwrap();
    let project = &ledger.projects["old"];
    let item = project
        .target("cursor")
        .and_then(|t| t.item(ArtifactKind::Rule, "style"))
        .unwrap();
    assert!(item.checksum.is_none());
    assert!(item.source.is_none());
    assert_eq!(item.installed_at, project.timestamp);
}

#[test]
fn record_without_any_target_is_empty_project() {
    let json = r#"{"projects": {"bare": {"name": "bare", "path": "/code/bare"}}}"#;
    let ledger = Ledger::from_json(json).unwrap();
    assert!(ledger.projects["bare"].targets.is_empty());
}

#[test]
fn migrated_ledger_saves_in_current_shape() {
    let home = assert_fs::TempDir::new().unwrap();
    let paths = WardenPaths::at(home.path());
    home.child(".warden_state.json")
        .write_str(
            r#"{"projects": {"old": {"name": "old", "path": "/code/old", "target": "claude",
                "installed_rules": ["style"], "has_rules": true}}}"#,
        )
        .unwrap();

    let ledger = Ledger::load_at(&paths).unwrap();
    ledger.save_at(&paths).unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(paths.state_file()).unwrap()).unwrap();
    let record = &saved["projects"]["old"];
    assert!(record.get("target").is_none());
    assert_eq!(record["targets"]["claude"]["has_rules"], true);
    assert_eq!(record["targets"]["claude"]["installed_rules"][0]["name"], "style");
}

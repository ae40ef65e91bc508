//! The artifact library under the warden home.
//!
//! Built-in rules live in `rules/`, built-in commands in `commands/`, and
//! package content in `packages/<owner>-<repo>/`. Artifacts are addressed by
//! a spec: `name` for built-ins (`name` may contain `/` for nested files) or
//! `owner/repo:name` for package content.

use std::path::{Component, Path, PathBuf};

use warden_backend::join_dest;
use warden_core::{ArtifactKind, SourceKind, TargetSpec, WardenPaths};

use crate::error::{io_err, SyncError};

const MARKDOWN_EXT: &str = "md";

/// Shipped sample content, never offered for installation.
const EXAMPLE_DIR: &str = "example";

/// Package command directories, searched in order.
const PACKAGE_COMMAND_DIRS: &[&str] = &["commands", "commands-mdc", "mdc-commands", "cursor-commands"];

/// Package rule names reserved for format documentation.
const META_RULES: &[&str] = &["mdc", "meta", "format", "template"];

/// A resolved artifact: where it lives and how to record it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Spec as the user wrote it; this is the name recorded in the ledger.
    pub spec: String,
    pub kind: ArtifactKind,
    pub source: PathBuf,
    pub source_kind: SourceKind,
}

impl Artifact {
    /// Destination file name without extension: the part after `:` for
    /// package artifacts, the spec itself otherwise.
    pub fn file_stem(&self) -> &str {
        file_stem(&self.spec)
    }
}

/// Destination stem for an artifact spec.
pub fn file_stem(spec: &str) -> &str {
    spec.split_once(':').map(|(_, name)| name).unwrap_or(spec)
}

/// Destination of an artifact inside a project, relative to the project
/// root: rules take the target's rule extension, commands are always `.md`.
pub fn destination(target: &TargetSpec, kind: ArtifactKind, spec: &str) -> String {
    let (dir, ext) = match kind {
        ArtifactKind::Rule => (target.rules_path.as_str(), target.rule_extension.as_str()),
        ArtifactKind::Command => (target.commands_path.as_str(), ".md"),
    };
    join_dest(dir, &format!("{}{ext}", file_stem(spec)))
}

#[derive(Debug, Clone)]
pub struct Library {
    paths: WardenPaths,
}

impl Library {
    pub fn new(paths: WardenPaths) -> Self {
        Self { paths }
    }

    pub fn resolve(&self, kind: ArtifactKind, spec: &str) -> Result<Artifact, SyncError> {
        let not_found = || SyncError::ArtifactNotFound {
            kind,
            name: spec.to_string(),
        };
        if !is_safe_spec(spec) {
            return Err(not_found());
        }

        let candidates: Vec<(PathBuf, SourceKind)> = match spec.split_once(':') {
            Some((package, name)) => {
                let dir = self.paths.package_dir(package);
                let source_kind = SourceKind::Package(package.to_string());
                let file = markdown(name);
                match kind {
                    ArtifactKind::Rule => vec![(dir.join("rules").join(&file), source_kind)],
                    ArtifactKind::Command => PACKAGE_COMMAND_DIRS
                        .iter()
                        .map(|sub| (dir.join(sub).join(&file), source_kind.clone()))
                        .collect(),
                }
            }
            None => {
                let file = markdown(spec);
                let rule = (self.paths.rules_dir().join(&file), SourceKind::BuiltInRule);
                match kind {
                    ArtifactKind::Rule => vec![rule],
                    ArtifactKind::Command => vec![
                        (self.paths.commands_dir().join(&file), SourceKind::BuiltIn),
                        rule,
                    ],
                }
            }
        };

        candidates
            .into_iter()
            .find(|(path, _)| path.is_file())
            .map(|(source, source_kind)| Artifact {
                spec: spec.to_string(),
                kind,
                source,
                source_kind,
            })
            .ok_or_else(not_found)
    }

    /// Resolve every spec, failing on the first unknown one.
    pub fn resolve_all(&self, kind: ArtifactKind, specs: &[String]) -> Result<Vec<Artifact>, SyncError> {
        specs.iter().map(|spec| self.resolve(kind, spec)).collect()
    }

    /// Every installable spec of `kind`, sorted.
    pub fn available(&self, kind: ArtifactKind) -> Result<Vec<String>, SyncError> {
        let mut specs = match kind {
            ArtifactKind::Rule => list_markdown(&self.paths.rules_dir())?,
            ArtifactKind::Command => list_markdown(&self.paths.commands_dir())?,
        };
        for dir_name in self.packages()? {
            let dir = self.paths.packages_dir().join(&dir_name);
            let package = package_name(&dir_name);
            let names = match kind {
                ArtifactKind::Rule => list_markdown(&dir.join("rules"))?
                    .into_iter()
                    .filter(|name| !META_RULES.contains(&name.to_lowercase().as_str()))
                    .collect(),
                ArtifactKind::Command => {
                    let mut names = Vec::new();
                    for sub in PACKAGE_COMMAND_DIRS {
                        names.extend(list_markdown(&dir.join(sub))?);
                    }
                    names
                }
            };
            specs.extend(names.into_iter().map(|name| format!("{package}:{name}")));
        }
        specs.sort();
        specs.dedup();
        Ok(specs)
    }

    /// Directory names under `packages/`.
    pub fn packages(&self) -> Result<Vec<String>, SyncError> {
        let dir = self.paths.packages_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Package name for a directory under `packages/`: the first `-` of the
/// directory name separates owner and repo. The result always maps back to
/// the same directory through [`WardenPaths::package_dir`].
pub fn package_name(dir_name: &str) -> String {
    dir_name.replacen('-', "/", 1)
}

fn markdown(name: &str) -> String {
    format!("{name}.{MARKDOWN_EXT}")
}

/// Reject specs that would escape the library.
fn is_safe_spec(spec: &str) -> bool {
    let name = file_stem(spec);
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        && spec
            .split_once(':')
            .map(|(package, _)| !package.is_empty() && !package.contains(".."))
            .unwrap_or(true)
}

/// `*.md` files below `root` as extension-less, `/`-separated relative
/// names, skipping the top-level `example/` directory.
fn list_markdown(root: &Path) -> Result<Vec<String>, SyncError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    let example = root.join(EXAMPLE_DIR);
    let mut names: Vec<String> = files
        .into_iter()
        .filter(|path| !path.starts_with(&example))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(MARKDOWN_EXT))
        .filter_map(|path| {
            let rel = path.strip_prefix(root).ok()?.with_extension("");
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect();
    names.sort();
    Ok(names)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn library(home: &TempDir) -> Library {
        Library::new(WardenPaths::at(home.path()))
    }

    #[test]
    fn commands_fall_back_to_rules() {
        let home = TempDir::new().unwrap();
        home.child("rules/style.md").write_str("rule").unwrap();
        home.child("commands/review.md").write_str("cmd").unwrap();
        let lib = library(&home);

        let cmd = lib.resolve(ArtifactKind::Command, "review").unwrap();
        assert_eq!(cmd.source_kind, SourceKind::BuiltIn);
        let as_cmd = lib.resolve(ArtifactKind::Command, "style").unwrap();
        assert_eq!(as_cmd.source_kind, SourceKind::BuiltInRule);
        assert!(lib.resolve(ArtifactKind::Rule, "review").is_err());
    }

    #[test]
    fn package_specs_map_to_package_dirs() {
        let home = TempDir::new().unwrap();
        home.child("packages/acme-rules/rules/python.md").write_str("py").unwrap();
        home.child("packages/acme-rules/cursor-commands/ship.md").write_str("ship").unwrap();
        let lib = library(&home);

        let rule = lib.resolve(ArtifactKind::Rule, "acme/rules:python").unwrap();
        assert_eq!(rule.source_kind, SourceKind::Package("acme/rules".into()));
        assert_eq!(rule.file_stem(), "python");
        let cmd = lib.resolve(ArtifactKind::Command, "acme/rules:ship").unwrap();
        assert!(cmd.source.ends_with("cursor-commands/ship.md"));
    }

    #[test]
    fn destinations_follow_the_target_table() {
        let targets = warden_core::config::builtin_targets();
        assert_eq!(
            destination(&targets["cursor"], ArtifactKind::Rule, "acme/rules:python"),
            ".cursor/rules/python.mdc"
        );
        assert_eq!(
            destination(&targets["cursor"], ArtifactKind::Command, "review"),
            ".cursor/rules/review.md"
        );
        assert_eq!(
            destination(&targets["claude"], ArtifactKind::Rule, "lang/rust"),
            ".claude/rules/lang/rust.md"
        );
    }

    #[test]
    fn listed_package_specs_resolve() {
        let home = TempDir::new().unwrap();
        home.child("packages/acme-rules/rules/python.md").write_str("py").unwrap();
        home.child("packages/big-co-style/commands/ship.md").write_str("ship").unwrap();
        let lib = library(&home);

        let rules = lib.available(ArtifactKind::Rule).unwrap();
        assert_eq!(rules, vec!["acme/rules:python"]);
        let rule = lib.resolve(ArtifactKind::Rule, &rules[0]).unwrap();
        assert_eq!(rule.source_kind, SourceKind::Package("acme/rules".into()));

        let commands = lib.available(ArtifactKind::Command).unwrap();
        assert_eq!(commands, vec!["big/co-style:ship"]);
        let cmd = lib.resolve(ArtifactKind::Command, &commands[0]).unwrap();
        assert!(cmd.source.ends_with("big-co-style/commands/ship.md"));
    }

    #[test]
    fn escaping_specs_are_not_found() {
        let home = TempDir::new().unwrap();
        home.child("secret.md").write_str("x").unwrap();
        let lib = library(&home);
        assert!(matches!(
            lib.resolve(ArtifactKind::Rule, "../secret"),
            Err(SyncError::ArtifactNotFound { .. })
        ));
        assert!(lib.resolve(ArtifactKind::Rule, "").is_err());
    }

    #[test]
    fn listing_is_recursive_sorted_and_skips_examples() {
        let home = TempDir::new().unwrap();
        home.child("rules/zeta.md").write_str("z").unwrap();
        home.child("rules/lang/rust.md").write_str("r").unwrap();
        home.child("rules/example/demo.md").write_str("d").unwrap();
        home.child("rules/notes.txt").write_str("n").unwrap();
        home.child("packages/acme-rules/rules/python.md").write_str("p").unwrap();
        home.child("packages/acme-rules/rules/meta.md").write_str("m").unwrap();

        let rules = library(&home).available(ArtifactKind::Rule).unwrap();
        assert_eq!(rules, vec!["acme/rules:python", "lang/rust", "zeta"]);
        assert!(library(&home).available(ArtifactKind::Command).unwrap().is_empty());
    }
}

//! Warden home layout and `.warden_config.json`.
//!
//! # Storage layout
//!
//! ```text
//! <warden home>/                 ($WARDEN_HOME, else ~/.agent-warden)
//!   .warden_config.json          (target table + preferences, optional)
//!   .warden_state.json           (state ledger)
//!   .warden_state.json.lock      (advisory lock held by mutating commands)
//!   rules/                       (built-in rules, *.md)
//!   commands/                    (built-in commands, *.md)
//!   packages/<owner>-<repo>/     (package checkouts: rules/, commands/)
//! ```
//!
//! Every loader has an explicit-home form so tests can point at a `TempDir`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};

pub const CONFIG_FILE: &str = ".warden_config.json";
pub const STATE_FILE: &str = ".warden_state.json";
pub const LOCK_FILE: &str = ".warden_state.json.lock";
pub const RULES_DIR: &str = "rules";
pub const COMMANDS_DIR: &str = "commands";
pub const PACKAGES_DIR: &str = "packages";
pub const DEFAULT_TARGET: &str = "augment";

/// Environment variable overriding the warden home directory.
pub const HOME_ENV: &str = "WARDEN_HOME";

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Resolved locations of everything under the warden home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardenPaths {
    home: PathBuf,
}

impl WardenPaths {
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve the home: explicit argument, then `$WARDEN_HOME`, then
    /// `~/.agent-warden`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(home) = explicit {
            return Ok(Self::at(home));
        }
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::at(PathBuf::from(home)));
        }
        let user_home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self::at(user_home.join(".agent-warden")))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.home.join(STATE_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.home.join(LOCK_FILE)
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.home.join(RULES_DIR)
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.home.join(COMMANDS_DIR)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.home.join(PACKAGES_DIR)
    }

    /// `packages/<owner>-<repo>` for a package named `owner/repo`.
    pub fn package_dir(&self, package: &str) -> PathBuf {
        self.packages_dir().join(package.replace('/', "-"))
    }

    /// Create the home and its `rules/`, `commands/` and `packages/` directories
    /// when missing.
    pub fn ensure_layout(&self) -> Result<(), ConfigError> {
        for dir in [
            self.home.clone(),
            self.rules_dir(),
            self.commands_dir(),
            self.packages_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| config_io(&dir, e))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Target table
// ---------------------------------------------------------------------------

/// Directory layout and capabilities of one integration target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TargetSpecCompat")]
pub struct TargetSpec {
    /// Rules directory relative to the project root, e.g. `.claude/rules/`.
    pub rules_path: String,
    /// Commands directory relative to the project root.
    pub commands_path: String,
    pub supports_commands: bool,
    /// File name of the target's user-level config, if it has one.
    pub global_config: Option<String>,
    /// Extension for installed rule files (`.mdc` for cursor).
    pub rule_extension: String,
    /// The target cannot follow symlinks; copy mode is forced.
    pub requires_copy: bool,
}

impl TargetSpec {
    /// Where `target` keeps its user-level config under `user_home`, or
    /// `None` when it has none.
    pub fn global_config_path(&self, target: &str, user_home: &Path) -> Option<PathBuf> {
        let file = self.global_config.as_deref()?;
        let dir = match target {
            "claude" => user_home.join(".claude"),
            "windsurf" => user_home.join(".codeium").join("windsurf").join("memories"),
            "codex" => user_home.join(".codex"),
            other => user_home.join(format!(".{other}")),
        };
        Some(dir.join(file))
    }

    fn builtin(
        rules_path: &str,
        commands_path: &str,
        supports_commands: bool,
        global_config: Option<&str>,
        rule_extension: &str,
        requires_copy: bool,
    ) -> Self {
        Self {
            rules_path: rules_path.to_string(),
            commands_path: commands_path.to_string(),
            supports_commands,
            global_config: global_config.map(str::to_string),
            rule_extension: rule_extension.to_string(),
            requires_copy,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetSpecCompat {
    Structured(TargetSpecFields),
    /// Early configs stored a bare rules directory per target.
    Path(String),
}

#[derive(Deserialize)]
struct TargetSpecFields {
    rules_path: String,
    commands_path: Option<String>,
    #[serde(default)]
    supports_commands: bool,
    #[serde(default)]
    global_config: Option<String>,
    #[serde(default)]
    rule_extension: Option<String>,
    #[serde(default)]
    requires_copy: bool,
}

impl From<TargetSpecCompat> for TargetSpec {
    fn from(compat: TargetSpecCompat) -> Self {
        match compat {
            TargetSpecCompat::Structured(f) => Self {
                commands_path: f.commands_path.unwrap_or_else(|| f.rules_path.clone()),
                rules_path: f.rules_path,
                supports_commands: f.supports_commands,
                global_config: f.global_config,
                rule_extension: f.rule_extension.unwrap_or_else(|| ".md".to_string()),
                requires_copy: f.requires_copy,
            },
            TargetSpecCompat::Path(path) => Self {
                rules_path: path.clone(),
                commands_path: path,
                supports_commands: false,
                global_config: None,
                rule_extension: ".md".to_string(),
                requires_copy: false,
            },
        }
    }
}

/// The built-in target table.
pub fn builtin_targets() -> BTreeMap<String, TargetSpec> {
    let mut targets = BTreeMap::new();
    targets.insert(
        "cursor".to_string(),
        TargetSpec::builtin(".cursor/rules/", ".cursor/rules/", false, None, ".mdc", false),
    );
    targets.insert(
        "augment".to_string(),
        TargetSpec::builtin(".augment/rules/", ".augment/commands/", true, None, ".md", true),
    );
    targets.insert(
        "claude".to_string(),
        TargetSpec::builtin(
            ".claude/rules/",
            ".claude/commands/",
            true,
            Some("CLAUDE.md"),
            ".md",
            false,
        ),
    );
    targets.insert(
        "windsurf".to_string(),
        TargetSpec::builtin(
            ".windsurf/rules/",
            ".windsurf/commands/",
            false,
            Some("global_rules.md"),
            ".md",
            false,
        ),
    );
    targets.insert(
        "codex".to_string(),
        TargetSpec::builtin(
            ".codex/rules/",
            ".codex/commands/",
            true,
            Some("config.toml"),
            ".md",
            false,
        ),
    );
    targets
}

// ---------------------------------------------------------------------------
// WardenConfig
// ---------------------------------------------------------------------------

/// Contents of `.warden_config.json`. Every key is optional on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default = "builtin_targets")]
    pub targets: BTreeMap<String, TargetSpec>,
    #[serde(default = "default_target")]
    pub default_target: String,
    /// Whether batch status/update passes include remote projects by default.
    #[serde(default = "enabled")]
    pub update_remote_projects: bool,
    #[serde(default = "enabled")]
    pub auto_update: bool,
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

fn enabled() -> bool {
    true
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            targets: builtin_targets(),
            default_target: default_target(),
            update_remote_projects: true,
            auto_update: true,
        }
    }
}

impl WardenConfig {
    /// Load `.warden_config.json` from `paths`, falling back to defaults when
    /// the file does not exist. Targets from the file overlay the built-in
    /// table rather than replacing it.
    pub fn load_at(paths: &WardenPaths) -> Result<Self, ConfigError> {
        let path = paths.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| config_io(&path, e))?;
        let mut loaded: WardenConfig = serde_json::from_str(&contents)
            .map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        let mut merged = builtin_targets();
        merged.append(&mut loaded.targets);
        loaded.targets = merged;
        tracing::debug!(path = %path.display(), targets = loaded.targets.len(), "loaded config");
        Ok(loaded)
    }

    /// Write the config atomically (`.tmp` then rename).
    pub fn save_at(&self, paths: &WardenPaths) -> Result<(), ConfigError> {
        let path = paths.config_file();
        std::fs::create_dir_all(paths.home()).map_err(|e| config_io(paths.home(), e))?;
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| config_io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| config_io(&path, e))?;
        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<&TargetSpec> {
        self.targets.get(name)
    }

    pub fn available_targets(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn target_supports_commands(&self, name: &str) -> bool {
        self.target(name).map(|t| t.supports_commands).unwrap_or(false)
    }
}

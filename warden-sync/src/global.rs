//! User-level config files written by `warden global-install`.
//!
//! Each target keeps its global config in its own format: claude includes an
//! aggregated rules file from a managed section of `CLAUDE.md`, windsurf
//! reads one aggregated markdown file, codex reads a TOML table pointing at
//! the warden home.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use warden_core::{WardenConfig, WardenPaths};

/// Name of the aggregated rules file next to claude's `CLAUDE.md`.
pub const CLAUDE_RULES_FILE: &str = "warden-rules.md";

pub const MANAGED_BEGIN: &str = "# BEGIN AGENT WARDEN MANAGED SECTION";
pub const MANAGED_END: &str = "# END AGENT WARDEN MANAGED SECTION";

/// One rule as it appears in an aggregated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSection {
    pub name: String,
    pub content: String,
}

fn append_sections(out: &mut String, rules: &[RuleSection]) {
    for rule in rules {
        out.push_str(&format!("\n## Rule: {}\n\n", rule.name));
        out.push_str(&rule.content);
        out.push_str("\n\n---\n");
    }
}

/// Content of `~/.claude/warden-rules.md`.
pub fn claude_rules(paths: &WardenPaths, rules: &[RuleSection], updated: DateTime<Utc>) -> String {
    let mut out = format!(
        "# Agent Warden Rules\n\n\
         This file is generated by Agent Warden. Edits are overwritten.\n\n\
         Last updated: {}\n\
         Rules source: {}\n\n---\n",
        updated.format("%Y-%m-%d %H:%M:%S"),
        paths.rules_dir().display()
    );
    append_sections(&mut out, rules);
    out
}

/// `CLAUDE.md` with the managed section pointing at `include`. Content
/// outside the section is left as it was; a missing file gets a title.
pub fn upsert_managed_section(existing: Option<&str>, include: &Path) -> String {
    let section = format!("{MANAGED_BEGIN}\n@{}\n{MANAGED_END}", include.display());
    let Some(existing) = existing else {
        return format!(
            "# Claude Code Global Instructions\n\n\
             Add your own instructions above or below the Agent Warden section.\n\n\
             {section}\n"
        );
    };
    if let Some(start) = existing.find(MANAGED_BEGIN) {
        if let Some(end_rel) = existing[start..].find(MANAGED_END) {
            let end = start + end_rel + MANAGED_END.len();
            return format!("{}{section}{}", &existing[..start], &existing[end..]);
        }
    }
    format!("{}\n\n{section}\n", existing.trim_end())
}

/// Content of windsurf's `global_rules.md`.
pub fn windsurf_rules(paths: &WardenPaths, rules: &[RuleSection]) -> String {
    let mut out = format!(
        "# Global Agent Warden Rules for Windsurf\n\n\
         These rules apply to every project opened in Windsurf.\n\n\
         ## Rules Source\n\
         Rules are managed by Agent Warden from: {}\n\n\
         ## Available Commands\n\
         Commands are available from: {}\n\n---\n",
        paths.rules_dir().display(),
        paths.commands_dir().display()
    );
    append_sections(&mut out, rules);
    out
}

#[derive(Serialize)]
struct CodexConfig {
    warden: CodexWarden,
    logging: CodexLogging,
}

#[derive(Serialize)]
struct CodexWarden {
    rules_dir: String,
    commands_path: String,
    targets: CodexTargets,
    behavior: CodexBehavior,
}

#[derive(Serialize)]
struct CodexTargets {
    default: String,
}

#[derive(Serialize)]
struct CodexBehavior {
    auto_update: bool,
    use_symlinks: bool,
}

#[derive(Serialize)]
struct CodexLogging {
    level: String,
    file: String,
}

/// Content of codex's `config.toml`.
pub fn codex_config(paths: &WardenPaths, config: &WardenConfig) -> Result<String, toml::ser::Error> {
    let use_symlinks = config
        .target(&config.default_target)
        .map(|spec| !spec.requires_copy)
        .unwrap_or(true);
    toml::to_string(&CodexConfig {
        warden: CodexWarden {
            rules_dir: paths.rules_dir().display().to_string(),
            commands_path: paths.commands_dir().display().to_string(),
            targets: CodexTargets {
                default: config.default_target.clone(),
            },
            behavior: CodexBehavior {
                auto_update: config.auto_update,
                use_symlinks,
            },
        },
        logging: CodexLogging {
            level: "info".to_string(),
            file: "~/.codex/warden.log".to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rules() -> Vec<RuleSection> {
        vec![
            RuleSection {
                name: "style".into(),
                content: "Prefer small functions.".into(),
            },
            RuleSection {
                name: "testing".into(),
                content: "Test behavior.".into(),
            },
        ]
    }

    #[test]
    fn claude_rules_file_lists_every_rule() {
        let paths = WardenPaths::at("/w");
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        let text = claude_rules(&paths, &rules(), at);
        assert!(text.contains("Last updated: 2026-10-14 09:30:00"));
        assert!(text.contains("Rules source: /w/rules"));
        let style = text.find("## Rule: style").unwrap();
        let testing = text.find("## Rule: testing").unwrap();
        assert!(style < testing);
        assert!(text.contains("Prefer small functions.\n\n---\n"));
    }

    #[test]
    fn managed_section_is_created_replaced_and_appended() {
        let include = Path::new("/home/dev/.claude/warden-rules.md");

        let fresh = upsert_managed_section(None, include);
        assert!(fresh.starts_with("# Claude Code Global Instructions"));
        assert!(fresh.contains(&format!("{MANAGED_BEGIN}\n@/home/dev/.claude/warden-rules.md\n{MANAGED_END}")));

        let mine = "# Mine\n\nAlways answer in English.\n";
        let appended = upsert_managed_section(Some(mine), include);
        assert!(appended.starts_with("# Mine\n\nAlways answer in English.\n\n# BEGIN"));

        let old = format!("top\n{MANAGED_BEGIN}\n@/old/path.md\n{MANAGED_END}\nbottom\n");
        let replaced = upsert_managed_section(Some(&old), include);
        assert_eq!(
            replaced,
            format!("top\n{MANAGED_BEGIN}\n@/home/dev/.claude/warden-rules.md\n{MANAGED_END}\nbottom\n")
        );
        assert_eq!(upsert_managed_section(Some(&replaced), include), replaced);
    }

    #[test]
    fn codex_config_reflects_preferences() {
        let paths = WardenPaths::at("/w");
        let config = WardenConfig {
            default_target: "claude".into(),
            auto_update: false,
            ..WardenConfig::default()
        };
        let text = codex_config(&paths, &config).unwrap();
        let parsed: toml::Value = toml::from_str(&text).unwrap();
        assert_eq!(parsed["warden"]["rules_dir"].as_str(), Some("/w/rules"));
        assert_eq!(parsed["warden"]["targets"]["default"].as_str(), Some("claude"));
        assert_eq!(parsed["warden"]["behavior"]["auto_update"].as_bool(), Some(false));
        assert_eq!(parsed["warden"]["behavior"]["use_symlinks"].as_bool(), Some(true));
        assert_eq!(parsed["logging"]["level"].as_str(), Some("info"));
    }

    #[test]
    fn windsurf_rules_name_their_sources() {
        let text = windsurf_rules(&WardenPaths::at("/w"), &rules());
        assert!(text.contains("from: /w/rules"));
        assert!(text.contains("from: /w/commands"));
        assert!(text.contains("## Rule: testing\n\nTest behavior."));
    }
}

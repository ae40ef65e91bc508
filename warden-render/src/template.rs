//! Command template placeholders.
//!
//! Only two placeholders exist, `{{RULES_DIR}}` and `{{PLATFORM_NOTES}}`.
//! Substitution is literal; any other `{{...}}` text passes through as is.

const RULES_DIR: &str = "{{RULES_DIR}}";
const PLATFORM_NOTES: &str = "{{PLATFORM_NOTES}}";

/// Paragraph substituted for `{{PLATFORM_NOTES}}`; empty for unknown targets.
pub fn platform_notes(target: &str) -> &'static str {
    match target {
        "augment" => {
            "This project uses **Augment** as the AI coding assistant.\n\
             - Rules are located in `.augment/rules/`\n\
             - Commands are located in `.augment/commands/`\n\
             - Both rules and commands use Markdown format"
        }
        "cursor" => {
            "This project uses **Cursor** as the AI coding assistant.\n\
             - Rules are located in `.cursor/rules/`\n\
             - Cursor uses a rules-based system where all files in the rules directory are automatically loaded\n\
             - Commands are also stored in `.cursor/rules/` alongside rules"
        }
        "claude" => {
            "This project uses **Claude** as the AI coding assistant.\n\
             - Rules are located in `.claude/rules/`\n\
             - Commands are located in `.claude/commands/`\n\
             - May also reference global rules from `~/.claude/warden-rules.md`"
        }
        "windsurf" => {
            "This project uses **Windsurf** as the AI coding assistant.\n\
             - Rules are located in `.windsurf/rules/`\n\
             - Commands are located in `.windsurf/commands/`\n\
             - May also reference global rules from `~/.codeium/windsurf/memories/global_rules.md`"
        }
        "codex" => {
            "This project uses **Codex** as the AI coding assistant.\n\
             - Rules are located in `.codex/rules/`\n\
             - Commands are located in `.codex/commands/`\n\
             - Additional configuration may be in `.codex/config.toml`"
        }
        _ => "",
    }
}

/// Substitute the target's values into a command body.
pub fn process_command_template(content: &str, target: &str, rules_dir: &str) -> String {
    content
        .replace(RULES_DIR, rules_dir)
        .replace(PLATFORM_NOTES, platform_notes(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_every_occurrence() {
        let out = process_command_template(
            "Read {{RULES_DIR}}style.md and {{RULES_DIR}}testing.md",
            "claude",
            ".claude/rules/",
        );
        assert_eq!(out, "Read .claude/rules/style.md and .claude/rules/testing.md");
    }

    #[test]
    fn notes_follow_the_target() {
        let out = process_command_template("{{PLATFORM_NOTES}}", "augment", ".augment/rules/");
        assert!(out.starts_with("This project uses **Augment**"));
        assert!(out.contains("\n- Commands are located in `.augment/commands/`"));
        assert_eq!(process_command_template("[{{PLATFORM_NOTES}}]", "zed", "x/"), "[]");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let raw = "{{ OTHER }} {% if x %}";
        assert_eq!(process_command_template(raw, "cursor", ".cursor/rules/"), raw);
    }
}

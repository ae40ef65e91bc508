//! `warden global-install <target>`: user-level config outside any project.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use warden_sync::{GlobalInstallRequest, Selection};

use super::{display_path, plural, Context};

#[derive(Args, Debug)]
pub struct GlobalInstallArgs {
    /// Target whose user-level config to write (claude, windsurf, codex).
    pub target: String,

    /// Rules to include (default: all).
    #[arg(long, num_args = 1..)]
    pub rules: Vec<String>,

    /// Overwrite an existing config.
    #[arg(long, short)]
    pub force: bool,
}

impl GlobalInstallArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let user_home = dirs::home_dir().context("could not determine the home directory")?;
        let rules = if self.rules.is_empty() {
            Selection::All
        } else {
            Selection::Only(self.rules)
        };
        let warden = ctx.open()?;
        let report = warden
            .install_global_config(&GlobalInstallRequest {
                target: self.target.clone(),
                rules,
                force: self.force,
                user_home,
            })
            .with_context(|| format!("global install for '{}' failed", self.target))?;

        println!(
            "{} {}: global config with {}",
            "✓".green().bold(),
            report.target.bold(),
            plural(report.rules.len(), "rule")
        );
        for path in &report.written {
            println!("    + {}", display_path(&path.display().to_string()));
        }
        Ok(())
    }
}

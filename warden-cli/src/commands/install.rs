//! `warden install <location>`

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use warden_sync::{InstallRequest, Selection};

use super::{display_path, plural, print_errors, print_notices, Context};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Project location: a local path or `[user@]host:path`.
    pub location: String,

    /// Target to install (default from config).
    #[arg(long, short)]
    pub target: Option<String>,

    /// Install independent copies instead of symlinks.
    #[arg(long)]
    pub copy: bool,

    /// Rules to install. Defaults to every available rule.
    #[arg(long, num_args = 1..)]
    pub rules: Option<Vec<String>>,

    /// Commands to install. Without names, every available command.
    #[arg(long, num_args = 0..)]
    pub commands: Option<Vec<String>>,

    /// Project name (default: the location's last path component).
    #[arg(long)]
    pub name: Option<String>,
}

impl InstallArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let mut warden = ctx.open_locked()?;
        let request = InstallRequest {
            location: self.location.clone(),
            target: self.target,
            copy: self.copy,
            rules: match self.rules {
                Some(names) => Selection::Only(names),
                None => Selection::All,
            },
            commands: match self.commands {
                None => Selection::Nothing,
                Some(names) if names.is_empty() => Selection::All,
                Some(names) => Selection::Only(names),
            },
            name: self.name,
        };

        let report = warden
            .install(request)
            .with_context(|| format!("install into '{}' failed", self.location))?;

        print_notices(&report.notices);
        let verb = if report.new_project { "Tracking" } else { "Updating" };
        println!(
            "{verb} project '{}' at {}",
            report.project.bold(),
            display_path(&report.location)
        );
        println!(
            "{} Installed {} and {} for {} ({})",
            "✓".green().bold(),
            plural(report.rules.len(), "rule"),
            plural(report.commands.len(), "command"),
            report.target,
            report.install_type,
        );
        print_errors(&report.errors);
        Ok(())
    }
}

//! `warden remove <project>`

use anyhow::{bail, Context as _, Result};
use clap::Args;
use colored::Colorize;

use super::{confirm, plural, print_errors, Context};

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub project: String,

    /// Only this target (default: every target).
    #[arg(long, short)]
    pub target: Option<String>,

    #[arg(long, num_args = 1..)]
    pub rules: Vec<String>,

    #[arg(long, num_args = 1..)]
    pub commands: Vec<String>,

    /// Skip the confirmation prompt.
    #[arg(long, short)]
    pub yes: bool,
}

impl RemoveArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        if self.rules.is_empty() && self.commands.is_empty() {
            bail!("specify --rules and/or --commands");
        }
        let count = self.rules.len() + self.commands.len();
        let question = format!("Remove {} from '{}'?", plural(count, "item"), self.project);
        if !self.yes && !confirm(&question)? {
            println!("Cancelled.");
            return Ok(());
        }

        let mut warden = ctx.open_locked()?;
        let report = warden
            .remove_items(&self.project, &self.rules, &self.commands, self.target.as_deref())
            .with_context(|| format!("remove from '{}' failed", self.project))?;

        println!(
            "{} {}: removed {}",
            "✓".green().bold(),
            report.project.bold(),
            plural(report.removed.len(), "item")
        );
        for item in &report.removed {
            println!("    - {item}");
        }
        for item in &report.not_installed {
            println!("    {} not installed", item.to_string().bright_black());
        }
        print_errors(&report.errors);
        Ok(())
    }
}

//! `warden add <project>` and `warden add --all-projects`

use anyhow::{bail, Context as _, Result};
use clap::Args;
use colored::Colorize;

use warden_sync::AddReport;

use super::{confirm, plural, print_errors, print_notices, Context};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Project to extend.
    #[arg(required_unless_present = "all_projects", conflicts_with = "all_projects")]
    pub project: Option<String>,

    /// Add to every tracked project.
    #[arg(long)]
    pub all_projects: bool,

    /// Only this target (default: the project's default targets, else all).
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

impl AddArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        if self.rules.is_empty() && self.commands.is_empty() {
            bail!("specify --rules and/or --commands");
        }
        let mut warden = ctx.open_locked()?;

        let Some(project) = &self.project else {
            let count = warden.list_projects().len();
            let question = format!(
                "Add {} and {} to {}?",
                plural(self.rules.len(), "rule"),
                plural(self.commands.len(), "command"),
                plural(count, "project"),
            );
            if !self.yes && !confirm(&question)? {
                println!("Cancelled.");
                return Ok(());
            }
            let report = warden
                .install_to_all_projects(&self.rules, &self.commands, self.target.as_deref())
                .context("add to all projects failed")?;
            for added in &report.installed {
                print_added(added);
            }
            for error in &report.errors {
                println!("{} {error}", "✗".red().bold());
            }
            return Ok(());
        };

        let report = warden
            .add_to_project(project, &self.rules, &self.commands, self.target.as_deref())
            .with_context(|| format!("add to '{project}' failed"))?;
        print_added(&report);
        Ok(())
    }
}

fn print_added(report: &AddReport) {
    print_notices(&report.notices);
    if report.added.is_empty() {
        println!("{}: nothing new to add", report.project.bold());
    } else {
        println!(
            "{} {}: added {}",
            "✓".green().bold(),
            report.project.bold(),
            plural(report.added.len(), "item")
        );
        for item in &report.added {
            println!("    + {item}");
        }
    }
    for skipped in &report.skipped {
        println!("    - {} skipped: {}", skipped.item, skipped.reason);
    }
    print_errors(&report.errors);
}

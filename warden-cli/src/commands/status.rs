//! `warden status`: drift between sources and installed copies.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use warden_sync::{Classification, ItemStatus, ProjectCheck, ProjectStatus};

use super::{plural, print_errors, print_json, Context};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Check one project; all tracked projects when omitted.
    pub project: Option<String>,

    /// Leave remote projects out of the all-projects check.
    #[arg(long)]
    pub no_remote: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "item")]
    item: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "status")]
    status: String,
}

impl StatusArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let warden = ctx.open()?;

        if let Some(project) = &self.project {
            let status = warden
                .status(project)
                .with_context(|| format!("status check failed for '{project}'"))?;
            if self.json {
                return print_json(&status);
            }
            print_project(&status, true);
            return Ok(());
        }

        let include_remote = if self.no_remote { Some(false) } else { None };
        let checks: BTreeMap<String, ProjectCheck> = warden.check_all_projects_status(include_remote);
        if self.json {
            return print_json(&checks);
        }

        let total = warden.list_projects().len();
        println!(
            "Warden v{} | {} | {} need attention",
            env!("CARGO_PKG_VERSION"),
            plural(total, "project"),
            checks.len()
        );
        if checks.is_empty() {
            println!("Everything is up to date.");
            return Ok(());
        }
        for (name, check) in &checks {
            match check {
                ProjectCheck::Status(status) => print_project(status, false),
                ProjectCheck::Error(message) => {
                    println!("{}", name.to_uppercase().bold());
                    println!("{} {message}", "✗".red().bold());
                }
            }
        }
        Ok(())
    }
}

/// Table of one project's items. Up-to-date items are shown only when
/// `all` is set.
fn print_project(status: &ProjectStatus, all: bool) {
    println!("{}", status.project.to_uppercase().bold());
    let rows: Vec<StatusRow> = status
        .items
        .iter()
        .filter(|item| all || item.classification.is_finding())
        .map(row)
        .collect();
    if rows.is_empty() && status.errors.is_empty() {
        println!("Everything is up to date.");
        return;
    }
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
    print_errors(&status.errors);

    let outdated = status.count(Classification::Outdated);
    let conflicts = status.count(Classification::Conflict);
    if outdated + conflicts > 0 {
        println!(
            "Run 'warden update {}' to pull {} ({}).",
            status.project,
            plural(outdated, "outdated item"),
            plural(conflicts, "conflict")
        );
    }
}

fn row(item: &ItemStatus) -> StatusRow {
    StatusRow {
        item: item.name.clone(),
        kind: item.kind.to_string(),
        target: item.target.clone(),
        status: label(item.classification),
    }
}

fn label(classification: Classification) -> String {
    let text = classification.to_string().to_uppercase();
    match classification {
        Classification::UpToDate => text.green().bold().to_string(),
        Classification::Outdated => text.yellow().bold().to_string(),
        Classification::UserModified => text.cyan().bold().to_string(),
        Classification::Conflict => text.red().bold().to_string(),
        Classification::MissingSource | Classification::MissingInstalled => {
            text.magenta().bold().to_string()
        }
    }
}

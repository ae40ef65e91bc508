//! `warden project list|untrack|rename|configure|drop-target|sever`

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use warden_backend::Location;
use warden_core::Project;

use super::{confirm, display_path, plural, print_errors, print_json, Context};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// List tracked projects.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Stop tracking a project. Installed files are left in place.
    Untrack {
        name: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Rename a tracked project.
    Rename { old: String, new: String },

    /// Set the targets `warden add` uses when no target is given.
    Configure(ConfigureArgs),

    /// Delete a target's installed files and stop tracking the target.
    DropTarget {
        name: String,
        target: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Turn symlink installs into copies that no longer follow the library.
    Sever {
        name: String,

        /// Only this target (default: every target).
        #[arg(long, short)]
        target: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    pub name: String,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "project")]
    name: String,
    #[tabled(rename = "location")]
    location: String,
    #[tabled(rename = "targets")]
    targets: String,
    #[tabled(rename = "items")]
    items: usize,
    #[tabled(rename = "updated")]
    updated: String,
}

#[derive(Serialize)]
struct ProjectJson<'a> {
    name: &'a str,
    path: &'a str,
    remote: bool,
    timestamp: String,
    default_targets: &'a [String],
    targets: Vec<TargetJson<'a>>,
}

#[derive(Serialize)]
struct TargetJson<'a> {
    name: &'a str,
    install_type: String,
    rules: usize,
    commands: usize,
}

pub fn run(cmd: ProjectCommand, ctx: &Context) -> Result<()> {
    match cmd {
        ProjectCommand::List { json } => list(ctx, json),
        ProjectCommand::Untrack { name, yes } => untrack(ctx, &name, yes),
        ProjectCommand::Rename { old, new } => rename(ctx, &old, &new),
        ProjectCommand::Configure(args) => configure(ctx, args),
        ProjectCommand::DropTarget { name, target, yes } => drop_target(ctx, &name, &target, yes),
        ProjectCommand::Sever { name, target, yes } => sever(ctx, &name, target.as_deref(), yes),
    }
}

fn list(ctx: &Context, json: bool) -> Result<()> {
    let warden = ctx.open()?;
    let projects = warden.list_projects();

    if json {
        let payload: Vec<ProjectJson<'_>> = projects.iter().map(|p| project_json(p)).collect();
        return print_json(&payload);
    }
    if projects.is_empty() {
        println!("No projects tracked.");
        println!("Run: warden install <path>");
        return Ok(());
    }

    let rows: Vec<ProjectRow> = projects
        .iter()
        .map(|p| ProjectRow {
            name: p.name.0.clone(),
            location: display_path(&p.path),
            targets: p
                .targets
                .iter()
                .map(|(name, t)| {
                    let marker = if p.default_targets.contains(name) { "*" } else { "" };
                    format!("{name}{marker} ({})", t.install_type)
                })
                .collect::<Vec<_>>()
                .join(", "),
            items: p.targets.values().map(|t| t.item_count()).sum(),
            updated: p.timestamp.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn project_json(project: &Project) -> ProjectJson<'_> {
    ProjectJson {
        name: project.name.as_str(),
        path: &project.path,
        remote: Location::parse(&project.path).is_remote(),
        timestamp: project.timestamp.to_rfc3339(),
        default_targets: &project.default_targets,
        targets: project
            .targets
            .iter()
            .map(|(name, t)| TargetJson {
                name,
                install_type: t.install_type.to_string(),
                rules: t.items(warden_core::ArtifactKind::Rule).len(),
                commands: t.items(warden_core::ArtifactKind::Command).len(),
            })
            .collect(),
    }
}

fn untrack(ctx: &Context, name: &str, yes: bool) -> Result<()> {
    let question = format!("Stop tracking '{name}'? Installed files stay in place.");
    if !yes && !confirm(&question)? {
        println!("Cancelled.");
        return Ok(());
    }
    let mut warden = ctx.open_locked()?;
    if warden.untrack(name).context("failed to untrack project")? {
        println!("{} Untracked '{name}'", "✓".green().bold());
    } else {
        println!("No project named '{name}'.");
    }
    Ok(())
}

fn rename(ctx: &Context, old: &str, new: &str) -> Result<()> {
    let mut warden = ctx.open_locked()?;
    let stored = warden
        .rename(old, new)
        .with_context(|| format!("failed to rename '{old}'"))?;
    println!("{} Renamed '{old}' to '{stored}'", "✓".green().bold());
    Ok(())
}

fn configure(ctx: &Context, args: ConfigureArgs) -> Result<()> {
    let mut warden = ctx.open_locked()?;
    warden
        .configure_targets(&args.name, &args.targets)
        .with_context(|| format!("failed to configure '{}'", args.name))?;
    println!(
        "{} Default targets for '{}': {}",
        "✓".green().bold(),
        args.name,
        args.targets.join(", ")
    );
    Ok(())
}

fn drop_target(ctx: &Context, name: &str, target: &str, yes: bool) -> Result<()> {
    let question = format!("Delete every file '{target}' installed in '{name}'?");
    if !yes && !confirm(&question)? {
        println!("Cancelled.");
        return Ok(());
    }
    let mut warden = ctx.open_locked()?;
    let report = warden
        .remove_target(name, target)
        .with_context(|| format!("failed to drop '{target}' from '{name}'"))?;
    for item in &report.removed {
        println!("    - {item}");
    }
    print_errors(&report.errors);
    if report.target_removed {
        println!(
            "{} Dropped '{target}' from '{}' ({} removed)",
            "✓".green().bold(),
            report.project,
            plural(report.removed.len(), "file")
        );
    } else {
        println!(
            "{} '{target}' is still tracked; rerun once the errors above are fixed",
            "!".yellow().bold()
        );
    }
    Ok(())
}

fn sever(ctx: &Context, name: &str, target: Option<&str>, yes: bool) -> Result<()> {
    let question = format!("Sever '{name}'? Its rules will stop following library changes.");
    if !yes && !confirm(&question)? {
        println!("Cancelled.");
        return Ok(());
    }
    let mut warden = ctx.open_locked()?;
    let report = warden
        .sever(name, target)
        .with_context(|| format!("failed to sever '{name}'"))?;
    for target in &report.severed {
        println!("{} Severed '{target}': now a copy install", "✓".green().bold());
    }
    for target in &report.already_copies {
        println!("    {} already uses copies", target.bright_black());
    }
    print_errors(&report.errors);
    Ok(())
}

//! Warden: keep AI assistant rules and commands in sync across projects.
//!
//! # Usage
//!
//! ```text
//! warden install <location> [--target T] [--copy] [--rules R..] [--commands [C..]] [--name N]
//! warden add <project> [--target T] [--rules R..] [--commands C..]
//! warden add --all-projects [--rules R..] [--commands C..] [--yes]
//! warden update <project> [--rules R..] [--commands C..] [--force]
//! warden update --all-projects [--dry-run] [--no-remote]
//! warden remove <project> [--rules R..] [--commands C..] [--yes]
//! warden status [<project>] [--no-remote] [--json]
//! warden diff <project> <item> [--target T]
//! warden project list|untrack|rename|configure
//! warden project drop-target <project> <target> [--yes]
//! warden project sever <project> [--target T] [--yes]
//! warden global-install <target> [--rules R..] [--force]
//! warden list [rules|commands]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use commands::{
    add::AddArgs, diff::DiffArgs, global::GlobalInstallArgs, install::InstallArgs, list::ListArgs,
    project::ProjectCommand, remove::RemoveArgs, status::StatusArgs, update::UpdateArgs, Context,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Sync AI assistant rules and commands into local and remote projects",
    long_about = None,
)]
struct Cli {
    /// Warden home directory (default: $WARDEN_HOME, then ~/.agent-warden).
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a target into a project location, tracking it on first use.
    Install(InstallArgs),

    /// Add rules or commands to a tracked project.
    Add(AddArgs),

    /// Pull source changes into installed copies.
    Update(UpdateArgs),

    /// Remove installed rules or commands.
    Remove(RemoveArgs),

    /// Show drift between sources and installed copies.
    Status(StatusArgs),

    /// Show a unified diff for one installed item.
    Diff(DiffArgs),

    /// Manage tracked projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// List the rules and commands available for installation.
    List(ListArgs),

    /// Write a target's user-level config from library rules.
    GlobalInstall(GlobalInstallArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::resolve(cli.home)?;
    match cli.command {
        Commands::Install(args) => args.run(&ctx),
        Commands::Add(args) => args.run(&ctx),
        Commands::Update(args) => args.run(&ctx),
        Commands::Remove(args) => args.run(&ctx),
        Commands::Status(args) => args.run(&ctx),
        Commands::Diff(args) => args.run(&ctx),
        Commands::Project { command } => commands::project::run(command, &ctx),
        Commands::List(args) => args.run(&ctx),
        Commands::GlobalInstall(args) => args.run(&ctx),
    }
}

/// `--verbose` forces debug; otherwise `RUST_LOG`, defaulting to warnings.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

//! Subcommand implementations and the helpers they share.

pub mod add;
pub mod diff;
pub mod global;
pub mod install;
pub mod list;
pub mod project;
pub mod remove;
pub mod status;
pub mod update;

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use colored::Colorize;
use dialoguer::Confirm;
use serde::Serialize;

use warden_core::WardenPaths;
use warden_render::ConverterRegistry;
use warden_sync::{ItemError, Warden};

/// Per-invocation settings resolved from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: WardenPaths,
}

impl Context {
    pub fn resolve(home: Option<PathBuf>) -> Result<Self> {
        let paths = WardenPaths::resolve(home).context("could not determine warden home")?;
        tracing::debug!(home = %paths.home().display(), "resolved warden home");
        Ok(Self { paths })
    }

    /// Engine for read-only commands; the ledger is not locked.
    pub fn open(&self) -> Result<Warden> {
        Warden::open(self.paths.clone(), ConverterRegistry::with_defaults())
            .with_context(|| format!("failed to load state from {}", self.paths.home().display()))
    }

    /// Engine for mutating commands; holds the ledger lock until dropped.
    pub fn open_locked(&self) -> Result<Warden> {
        Warden::open_locked(self.paths.clone(), ConverterRegistry::with_defaults())
            .with_context(|| format!("failed to lock state in {}", self.paths.home().display()))
    }
}

/// Ask a yes/no question, defaulting to no. Without a terminal to ask on
/// (piped input, CI) the answer is no; `--yes` skips the question.
pub fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        println!("{} {question} no terminal to ask on, answering no", "?".yellow().bold());
        return Ok(false);
    }
    let answer = Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact_opt()
        .context("failed to read answer")?;
    Ok(answer.unwrap_or(false))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON")?
    );
    Ok(())
}

pub fn print_notices(notices: &[String]) {
    for notice in notices {
        println!("{} {notice}", "!".yellow().bold());
    }
}

pub fn print_errors(errors: &[ItemError]) {
    for error in errors {
        println!("{} {error}", "✗".red().bold());
    }
}

/// `~/…` for paths under the user's home directory.
pub fn display_path(path: &str) -> String {
    let Some(home) = dirs::home_dir() else {
        return path.to_string();
    };
    match Path::new(path).strip_prefix(&home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.to_string(),
    }
}

pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

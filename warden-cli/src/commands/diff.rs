//! `warden diff <project> <item>`: what an update would change.

use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;

#[derive(Args, Debug)]
pub struct DiffArgs {
    pub project: String,

    /// Rule or command name as installed.
    pub item: String,

    /// Look only in this target.
    #[arg(long, short)]
    pub target: Option<String>,
}

impl DiffArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let warden = ctx.open()?;
        let diff = warden
            .show_diff(&self.project, &self.item, self.target.as_deref())
            .with_context(|| format!("diff failed for '{}'", self.item))?;

        if diff.is_empty() {
            println!("No differences for '{}'.", self.item);
            return Ok(());
        }
        print!("{diff}");
        if !diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}

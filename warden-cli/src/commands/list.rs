//! `warden list [rules|commands]`

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;

use warden_core::ArtifactKind;

use super::Context;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListKind {
    Rules,
    Commands,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only this kind; both when omitted.
    #[arg(value_enum)]
    pub kind: Option<ListKind>,
}

impl ListArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let warden = ctx.open()?;
        let kinds: &[ArtifactKind] = match self.kind {
            Some(ListKind::Rules) => &[ArtifactKind::Rule],
            Some(ListKind::Commands) => &[ArtifactKind::Command],
            None => &ArtifactKind::ALL,
        };
        for kind in kinds {
            let names = warden
                .available(*kind)
                .with_context(|| format!("failed to list {kind}s"))?;
            println!("{}", format!("{kind}s ({})", names.len()).to_uppercase().bold());
            if names.is_empty() {
                println!("  (none in {})", warden.paths().home().display());
            }
            for name in names {
                println!("  {name}");
            }
        }
        Ok(())
    }
}

//! `warden update <project>` and `warden update --all-projects`

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use warden_core::ArtifactKind;
use warden_sync::{
    ConflictPolicy, ItemRef, ItemStatus, UpdateAllReport, UpdateReport, UpdateRequest, Warden,
};

use super::{confirm, plural, print_errors, Context};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Project to update.
    #[arg(required_unless_present = "all_projects", conflicts_with = "all_projects")]
    pub project: Option<String>,

    /// Only this target.
    #[arg(long, short)]
    pub target: Option<String>,

    /// Rules to update.
    #[arg(long, num_args = 1..)]
    pub rules: Vec<String>,

    /// Commands to update.
    #[arg(long, num_args = 1..)]
    pub commands: Vec<String>,

    /// Update every outdated item (the default when no names are given).
    #[arg(long)]
    pub all: bool,

    /// Overwrite conflicting items without asking.
    #[arg(long, short)]
    pub force: bool,

    /// Answer yes to every conflict prompt.
    #[arg(long, short)]
    pub yes: bool,

    /// Update outdated items in every tracked project. Projects with
    /// conflicts are skipped.
    #[arg(long)]
    pub all_projects: bool,

    /// Report what would be updated without writing.
    #[arg(long, requires = "all_projects")]
    pub dry_run: bool,

    /// Leave remote projects out.
    #[arg(long, requires = "all_projects")]
    pub no_remote: bool,
}

impl UpdateArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let mut warden = ctx.open_locked()?;
        let Some(project) = self.project.clone() else {
            let include_remote = if self.no_remote { Some(false) } else { None };
            let report = warden
                .update_all_projects(self.dry_run, include_remote)
                .context("update of all projects failed")?;
            print_update_all(&report);
            return Ok(());
        };

        let policy = if self.force || self.yes {
            ConflictPolicy::Force
        } else {
            ConflictPolicy::AskCaller
        };
        let request = UpdateRequest {
            target: self.target.clone(),
            all_outdated: self.all || (self.rules.is_empty() && self.commands.is_empty()),
            rules: self.rules.clone(),
            commands: self.commands.clone(),
            policy,
        };
        let report = warden
            .update_items(&project, &request)
            .with_context(|| format!("update of '{project}' failed"))?;
        print_update(&report);

        if !report.awaiting_confirmation.is_empty() {
            confirm_conflicts(&mut warden, &project, &report)?;
        }
        Ok(())
    }
}

/// Prompt for each held-back conflict and force the confirmed ones.
/// Declined conflicts are listed as skipped.
fn confirm_conflicts(warden: &mut Warden, project: &str, report: &UpdateReport) -> Result<()> {
    let (confirmed, declined) = split_conflicts(&report.awaiting_confirmation, confirm)?;
    for item in &declined {
        println!("    - {item} skipped: conflict not confirmed");
    }
    for request in confirmed.values() {
        let forced = warden
            .update_items(project, request)
            .with_context(|| format!("update of '{project}' failed"))?;
        print_update(&forced);
    }
    Ok(())
}

/// Ask `decide` about each conflict. Confirmed items come back as one forced
/// request per target; declined ones as plain references.
fn split_conflicts(
    conflicts: &[ItemStatus],
    mut decide: impl FnMut(&str) -> Result<bool>,
) -> Result<(BTreeMap<String, UpdateRequest>, Vec<ItemRef>)> {
    let mut confirmed: BTreeMap<String, UpdateRequest> = BTreeMap::new();
    let mut declined = Vec::new();
    for item in conflicts {
        let question = format!(
            "{} '{}' on {} changed at the source and was edited locally. Overwrite?",
            item.kind, item.name, item.target
        );
        if !decide(&question)? {
            declined.push(ItemRef::from(item));
            continue;
        }
        let request = confirmed.entry(item.target.clone()).or_insert_with(|| UpdateRequest {
            target: Some(item.target.clone()),
            policy: ConflictPolicy::Force,
            ..UpdateRequest::default()
        });
        match item.kind {
            ArtifactKind::Rule => request.rules.push(item.name.clone()),
            ArtifactKind::Command => request.commands.push(item.name.clone()),
        }
    }
    Ok((confirmed, declined))
}

fn print_update(report: &UpdateReport) {
    if report.is_empty() {
        println!("{}: everything up to date", report.project.bold());
        return;
    }
    if !report.updated.is_empty() {
        println!(
            "{} {}: updated {}",
            "✓".green().bold(),
            report.project.bold(),
            plural(report.updated.len(), "item")
        );
        for item in &report.updated {
            println!("    ~ {item}");
        }
    }
    for skipped in &report.skipped {
        println!("    - {} skipped: {}", skipped.item, skipped.reason);
    }
    print_errors(&report.errors);
}

fn print_update_all(report: &UpdateAllReport) {
    for updated in &report.updated {
        print_update(updated);
    }
    for pending in &report.would_update {
        println!("{}: would update {}", pending.project.bold(), plural(pending.items.len(), "item"));
        for item in &pending.items {
            println!("    ~ {item}");
        }
    }
    for skipped in &report.skipped_conflicts {
        println!(
            "{} {}: skipped, {} (run `warden update {}`)",
            "!".yellow().bold(),
            skipped.project.bold(),
            plural(skipped.items.len(), "conflict"),
            skipped.project
        );
    }
    if !report.skipped_uptodate.is_empty() {
        println!("Up to date: {}", report.skipped_uptodate.join(", "));
    }
    if !report.skipped_remote.is_empty() {
        println!("Remote, not checked: {}", report.skipped_remote.join(", "));
    }
    for error in &report.errors {
        println!("{} {error}", "✗".red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_sync::Classification;

    fn conflict(name: &str, kind: ArtifactKind, target: &str) -> ItemStatus {
        ItemStatus {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            classification: Classification::Conflict,
            source: None,
            dest: format!(".{target}/rules/{name}.md"),
            stored_checksum: Some("a".into()),
            source_checksum: Some("b".into()),
            installed_checksum: Some("c".into()),
        }
    }

    #[test]
    fn confirmed_conflicts_become_forced_requests_per_target() {
        let conflicts = [
            conflict("style", ArtifactKind::Rule, "claude"),
            conflict("review", ArtifactKind::Command, "claude"),
            conflict("style", ArtifactKind::Rule, "cursor"),
        ];
        let (confirmed, declined) = split_conflicts(&conflicts, |_| Ok(true)).unwrap();

        assert!(declined.is_empty());
        assert_eq!(confirmed.len(), 2);
        let claude = &confirmed["claude"];
        assert_eq!(claude.target.as_deref(), Some("claude"));
        assert_eq!(claude.policy, ConflictPolicy::Force);
        assert_eq!(claude.rules, vec!["style".to_string()]);
        assert_eq!(claude.commands, vec!["review".to_string()]);
        assert!(!claude.all_outdated);
        assert_eq!(confirmed["cursor"].rules, vec!["style".to_string()]);
    }

    #[test]
    fn declined_conflicts_are_kept_as_skipped() {
        let conflicts = [
            conflict("style", ArtifactKind::Rule, "claude"),
            conflict("naming", ArtifactKind::Rule, "claude"),
        ];
        let mut asked = Vec::new();
        let (confirmed, declined) = split_conflicts(&conflicts, |question| {
            asked.push(question.to_string());
            Ok(question.contains("'naming'"))
        })
        .unwrap();

        assert_eq!(asked.len(), 2);
        assert!(asked[0].ends_with("Overwrite?"));
        assert_eq!(declined, vec![ItemRef::new("style", ArtifactKind::Rule, "claude")]);
        assert_eq!(confirmed["claude"].rules, vec!["naming".to_string()]);
    }

    #[test]
    fn prompt_failure_stops_the_split() {
        let conflicts = [conflict("style", ArtifactKind::Rule, "claude")];
        let result = split_conflicts(&conflicts, |_| anyhow::bail!("terminal went away"));
        assert!(result.is_err());
    }
}

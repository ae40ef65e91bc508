//! Three-way checksum reconciliation.
//!
//! Each installed item is judged from three digests: the one recorded at
//! install time, the one the source prepares to now, and the one found at the
//! destination now.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use warden_core::ArtifactKind;

/// Drift classification of one installed item on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    UpToDate,
    /// Source changed, destination untouched: safe to update.
    Outdated,
    /// Destination edited, source unchanged.
    UserModified,
    /// Both changed independently.
    Conflict,
    /// The source artifact is gone (or was never recorded).
    MissingSource,
    /// The destination file is gone.
    MissingInstalled,
}

impl Classification {
    /// Whether status output should mention this item.
    pub fn is_finding(self) -> bool {
        !matches!(self, Classification::UpToDate)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::UpToDate => "up-to-date",
            Classification::Outdated => "outdated",
            Classification::UserModified => "user-modified",
            Classification::Conflict => "conflict",
            Classification::MissingSource => "missing-source",
            Classification::MissingInstalled => "missing-installed",
        };
        f.write_str(label)
    }
}

/// Classify from the three observations. `None` for `source_now` or
/// `installed_now` means the file does not exist; those checks run before
/// the checksum comparison. A missing `stored` digest (legacy ledger) never
/// equals anything.
pub fn classify(
    stored: Option<&str>,
    source_now: Option<&str>,
    installed_now: Option<&str>,
) -> Classification {
    let Some(source_now) = source_now else {
        return Classification::MissingSource;
    };
    let Some(installed_now) = installed_now else {
        return Classification::MissingInstalled;
    };
    let source_changed = stored != Some(source_now);
    let installed_changed = stored != Some(installed_now);
    match (source_changed, installed_changed) {
        (false, false) => Classification::UpToDate,
        (true, false) => Classification::Outdated,
        (false, true) => Classification::UserModified,
        (true, true) => Classification::Conflict,
    }
}

/// Reconciliation result for one item on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStatus {
    pub name: String,
    pub kind: ArtifactKind,
    pub target: String,
    pub classification: Classification,
    pub source: Option<PathBuf>,
    /// Destination path relative to the project root.
    pub dest: String,
    pub stored_checksum: Option<String>,
    pub source_checksum: Option<String>,
    pub installed_checksum: Option<String>,
}

/// A per-item failure that did not stop the rest of the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub name: String,
    pub target: String,
    pub message: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' on target '{}': {}", self.name, self.target, self.message)
    }
}

/// Every item of one project, classified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub project: String,
    pub items: Vec<ItemStatus>,
    pub errors: Vec<ItemError>,
}

impl ProjectStatus {
    pub fn with(&self, classification: Classification) -> impl Iterator<Item = &ItemStatus> {
        self.items
            .iter()
            .filter(move |item| item.classification == classification)
    }

    pub fn outdated(&self) -> impl Iterator<Item = &ItemStatus> {
        self.with(Classification::Outdated)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &ItemStatus> {
        self.with(Classification::Conflict)
    }

    pub fn user_modified(&self) -> impl Iterator<Item = &ItemStatus> {
        self.with(Classification::UserModified)
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.with(classification).count()
    }

    /// Whether anything needs attention. User modifications alone do not
    /// count: they are deliberate and nothing can be pulled for them.
    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty()
            || self.items.iter().any(|item| {
                item.classification.is_finding()
                    && item.classification != Classification::UserModified
            })
    }

    /// Lookup by recorded name and kind, optionally restricted to a target.
    pub fn find(&self, kind: ArtifactKind, name: &str, target: Option<&str>) -> Vec<&ItemStatus> {
        self.items
            .iter()
            .filter(|item| item.kind == kind && item.name == name)
            .filter(|item| target.map(|t| t == item.target).unwrap_or(true))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const H1: &str = "h1";
    const H2: &str = "h2";
    const H3: &str = "h3";

    #[rstest]
    #[case(Some(H1), Some(H1), Classification::UpToDate)]
    #[case(Some(H2), Some(H1), Classification::Outdated)]
    #[case(Some(H1), Some(H3), Classification::UserModified)]
    #[case(Some(H2), Some(H3), Classification::Conflict)]
    #[case(None, Some(H1), Classification::MissingSource)]
    #[case(None, None, Classification::MissingSource)]
    #[case(Some(H2), None, Classification::MissingInstalled)]
    #[case(Some(H1), None, Classification::MissingInstalled)]
    fn classification_table(
        #[case] source_now: Option<&str>,
        #[case] installed_now: Option<&str>,
        #[case] expected: Classification,
    ) {
        assert_eq!(classify(Some(H1), source_now, installed_now), expected);
    }

    #[test]
    fn legacy_item_without_checksum_is_a_conflict() {
        assert_eq!(classify(None, Some(H1), Some(H1)), Classification::Conflict);
    }

    #[test]
    fn user_modifications_alone_are_not_findings() {
        let item = |classification| ItemStatus {
            name: "style".into(),
            kind: ArtifactKind::Rule,
            target: "claude".into(),
            classification,
            source: None,
            dest: ".claude/rules/style.md".into(),
            stored_checksum: None,
            source_checksum: None,
            installed_checksum: None,
        };
        let mut status = ProjectStatus {
            project: "api".into(),
            items: vec![item(Classification::UpToDate), item(Classification::UserModified)],
            errors: vec![],
        };
        assert!(!status.has_findings());
        status.items.push(item(Classification::MissingInstalled));
        assert!(status.has_findings());
        assert_eq!(status.count(Classification::UserModified), 1);
    }
}

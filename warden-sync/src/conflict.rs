//! Conflict policy.
//!
//! The engine never asks questions. Callers pick a policy up front; with
//! [`ConflictPolicy::AskCaller`] conflicting items come back in the report as
//! awaiting confirmation, and the caller re-runs the update with
//! [`ConflictPolicy::Force`] for whichever names the user confirmed.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Overwrite conflicting destinations.
    Force,
    /// Leave conflicting destinations alone and report them skipped.
    #[default]
    Skip,
    /// Leave them alone and report them as needing the caller's decision.
    AskCaller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Proceed,
    Skip,
}

pub fn resolve_conflict(policy: ConflictPolicy) -> Resolution {
    match policy {
        ConflictPolicy::Force => Resolution::Proceed,
        ConflictPolicy::Skip | ConflictPolicy::AskCaller => Resolution::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_force_overwrites() {
        assert_eq!(resolve_conflict(ConflictPolicy::Force), Resolution::Proceed);
        assert_eq!(resolve_conflict(ConflictPolicy::Skip), Resolution::Skip);
        assert_eq!(resolve_conflict(ConflictPolicy::AskCaller), Resolution::Skip);
    }
}

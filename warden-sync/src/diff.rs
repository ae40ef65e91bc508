//! Unified diffs between installed and current artifact content.

use similar::TextDiff;

/// Unified diff from `installed` to `current`, headed `installed/<name>` and
/// `current/<name>`. Empty when the two are identical.
pub fn unified(name: &str, installed: &str, current: &str) -> String {
    if installed == current {
        return String::new();
    }
    TextDiff::from_lines(installed, current)
        .unified_diff()
        .context_radius(3)
        .header(&format!("installed/{name}"), &format!("current/{name}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_has_no_diff() {
        assert_eq!(unified("style", "a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn changed_lines_are_marked() {
        let diff = unified("style", "keep\nold\n", "keep\nnew\n");
        assert!(diff.starts_with("--- installed/style\n+++ current/style\n"));
        assert!(diff.contains("-old\n"));
        assert!(diff.contains("+new\n"));
        assert!(diff.contains(" keep\n"));
    }
}

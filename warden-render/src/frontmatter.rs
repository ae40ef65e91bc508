//! YAML frontmatter splitting.

use serde_yaml::{Mapping, Value};

const DELIMITER: &str = "---";

/// Split `content` into its frontmatter mapping and body.
///
/// Frontmatter exists only when the first line is `---` and a later line
/// closes it. Unparseable or non-mapping YAML yields an empty mapping. Blank
/// lines between the closing delimiter and the body are dropped. Without
/// frontmatter the whole content is the body.
pub fn parse_frontmatter(content: &str) -> (Mapping, String) {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.first().map(|l| l.trim()) != Some(DELIMITER) {
        return (Mapping::new(), content.to_string());
    }
    let Some(close) = lines
        .iter()
        .skip(1)
        .position(|l| l.trim() == DELIMITER)
        .map(|i| i + 1)
    else {
        return (Mapping::new(), content.to_string());
    };

    let yaml = lines[1..close].join("\n");
    let mapping = match serde_yaml::from_str::<Value>(&yaml) {
        Ok(Value::Mapping(m)) => m,
        _ => Mapping::new(),
    };

    let body: Vec<&str> = lines[close + 1..]
        .iter()
        .copied()
        .skip_while(|l| l.trim().is_empty())
        .collect();
    (mapping, body.join("\n"))
}

//! Per-target rule formats.
//!
//! Rules are authored in one canonical dialect (Markdown with optional YAML
//! frontmatter: `description`, `globs`, `alwaysApply`, `type`). Each target
//! gets a [`Converter`] describing how that dialect maps onto what the tool
//! reads. The registry is a plain value built by the caller once and passed
//! down; nothing here is global.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::error::RenderError;
use crate::frontmatter::parse_frontmatter;

const CANONICAL_FIELDS: &[&str] = &["description", "globs", "alwaysApply", "type"];
const CURSOR_FIELDS: &[&str] = &["description", "globs", "alwaysApply"];

/// How a converter transforms a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    /// Content is already in the target's dialect.
    Passthrough,
    /// Keep only the converter's supported frontmatter fields, in their
    /// declared order; drop the frontmatter block when none survive.
    FilteredFrontmatter,
    /// Plain Markdown with the frontmatter stripped.
    BodyOnly,
}

#[derive(Debug, Clone)]
pub struct Converter {
    pub format: RuleFormat,
    pub supported_fields: &'static [&'static str],
    pub docs_url: Option<&'static str>,
}

impl Converter {
    pub const fn passthrough(docs_url: Option<&'static str>) -> Self {
        Self {
            format: RuleFormat::Passthrough,
            supported_fields: CANONICAL_FIELDS,
            docs_url,
        }
    }

    pub fn convert(&self, content: &str) -> Result<String, RenderError> {
        if self.format == RuleFormat::Passthrough {
            return Ok(content.to_string());
        }
        let (frontmatter, body) = parse_frontmatter(content);
        match self.format {
            RuleFormat::BodyOnly => Ok(body),
            RuleFormat::FilteredFrontmatter => {
                let kept = self.filter(&frontmatter);
                if kept.is_empty() {
                    return Ok(body);
                }
                let yaml = serde_yaml::to_string(&Value::Mapping(kept))?;
                Ok(format!("---\n{yaml}---\n\n{body}"))
            }
            RuleFormat::Passthrough => Ok(content.to_string()),
        }
    }

    fn filter(&self, frontmatter: &Mapping) -> Mapping {
        let mut kept = Mapping::new();
        for field in self.supported_fields {
            if let Some(value) = frontmatter.get(*field) {
                kept.insert(Value::String((*field).to_string()), value.clone());
            }
        }
        kept
    }
}

/// Target name → rule converter. Unknown targets fall back to the canonical
/// (passthrough) converter.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: BTreeMap<String, Converter>,
    fallback: Converter,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConverterRegistry {
    /// An empty registry: every target passes rules through unchanged.
    pub fn empty() -> Self {
        Self {
            converters: BTreeMap::new(),
            fallback: Converter::passthrough(None),
        }
    }

    /// Converters for the built-in targets.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "cursor",
            Converter {
                format: RuleFormat::FilteredFrontmatter,
                supported_fields: CURSOR_FIELDS,
                docs_url: Some("https://cursor.com/docs/context/rules"),
            },
        );
        let augment = Converter::passthrough(Some("https://docs.augmentcode.com/cli/rules"));
        registry.fallback = augment.clone();
        registry.register("augment", augment);
        registry.register(
            "claude",
            Converter {
                format: RuleFormat::BodyOnly,
                supported_fields: &[],
                docs_url: Some("https://docs.anthropic.com/en/docs/claude-code/memory"),
            },
        );
        registry.register("windsurf", Converter::passthrough(None));
        registry.register("codex", Converter::passthrough(None));
        registry
    }

    pub fn register(&mut self, target: impl Into<String>, converter: Converter) {
        self.converters.insert(target.into(), converter);
    }

    pub fn get(&self, target: &str) -> &Converter {
        self.converters.get(target).unwrap_or(&self.fallback)
    }

    /// Convert canonical rule content for `target`.
    pub fn convert(&self, content: &str, target: &str) -> Result<String, RenderError> {
        self.get(target).convert(content)
    }

    pub fn docs_url(&self, target: &str) -> Option<&'static str> {
        self.get(target).docs_url
    }

    pub fn supported_fields(&self, target: &str) -> &'static [&'static str] {
        self.get(target).supported_fields
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }
}

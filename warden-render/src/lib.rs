//! # warden-render
//!
//! Pure content transforms applied before an artifact is written or hashed:
//! command templates get their placeholders substituted, and rules are
//! reshaped into each target's frontmatter dialect.
//!
//! ```rust
//! use warden_render::{process_command_template, ConverterRegistry};
//!
//! let registry = ConverterRegistry::with_defaults();
//! let rule = "---\ndescription: Style\ntype: always\n---\n\nUse tabs.\n";
//! assert_eq!(registry.convert(rule, "claude").unwrap(), "Use tabs.\n");
//!
//! let cmd = process_command_template("See {{RULES_DIR}}", "cursor", ".cursor/rules/");
//! assert_eq!(cmd, "See .cursor/rules/");
//! ```

pub mod convert;
pub mod error;
pub mod frontmatter;
pub mod template;

pub use convert::{Converter, ConverterRegistry, RuleFormat};
pub use error::RenderError;
pub use frontmatter::parse_frontmatter;
pub use template::{platform_notes, process_command_template};

//! The bytes an artifact is written as.
//!
//! Install, update, status and diff all call [`prepare`], so the checksum
//! stored at install time and the checksum recomputed later always describe
//! the same transformation of the source.

use std::path::Path;

use warden_backend::checksum;
use warden_core::{ArtifactKind, InstallMode, TargetSpec};
use warden_render::{process_command_template, ConverterRegistry};

use crate::error::{io_err, SyncError};

/// Content as it should exist at the destination, plus its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub content: Vec<u8>,
    pub checksum: String,
}

impl Prepared {
    fn new(content: Vec<u8>) -> Self {
        let checksum = checksum::digest(&content);
        Self { content, checksum }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Produce the destination content for one artifact.
///
/// Copy mode runs commands through the template placeholders and rules
/// through the target's converter. Symlink mode leaves the source untouched,
/// since the destination is the source.
pub fn prepare(
    kind: ArtifactKind,
    source: &Path,
    target_name: &str,
    target: &TargetSpec,
    mode: InstallMode,
    registry: &ConverterRegistry,
) -> Result<Prepared, SyncError> {
    if !mode.is_copy() {
        let raw = std::fs::read(source).map_err(|e| io_err(source, e))?;
        return Ok(Prepared::new(raw));
    }
    let raw = std::fs::read_to_string(source).map_err(|e| io_err(source, e))?;
    let processed = match kind {
        ArtifactKind::Command => process_command_template(&raw, target_name, &target.rules_path),
        ArtifactKind::Rule => registry.convert(&raw, target_name)?,
    };
    Ok(Prepared::new(processed.into_bytes()))
}

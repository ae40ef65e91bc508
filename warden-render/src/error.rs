//! Error types for warden-render.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Re-emitting converted frontmatter failed.
    #[error("frontmatter serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

//! Structured errors surfaced by the renderer.

use thiserror::Error;

/// Everything that can go wrong while setting up or feeding the renderer.
///
/// Initialization errors abort startup. Validation errors leave the
/// offending object unregistered and can be fixed and retried by the caller.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer initialization failed: {0}")]
    Initialization(String),

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("asset error: {0}")]
    Asset(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl RenderError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

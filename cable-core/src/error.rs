// ABOUTME: Typed outcomes of converting between platform events and canonical updates
// ABOUTME: Distinguishes expected "ignore this" paths from updates an adapter cannot render

use thiserror::Error;

/// Why an event or update was not converted. Either way exactly one update is
/// dropped and the pump keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Expected, frequent path: own bot's message, another room, non-chat event
    #[error("ignoring update: {0}")]
    Ignored(String),

    /// The update is valid but this adapter has no representation for it
    #[error("unsupported update: {0}")]
    Unsupported(String),
}

impl ConversionError {
    pub fn ignored(reason: impl Into<String>) -> Self {
        ConversionError::Ignored(reason.into())
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        ConversionError::Unsupported(reason.into())
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, ConversionError::Ignored(_))
    }
}

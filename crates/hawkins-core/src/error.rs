use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure stored in the media controller's result slot.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum MediaError {
    /// A required input was missing; no call was made.
    #[error("{0}")]
    Validation(String),

    #[error("Connection to the void failed: {0}")]
    Transport(String),

    /// The credential was rejected; the caller should prompt for a new one.
    #[error("Credential rejected, select an API key and retry: {0}")]
    Credential(String),
}

impl MediaError {
    pub fn is_credential(&self) -> bool {
        matches!(self, MediaError::Credential(_))
    }
}

/// Rejections returned directly from a controller entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A request is already in flight")]
    Busy,
}

use hawkins_core::MediaError;
use thiserror::Error;

/// Failure signature the service uses when the selected credential no longer resolves.
const ENTITY_NOT_FOUND: &str = "entity was not found";

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// Request URLs carry the API key as a query parameter; drop them from the error.
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::Http(err.without_url())
    }
}

impl LLMError {
    /// True for rejected keys and for the "entity was not found" signature.
    pub fn is_credential_failure(&self) -> bool {
        match self {
            LLMError::Auth(_) => true,
            other => other
                .to_string()
                .to_ascii_lowercase()
                .contains(ENTITY_NOT_FOUND),
        }
    }

    /// Map into the controller-facing taxonomy.
    pub fn to_media_error(&self) -> MediaError {
        if self.is_credential_failure() {
            MediaError::Credential(self.to_string())
        } else {
            MediaError::Transport(self.to_string())
        }
    }
}

//! hawkins-core - Core types shared by the Hawkins controllers
//!
//! - `chat` - ChatMessage, Role, CapabilityMode, chat phases and events
//! - `media` - MediaKind, per-kind params, attachments, results
//! - `config` - layered configuration (file, then environment)
//! - `error` - validation and media failure taxonomy

pub mod chat;
pub mod config;
pub mod error;
pub mod media;

pub use chat::{CapabilityMode, ChatEvent, ChatMessage, ChatPhase, Role};
pub use config::{Config, ModelConfig};
pub use error::{ControllerError, MediaError};
pub use media::{
    Attachment, ImageArtifact, ImageAspectRatio, ImageSize, MediaInputs, MediaKind, MediaParams,
    MediaResult, ParseParamError, VideoArtifact, VideoAspectRatio, VideoResolution,
};

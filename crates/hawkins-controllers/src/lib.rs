//! Client-side controllers over the Generation Service.
//!
//! - [`ChatSessionController`] - streaming chat transcript with capability modes
//! - [`MediaRequestController`] - one-at-a-time image/video/edit/analyze requests
//! - [`IdeaCritic`] - one-shot project idea critique

pub mod chat;
pub mod critique;
pub mod media;

pub use chat::{ChatFailure, ChatSessionController, SendOutcome};
pub use critique::{IdeaCritic, SILENT_VOID, UNSTABLE_RIFT};
pub use media::{loading_message, MediaRequestController, DEFAULT_POLL_INTERVAL, VOID_RESISTED};

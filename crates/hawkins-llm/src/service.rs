use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hawkins_core::{
    Attachment, CapabilityMode, ImageArtifact, ImageAspectRatio, ImageSize, VideoAspectRatio,
    VideoResolution,
};

use crate::error::Result;
use crate::prompts::{IMAGE_STYLE_SUFFIX, VIDEO_STYLE_SUFFIX};
use crate::types::LLMStream;

/// One conversational session bound to a capability mode.
///
/// The session owns its history; a completed exchange is recorded so the next
/// send carries the conversation.
#[async_trait]
pub trait ChatSession: Send + Sync {
    fn mode(&self) -> CapabilityMode;

    async fn send_message_stream(&self, text: &str) -> Result<LLMStream>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub style_suffix: &'static str,
    pub size: ImageSize,
    pub aspect_ratio: ImageAspectRatio,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, size: ImageSize, aspect_ratio: ImageAspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            style_suffix: IMAGE_STYLE_SUFFIX,
            size,
            aspect_ratio,
        }
    }

    /// The text actually transmitted.
    pub fn full_prompt(&self) -> String {
        format!("{}{}", self.prompt, self.style_suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub prompt: String,
    pub style_suffix: &'static str,
    pub aspect_ratio: VideoAspectRatio,
    pub resolution: VideoResolution,
}

impl VideoRequest {
    pub fn new(
        prompt: impl Into<String>,
        aspect_ratio: VideoAspectRatio,
        resolution: VideoResolution,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            style_suffix: VIDEO_STYLE_SUFFIX,
            aspect_ratio,
            resolution,
        }
    }

    pub fn full_prompt(&self) -> String {
        format!("{}{}", self.prompt, self.style_suffix)
    }
}

/// Handle to a long-running video generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    pub name: String,
    pub done: bool,
    pub result_uri: Option<String>,
}

/// The external generative-AI API.
#[async_trait]
pub trait GenerationService: Send + Sync {
    fn create_session(&self, mode: CapabilityMode) -> Arc<dyn ChatSession>;

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImageArtifact>>;

    async fn generate_video_op(&self, request: &VideoRequest) -> Result<VideoOperation>;

    async fn poll_operation(&self, operation: &VideoOperation) -> Result<VideoOperation>;

    /// Download the artifact a finished operation points at.
    async fn fetch_video(&self, uri: &str) -> Result<Bytes>;

    async fn edit_image(&self, image: &Attachment, prompt: &str) -> Result<Option<ImageArtifact>>;

    async fn analyze_media(
        &self,
        media: &Attachment,
        prompt: &str,
        thinking_enabled: bool,
    ) -> Result<String>;

    async fn critique_text(&self, prompt: &str) -> Result<String>;
}

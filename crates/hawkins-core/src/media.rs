//! Media request kinds, their parameters, attachments and results.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::MediaError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {what}: {value}")]
pub struct ParseParamError {
    pub what: &'static str,
    pub value: String,
}

impl ParseParamError {
    fn new(what: &'static str, value: impl Into<String>) -> Self {
        Self {
            what,
            value: value.into(),
        }
    }
}

/// Declares a fieldless enum whose variants map one-to-one onto wire strings.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal, default = $default:ident, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseParamError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| ParseParamError::new($what, s))
            }
        }
    };
}

wire_enum!(
    /// The four mutually exclusive media operations (tabs).
    MediaKind, "media kind", default = Generate, {
        Generate => "generate",
        Video => "video",
        Edit => "edit",
        Analyze => "analyze",
    }
);

wire_enum!(ImageSize, "image size", default = OneK, {
    OneK => "1K",
    TwoK => "2K",
    FourK => "4K",
});

wire_enum!(ImageAspectRatio, "image aspect ratio", default = Wide, {
    Square => "1:1",
    Portrait2x3 => "2:3",
    Landscape3x2 => "3:2",
    Portrait3x4 => "3:4",
    Landscape4x3 => "4:3",
    Tall => "9:16",
    Wide => "16:9",
    UltraWide => "21:9",
});

wire_enum!(VideoResolution, "video resolution", default = P720, {
    P720 => "720p",
    P1080 => "1080p",
});

wire_enum!(VideoAspectRatio, "video aspect ratio", default = Landscape, {
    Landscape => "16:9",
    Portrait => "9:16",
});

/// Parameters accepted by each media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaParams {
    Generate {
        size: ImageSize,
        aspect_ratio: ImageAspectRatio,
    },
    Video {
        resolution: VideoResolution,
        aspect_ratio: VideoAspectRatio,
    },
    Edit,
    Analyze {
        thinking_enabled: bool,
    },
}

impl MediaParams {
    pub fn defaults_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Generate => MediaParams::Generate {
                size: ImageSize::default(),
                aspect_ratio: ImageAspectRatio::default(),
            },
            MediaKind::Video => MediaParams::Video {
                resolution: VideoResolution::default(),
                aspect_ratio: VideoAspectRatio::default(),
            },
            MediaKind::Edit => MediaParams::Edit,
            MediaKind::Analyze => MediaParams::Analyze {
                thinking_enabled: true,
            },
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaParams::Generate { .. } => MediaKind::Generate,
            MediaParams::Video { .. } => MediaKind::Video,
            MediaParams::Edit => MediaKind::Edit,
            MediaParams::Analyze { .. } => MediaKind::Analyze,
        }
    }
}

/// An uploaded binary (image or video).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI, as produced by a browser file reader.
    pub fn from_data_uri(uri: &str) -> Result<Self, ParseParamError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| ParseParamError::new("data uri", truncate(uri)))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ParseParamError::new("data uri", truncate(uri)))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ParseParamError::new("data uri encoding", header))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ParseParamError::new("data uri payload", e.to_string()))?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(32).collect()
}

/// Everything the caller supplies for one `execute`.
#[derive(Debug, Clone, Default)]
pub struct MediaInputs {
    pub prompt: String,
    pub attachment: Option<Attachment>,
    /// Falls back to the active kind's defaults when absent.
    pub params: Option<MediaParams>,
}

impl MediaInputs {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_params(mut self, params: MediaParams) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
}

impl ImageArtifact {
    pub fn from_base64(mime_type: &str, data: &str) -> Self {
        Self {
            data_uri: format!("data:{mime_type};base64,{data}"),
        }
    }

    pub fn decode(&self) -> Result<Attachment, ParseParamError> {
        Attachment::from_data_uri(&self.data_uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    /// Download location reported by the finished operation.
    pub uri: String,
    pub bytes: Bytes,
}

/// The single value shown in the result pane.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaResult {
    Image(ImageArtifact),
    Video(VideoArtifact),
    Text(String),
    Error(MediaError),
}

impl MediaResult {
    pub fn image(&self) -> Option<&ImageArtifact> {
        match self {
            MediaResult::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn video(&self) -> Option<&VideoArtifact> {
        match self {
            MediaResult::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            MediaResult::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&MediaError> {
        match self {
            MediaResult::Error(err) => Some(err),
            _ => None,
        }
    }
}

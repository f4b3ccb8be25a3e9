use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Greeting shown before the first exchange.
pub const GREETING: &str =
    "Do you copy? This is Hawkins Radio. How can I assist you with DevClash?";

/// Model line appended when an exchange fails.
pub const SIGNAL_LOST: &str = "*Static noise* Signal lost. Please try again.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Selects the model variant used for the next chat session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityMode {
    #[default]
    Fast,
    DeepThink,
}

impl CapabilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityMode::Fast => "fast",
            CapabilityMode::DeepThink => "deepThink",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            CapabilityMode::Fast => CapabilityMode::DeepThink,
            CapabilityMode::DeepThink => CapabilityMode::Fast,
        }
    }
}

impl fmt::Display for CapabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(CapabilityMode::Fast),
            "deepthink" | "deep-think" | "deep" => Ok(CapabilityMode::DeepThink),
            other => Err(format!("unknown capability mode: {other}")),
        }
    }
}

/// Where the chat controller is in its request/response cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    Idle,
    Sending,
    Streaming,
    /// Transient: an exchange failed and the fallback line is being written.
    Error,
}

impl ChatPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, ChatPhase::Idle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageAppended {
        message: ChatMessage,
    },

    /// One streamed fragment, already applied to `message_id`.
    Fragment {
        message_id: String,
        text: String,
    },

    PhaseChanged {
        phase: ChatPhase,
    },

    /// The current session was replaced.
    SessionReplaced {
        mode: CapabilityMode,
        version: u64,
    },
}

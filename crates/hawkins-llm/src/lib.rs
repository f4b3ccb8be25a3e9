pub mod credential;
pub mod error;
pub mod gemini;
pub mod prompts;
pub mod service;
pub mod sse;
pub mod types;

pub use credential::{ensure_credential, ConfigCredentialGate, CredentialGate, CredentialStatus};
pub use error::{LLMError, Result};
pub use gemini::{GeminiChatSession, GeminiService};
pub use service::{ChatSession, GenerationService, ImageRequest, VideoOperation, VideoRequest};
pub use types::{LLMChunk, LLMStream};

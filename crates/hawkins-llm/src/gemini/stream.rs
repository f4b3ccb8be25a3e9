//! Gemini SSE event parser.
//!
//! With `alt=sse` each event carries one partial `GenerateContentResponse`:
//! ```text
//! data: {"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}
//! ```

use serde_json::Value;

use super::protocol::GenerateContentResponse;
use crate::error::{LLMError, Result};
use crate::types::LLMChunk;

/// Parse one SSE data payload.
///
/// Returns `Ok(Some(Token))` for visible text, `Ok(Some(Done))` for `[DONE]`,
/// `Ok(None)` for events with nothing to show, and `Err` for error payloads or
/// malformed JSON.
pub fn parse_gemini_sse_event(data: &str) -> Result<Option<LLMChunk>> {
    let data = data.trim();

    if data.is_empty() {
        return Ok(None);
    }

    if data == "[DONE]" {
        return Ok(Some(LLMChunk::Done));
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| LLMError::Stream(format!("Failed to parse Gemini SSE data: {}: {}", e, data)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown Gemini API error");
        return Err(LLMError::Api(message.to_string()));
    }

    if value.get("candidates").is_none() {
        return Err(LLMError::Stream(format!(
            "Missing candidates in Gemini response: {}",
            data
        )));
    }

    let response: GenerateContentResponse = serde_json::from_value(value)?;
    let text = response.text();
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(LLMChunk::Token(text)))
}

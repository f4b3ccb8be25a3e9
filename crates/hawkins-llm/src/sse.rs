//! SSE response -> [`LLMStream`] adapter.

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use reqwest::Response;

use crate::error::{LLMError, Result};
use crate::types::{LLMChunk, LLMStream};

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` gets each event's data payload and returns `Ok(Some(chunk))` to emit,
/// `Ok(None)` to skip, or `Err(_)`, which is emitted as `LLMError::Stream`.
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str) -> Result<Option<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| {
            let event = event.map_err(|e| match e {
                EventStreamError::Transport(err) => LLMError::from(err),
                other => LLMError::Stream(other.to_string()),
            })?;
            handler(event.data.as_str()).map_err(|err| match err {
                LLMError::Stream(msg) => LLMError::Stream(msg),
                other => LLMError::Stream(other.to_string()),
            })
        })
        .filter_map(|result| async move { result.transpose() });

    Box::pin(stream)
}

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LLMChunk {
    /// One text fragment, in arrival order.
    Token(String),
    Done,
}

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

//! Transport traits for both wire protocols, plus their JSON codecs.

pub mod openai;
pub mod openai_responses;
pub mod sse;

pub use sse::{decode_sse, parse_sse_data};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::adapter::{ChatMessage, ResponseInputItem};
use crate::error::Result;
use crate::types::{
    ChatCompletion, ChatStreamChunk, CompletionOptions, ResponseResult, ResponseStreamUpdate,
};

/// A request for the chat-completion protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

/// A request for the response protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRequest {
    pub model: String,
    pub input: Vec<ResponseInputItem>,
    pub options: CompletionOptions,
}

/// Transport for the incremental chat-completion protocol.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Single round trip.
    async fn complete_chat(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Open a stream of incremental updates.
    async fn stream_chat(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<ChatStreamChunk>>>;
}

/// Transport for the item-based response protocol.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseResult>;

    async fn stream_response(
        &self,
        request: &ResponseRequest,
    ) -> Result<BoxStream<'static, Result<ResponseStreamUpdate>>>;
}

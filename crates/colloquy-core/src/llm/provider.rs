//! ChatModel trait definition.
//!
//! This is the abstraction every model adapter implements.
//! Uses RPITIT for `complete`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxChatModel wrapper).

use std::pin::Pin;

use futures_util::Stream;

use colloquy_types::llm::{ChatRequest, ChatResponse, LlmError, StreamEvent};

/// A boxed, sendable stream of model events.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for chat model backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition) for
/// `complete`. The `stream` method returns a boxed stream because streams
/// need to be object-safe for `BoxChatModel`.
///
/// Implementations live in colloquy-infra (e.g., `OpenAiCompatibleProvider`).
pub trait ChatModel: Send + Sync {
    /// Label used in logs (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and receive the full response.
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl std::future::Future<Output = Result<ChatResponse, LlmError>> + Send;

    /// Send a streaming request. Returns a stream of events.
    fn stream(&self, request: ChatRequest) -> ModelStream;
}

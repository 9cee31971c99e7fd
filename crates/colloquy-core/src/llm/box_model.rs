//! BoxChatModel -- object-safe dynamic dispatch wrapper for ChatModel.
//!
//! 1. Define an object-safe `ChatModelDyn` trait with boxed futures
//! 2. Blanket-impl `ChatModelDyn` for all `T: ChatModel`
//! 3. `BoxChatModel` wraps `Arc<dyn ChatModelDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use colloquy_types::llm::{ChatRequest, ChatResponse, LlmError};

use super::provider::{ChatModel, ModelStream};

/// Object-safe version of [`ChatModel`] with boxed futures.
pub trait ChatModelDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>>;

    fn stream_boxed(&self, request: ChatRequest) -> ModelStream;
}

impl<T: ChatModel> ChatModelDyn for T {
    fn name(&self) -> &str {
        ChatModel::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }

    fn stream_boxed(&self, request: ChatRequest) -> ModelStream {
        self.stream(request)
    }
}

/// Type-erased chat model for runtime model selection.
///
/// Cloning is cheap; clones share the same underlying model, so a resolved
/// model can be moved into a spawned turn.
#[derive(Clone)]
pub struct BoxChatModel {
    inner: Arc<dyn ChatModelDyn>,
}

impl BoxChatModel {
    pub fn new<T: ChatModel + 'static>(model: T) -> Self {
        Self {
            inner: Arc::new(model),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }

    pub fn stream(&self, request: ChatRequest) -> ModelStream {
        self.inner.stream_boxed(request)
    }
}

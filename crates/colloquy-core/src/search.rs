//! Web search port.
//!
//! `WebSearch` is implemented in colloquy-infra (e.g., `TavilySearch`).
//! `BoxWebSearch` follows the same blanket-impl pattern as `BoxChatModel`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use colloquy_types::search::{SearchError, SearchResults};

/// Retrieves passages relevant to a query.
pub trait WebSearch: Send + Sync {
    fn retrieve_chunks(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<SearchResults, SearchError>> + Send;
}

/// Object-safe version of [`WebSearch`].
pub trait WebSearchDyn: Send + Sync {
    fn retrieve_chunks_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResults, SearchError>> + Send + 'a>>;
}

impl<T: WebSearch> WebSearchDyn for T {
    fn retrieve_chunks_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResults, SearchError>> + Send + 'a>> {
        Box::pin(self.retrieve_chunks(query))
    }
}

/// Type-erased web search capability.
#[derive(Clone)]
pub struct BoxWebSearch {
    inner: Arc<dyn WebSearchDyn>,
}

impl BoxWebSearch {
    pub fn new<T: WebSearch + 'static>(search: T) -> Self {
        Self {
            inner: Arc::new(search),
        }
    }

    pub async fn retrieve_chunks(&self, query: &str) -> Result<SearchResults, SearchError> {
        self.inner.retrieve_chunks_boxed(query).await
    }
}

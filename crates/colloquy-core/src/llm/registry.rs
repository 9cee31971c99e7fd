//! Model registry for runtime model lookup.
//!
//! Models are keyed by `(provider, model)`. Entries are either registered
//! up front or built on first use by a [`ModelFactory`].

use dashmap::DashMap;
use tracing::debug;

use super::box_model::BoxChatModel;

/// Builds a model for a `(provider, model)` pair on demand.
///
/// Returns `None` when the provider is unknown.
pub trait ModelFactory: Send + Sync {
    fn build(&self, provider: &str, model: &str) -> Option<BoxChatModel>;
}

/// Registry of chat models, indexed by provider and model name.
pub struct ModelRegistry {
    models: DashMap<(String, String), BoxChatModel>,
    factory: Option<Box<dyn ModelFactory>>,
}

impl ModelRegistry {
    /// Create an empty registry with no factory.
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            factory: None,
        }
    }

    /// Create a registry that builds missing models with `factory`.
    pub fn with_factory(factory: impl ModelFactory + 'static) -> Self {
        Self {
            models: DashMap::new(),
            factory: Some(Box::new(factory)),
        }
    }

    /// Register a model. Replaces any existing entry for the same pair.
    pub fn register(
        &self,
        provider: impl Into<String>,
        model: impl Into<String>,
        chat_model: BoxChatModel,
    ) {
        self.models.insert((provider.into(), model.into()), chat_model);
    }

    /// Resolve a model, building and caching it through the factory if needed.
    pub fn resolve(&self, provider: &str, model: &str) -> Option<BoxChatModel> {
        let key = (provider.to_string(), model.to_string());
        if let Some(found) = self.models.get(&key) {
            return Some(found.value().clone());
        }

        let built = self.factory.as_ref()?.build(provider, model)?;
        debug!(provider, model, "built chat model");
        self.models.insert(key, built.clone());
        Some(built)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

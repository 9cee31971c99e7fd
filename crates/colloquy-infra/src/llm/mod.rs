//! Chat model implementations.
//!
//! Contains the OpenAI-compatible [`ChatModel`](colloquy_core::llm::provider::ChatModel)
//! adapter and [`ProviderModelFactory`], which builds models on demand from
//! the `[[providers]]` entries of the configuration.

pub mod openai_compat;

use secrecy::SecretString;
use tracing::{debug, warn};

use colloquy_core::llm::box_model::BoxChatModel;
use colloquy_core::llm::registry::ModelFactory;
use colloquy_types::config::ProviderConfig;

use self::openai_compat::OpenAiCompatibleProvider;

/// A configured provider with its API key already resolved.
struct ResolvedProvider {
    name: String,
    base_url: String,
    api_key: Option<SecretString>,
}

/// Builds [`OpenAiCompatibleProvider`]s for configured provider names.
///
/// API keys are read from the environment once, at construction.
pub struct ProviderModelFactory {
    providers: Vec<ResolvedProvider>,
}

impl ProviderModelFactory {
    /// Resolve API keys through `std::env::var`.
    pub fn from_config(providers: &[ProviderConfig]) -> Self {
        Self::with_key_lookup(providers, |var| std::env::var(var).ok())
    }

    /// Resolve API keys through `lookup` (env var name to value).
    pub fn with_key_lookup(
        providers: &[ProviderConfig],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let providers = providers
            .iter()
            .map(|p| {
                let api_key = p.api_key_env.as_deref().and_then(|var| {
                    let key = lookup(var).filter(|k| !k.is_empty());
                    if key.is_none() {
                        warn!(provider = %p.name, env = %var, "API key environment variable not set");
                    }
                    key.map(SecretString::from)
                });
                ResolvedProvider {
                    name: p.name.clone(),
                    base_url: p.base_url.clone(),
                    api_key,
                }
            })
            .collect();
        Self { providers }
    }

    /// Configured provider names.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }
}

impl ModelFactory for ProviderModelFactory {
    fn build(&self, provider: &str, model: &str) -> Option<BoxChatModel> {
        let Some(found) = self.providers.iter().find(|p| p.name == provider) else {
            debug!(provider, "no provider configured with this name");
            return None;
        };
        let chat_model = OpenAiCompatibleProvider::new(
            found.name.clone(),
            &found.base_url,
            found.api_key.as_ref(),
            model,
        );
        Some(BoxChatModel::new(chat_model))
    }
}

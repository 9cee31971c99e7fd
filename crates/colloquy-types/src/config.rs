//! Configuration types for Colloquy.
//!
//! `ColloquyConfig` represents the top-level `config.toml` that selects the
//! storage backend, chat defaults, model providers and web search settings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level configuration.
///
/// Loaded from `{data_dir}/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColloquyConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    /// OpenAI-compatible endpoints, looked up by name.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub web_search: WebSearchConfig,
}

impl Default for ColloquyConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            chat: ChatConfig::default(),
            providers: default_providers(),
            web_search: WebSearchConfig::default(),
        }
    }
}

/// The public OpenAI endpoint, keyed by `OPENAI_API_KEY`.
fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "openai".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        api_key_env: Some("OPENAI_API_KEY".to_string()),
    }]
}

impl ColloquyConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Which session backend to use. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Database,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Database => write!(f, "database"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for session documents, relative to the data dir unless absolute.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// SQLite URL; defaults to `{data_dir}/colloquy.db`.
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_session_dir() -> String {
    "sessions".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            session_dir: default_session_dir(),
            database_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Length of the description seeded from a session's first question.
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.7
}

fn default_description_max_chars() -> usize {
    100
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            description_max_chars: default_description_max_chars(),
        }
    }
}

/// One OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    /// Environment variable holding the API key. Local servers may need none.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> u32 {
    5
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            max_results: default_max_results(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ColloquyConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.session_dir, "sessions");
        assert_eq!(config.chat.default_provider, "openai");
        assert_eq!(config.chat.default_model, "gpt-4o");
        assert_eq!(config.chat.max_tokens, 4096);
        assert_eq!(config.chat.description_max_chars, 100);
        assert_eq!(config.web_search.max_results, 5);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(
            config.provider("openai").unwrap().api_key_env.as_deref(),
            Some("OPENAI_API_KEY")
        );
    }

    #[test]
    fn test_deserialize_empty_toml() {
        let config: ColloquyConfig = toml::from_str("").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.web_search.api_key_env, "TAVILY_API_KEY");
    }

    #[test]
    fn test_deserialize_full_toml() {
        let toml_str = r#"
[storage]
backend = "database"
database_url = "sqlite:///tmp/c.db"

[chat]
default_model = "gpt-4o-mini"
temperature = 0.2

[[providers]]
name = "openai"
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"

[[providers]]
name = "local"
base_url = "http://localhost:11434/v1"
"#;
        let config: ColloquyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Database);
        assert_eq!(config.storage.session_dir, "sessions");
        assert_eq!(config.chat.default_model, "gpt-4o-mini");
        assert_eq!(config.chat.default_provider, "openai");
        assert!((config.chat.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.providers.len(), 2);
        assert!(config.provider("local").unwrap().api_key_env.is_none());
        assert!(config.provider("missing").is_none());
    }
}

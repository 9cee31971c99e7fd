//! Tavily search client.
//!
//! Posts the query to the Tavily search endpoint and maps each returned
//! result to a [`SearchChunk`].

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use colloquy_core::search::WebSearch;
use colloquy_types::config::WebSearchConfig;
use colloquy_types::search::{SearchChunk, SearchError, SearchResults};

pub const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<TavilyResponse> for SearchResults {
    fn from(response: TavilyResponse) -> Self {
        SearchResults {
            chunks: response
                .results
                .into_iter()
                .map(|r| SearchChunk {
                    title: r.title,
                    url: r.url,
                    content: r.content.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Web search backed by the Tavily API.
///
/// Does NOT derive Debug to keep the API key out of logs.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(api_key: SecretString, max_results: u32) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SearchError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoint: TAVILY_SEARCH_URL.to_string(),
            max_results,
        })
    }

    /// Build from config, reading the key from the configured env var.
    pub fn from_config(config: &WebSearchConfig) -> Result<Self, SearchError> {
        Self::from_config_with(config, |var| std::env::var(var).ok())
    }

    fn from_config_with(
        config: &WebSearchConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SearchError> {
        let key = lookup(&config.api_key_env)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SearchError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(SecretString::from(key), config.max_results)
    }

    /// Point the client at a different endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl WebSearch for TavilySearch {
    async fn retrieve_chunks(&self, query: &str) -> Result<SearchResults, SearchError> {
        let body = TavilyRequest {
            api_key: self.api_key.expose_secret(),
            query,
            max_results: self.max_results,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Deserialization(e.to_string()))?;

        let results = SearchResults::from(parsed);
        debug!(chunks = results.chunks.len(), "tavily search complete");
        Ok(results)
    }
}

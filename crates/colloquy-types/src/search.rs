//! Web search result types.

use serde::{Deserialize, Serialize};

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchChunk {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl SearchChunk {
    /// Markdown rendering used when injecting results into a prompt.
    pub fn to_markdown(&self) -> String {
        format!("[{}]({})\n{}", self.title, self.url, self.content.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub chunks: Vec<SearchChunk>,
}

impl SearchResults {
    /// Render every chunk with non-empty content, separated by rules.
    ///
    /// Returns `None` when nothing is worth injecting.
    pub fn render(&self) -> Option<String> {
        let rendered: Vec<String> = self
            .chunks
            .iter()
            .filter(|c| !c.content.trim().is_empty())
            .map(SearchChunk::to_markdown)
            .collect();
        if rendered.is_empty() {
            None
        } else {
            Some(rendered.join("\n\n------\n\n"))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("search service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid search response: {0}")]
    Deserialization(String),

    #[error("search API key missing (set {0})")]
    MissingApiKey(String),
}

//! LLM request/response types for Colloquy.
//!
//! These types model the data shapes exchanged with a chat model:
//! the request built for one turn, the non-streaming response, streaming
//! events, token usage and error handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "tool" => Ok(MessageRole::Tool),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// One prior turn as seen by the model: role and text only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Request to a chat model for one turn.
///
/// `history` holds the prior turns only; the current question travels in
/// `user_question` and is never duplicated into the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    /// Extra instruction placed in front of the question. Usually empty.
    #[serde(default)]
    pub user_prompt: String,
    pub user_question: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl ChatRequest {
    /// Text of the final user message sent to the model.
    pub fn user_content(&self) -> String {
        if self.user_prompt.trim().is_empty() {
            self.user_question.clone()
        } else {
            format!("{}\n\n{}", self.user_prompt, self.user_question)
        }
    }

    /// Rough token estimate for the whole request (~4 characters per token).
    pub fn estimate_input_tokens(&self) -> u32 {
        let mut chars = self.system_prompt.chars().count() + self.user_content().chars().count();
        for msg in &self.history {
            // Overhead for role and message structure
            chars += msg.content.chars().count() + 10;
        }
        (chars as f64 / 4.0).ceil() as u32
    }
}

/// Response from a chat model for a non-streaming call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}

/// Token usage for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Events emitted during a streaming model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A text increment.
    TextDelta { text: String },

    /// Token usage information, usually sent once near the end.
    Usage(Usage),

    /// The stream has completed.
    Done,
}

/// Errors from chat model operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

//! Chat turn types: the request for one turn, the records it yields and the
//! phases it moves through.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::{ANONYMOUS_USER, Metadata};

/// Session type given to sessions created by a chat turn.
pub const CHAT_SESSION_TYPE: &str = "chat";

/// Input for one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Existing session to continue; a new session is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    pub user_question: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Falls back to the configured default provider.
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Falls back to the configured default model.
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub enable_web_search: bool,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub stream: bool,
}

fn default_user_id() -> String {
    ANONYMOUS_USER.to_string()
}

impl TurnRequest {
    pub fn new(user_question: impl Into<String>) -> Self {
        Self {
            session_id: None,
            user_question: user_question.into(),
            user_id: default_user_id(),
            model_provider: None,
            model_name: None,
            enable_web_search: false,
            metadata: None,
            stream: false,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.model_provider = Some(provider.into());
        self.model_name = Some(model.into());
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// One record yielded by a turn.
///
/// Streaming turns yield an opening record with empty content, one record per
/// text increment, and a closing record carrying `token_count`. Non-streaming
/// turns yield a single record with the full reply and the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub session_id: String,
    pub content: String,
    pub token_count: Option<u32>,
}

impl TurnRecord {
    pub fn chunk(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
            token_count: None,
        }
    }

    pub fn finished(
        session_id: impl Into<String>,
        content: impl Into<String>,
        token_count: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
            token_count: Some(token_count),
        }
    }

    pub fn is_final(&self) -> bool {
        self.token_count.is_some()
    }
}

/// Phase of the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    ResolveSession,
    AugmentPrompt,
    InvokeModel,
    PersistTurn,
    Done,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::ResolveSession => write!(f, "resolve_session"),
            TurnPhase::AugmentPrompt => write!(f, "augment_prompt"),
            TurnPhase::InvokeModel => write!(f, "invoke_model"),
            TurnPhase::PersistTurn => write!(f, "persist_turn"),
            TurnPhase::Done => write!(f, "done"),
        }
    }
}

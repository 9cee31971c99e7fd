//! Session types.
//!
//! A [`Session`] is a persistent conversation: ordered messages plus the
//! owner, type, model selection and a free-form metadata bag.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::llm::HistoryMessage;
use crate::message::{DisplayMessage, Message, MessageRole};
use crate::time::serde_timestamp;

/// Free-form key/value bag attached to a session.
pub type Metadata = Map<String, Value>;

/// Default model label for sessions that never ran a turn.
pub const DEFAULT_LLM_NAME: &str = "default";

/// Default owner when a caller does not identify a user.
pub const ANONYMOUS_USER: &str = "anonymous";

fn default_llm_name() -> String {
    DEFAULT_LLM_NAME.to_string()
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// A persistent conversation.
///
/// `session_id`, `session_type`, `user_id` and `created_at` never change
/// after creation. Every mutating method advances `last_updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub session_type: String,
    pub user_id: String,
    #[serde(default = "default_llm_name")]
    pub llm_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    #[serde(with = "serde_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "serde_timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl Session {
    /// A fresh, empty session with both timestamps set to now.
    pub fn new(
        session_id: impl Into<String>,
        session_type: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            description: None,
            session_type: session_type.into(),
            user_id: user_id.into(),
            llm_name: default_llm_name(),
            messages: Vec::new(),
            metadata: Metadata::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Advance `last_updated`, strictly, even on a coarse clock.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_updated = if now > self.last_updated {
            now
        } else {
            self.last_updated + Duration::microseconds(1)
        };
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.touch();
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
        self.touch();
    }

    /// Merge by key; existing keys not named in `updates` are kept.
    pub fn merge_metadata(&mut self, updates: Metadata) {
        for (key, value) in updates {
            self.metadata.insert(key, value);
        }
        self.touch();
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn set_llm_name(&mut self, llm_name: impl Into<String>) {
        self.llm_name = llm_name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
        self.touch();
    }

    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Role/content pairs for every message, in order, for the model prompt.
    pub fn history_for_context(&self) -> Vec<HistoryMessage> {
        self.messages
            .iter()
            .map(|m| HistoryMessage {
                role: m.role(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Call ids of tool results with no earlier matching tool invocation.
    pub fn validate_tool_links(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dangling = Vec::new();
        for msg in &self.messages {
            for call in msg.tool_calls() {
                seen.insert(call.call_id.as_str());
            }
            if let Some(r) = msg.tool_result_ref() {
                if !seen.contains(r.call_id.as_str()) {
                    dangling.push(r.call_id.clone());
                }
            }
        }
        dangling
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            session_type: self.session_type.clone(),
            user_id: self.user_id.clone(),
            description: self.description.clone(),
            llm_name: self.llm_name.clone(),
            metadata: self.metadata.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            last_updated: self.last_updated,
        }
    }

    pub fn detail(&self) -> SessionDetail {
        SessionDetail {
            session_id: self.session_id.clone(),
            session_type: self.session_type.clone(),
            user_id: self.user_id.clone(),
            llm_name: self.llm_name.clone(),
            metadata: self.metadata.clone(),
            messages: self.messages.iter().map(Message::to_display).collect(),
        }
    }
}

/// Parameters for creating a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_type: String,
    pub user_id: String,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub llm_name: Option<String>,
}

impl NewSession {
    pub fn new(session_type: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_type: session_type.into(),
            user_id: user_id.into(),
            description: None,
            metadata: Metadata::new(),
            llm_name: None,
        }
    }
}

/// List-view projection of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_type: String,
    pub user_id: String,
    pub description: Option<String>,
    pub llm_name: String,
    pub metadata: Metadata,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Detail-view projection of a session with messages in display form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session_id: String,
    pub session_type: String,
    pub user_id: String,
    pub llm_name: String,
    pub metadata: Metadata,
    pub messages: Vec<DisplayMessage>,
}

impl SessionDetail {
    pub fn count_by_role(&self, role: MessageRole) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

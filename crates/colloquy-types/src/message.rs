//! Conversation message types.
//!
//! A [`Message`] is one turn in a session. Tool invocations and tool results
//! are carried in [`MessageKind`], so a message can never hold both.
//!
//! Messages persist through a stable JSON storage form shared by every
//! backend (see [`Message`]'s serde impls) and render to a markdown
//! [`DisplayMessage`] for presentation.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::llm::MessageRole;
use crate::time::{MESSAGE_TIME_FORMAT, parse_timestamp};

/// One tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    /// Opaque argument payload. Text that is valid JSON is held parsed.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments: normalize_arguments(arguments),
        }
    }

    /// Arguments as the JSON text written to storage.
    pub fn arguments_text(&self) -> String {
        match &self.arguments {
            // A bare string is stored JSON-encoded so it reads back as a string.
            Value::String(s) => serde_json::to_string(s).unwrap_or_else(|_| s.clone()),
            other => other.to_string(),
        }
    }
}

/// Reference from a tool message back to the invocation it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultRef {
    pub tool_name: String,
    pub call_id: String,
}

/// Structural variant of a message.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MessageKind {
    #[default]
    Plain,
    /// Assistant message requesting tool invocations.
    ToolCalls(Vec<ToolCall>),
    /// Tool message carrying the output of one invocation.
    ToolResult(ToolResultRef),
}

/// A single message within a session.
///
/// Build messages through the factories so the role always matches the
/// variant. `created_at` has second precision and is absent for system
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredMessage", try_from = "StoredMessage")]
pub struct Message {
    role: MessageRole,
    pub content: String,
    kind: MessageKind,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            kind: MessageKind::Plain,
            created_at: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::stamped(MessageRole::User, content.into(), MessageKind::Plain)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::stamped(MessageRole::Assistant, content.into(), MessageKind::Plain)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self::stamped(
            MessageRole::Assistant,
            content.into(),
            MessageKind::ToolCalls(calls),
        )
    }

    pub fn tool_result(
        content: impl Into<String>,
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
    ) -> Self {
        Self::stamped(
            MessageRole::Tool,
            content.into(),
            MessageKind::ToolResult(ToolResultRef {
                tool_name: tool_name.into(),
                call_id: call_id.into(),
            }),
        )
    }

    fn stamped(role: MessageRole, content: String, kind: MessageKind) -> Self {
        Self {
            role,
            content,
            kind,
            created_at: Some(Utc::now().trunc_subsecs(0)),
        }
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.kind {
            MessageKind::ToolCalls(calls) => calls,
            _ => &[],
        }
    }

    pub fn tool_result_ref(&self) -> Option<&ToolResultRef> {
        match &self.kind {
            MessageKind::ToolResult(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self.kind, MessageKind::ToolResult(_))
    }

    pub fn is_assistant_tool_calls(&self) -> bool {
        matches!(&self.kind, MessageKind::ToolCalls(calls) if !calls.is_empty())
    }

    /// Render for presentation: tool invocations and results become markdown.
    pub fn to_display(&self) -> DisplayMessage {
        let content = match &self.kind {
            MessageKind::Plain => self.content.clone(),
            MessageKind::ToolCalls(calls) => {
                let mut out = String::new();
                if !self.content.is_empty() {
                    out.push_str(&self.content);
                    out.push_str("\n\n");
                }
                out.push_str("## Tool calls\n");
                for (i, call) in calls.iter().enumerate() {
                    let pretty = serde_json::to_string_pretty(&call.arguments)
                        .unwrap_or_else(|_| call.arguments_text());
                    out.push_str(&format!(
                        "\n### {}. {}\n\nArguments:\n\n```json\n{}\n```\n",
                        i + 1,
                        call.tool_name,
                        pretty
                    ));
                }
                out
            }
            MessageKind::ToolResult(r) => {
                format!("### Result of tool {}:\n\n{}", r.tool_name, self.content)
            }
        };

        DisplayMessage {
            role: self.role,
            content,
            created_at: self
                .created_at
                .map(|dt| dt.format(MESSAGE_TIME_FORMAT).to_string()),
        }
    }
}

/// Presentation form of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Parse text arguments when they hold JSON; anything else passes through.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Storage form
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct StoredFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Serialize, Deserialize)]
struct StoredToolCall {
    id: String,
    #[serde(rename = "type", default = "default_tool_type")]
    kind: String,
    function: StoredFunction,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Deserialize)]
struct StoredToolResult {
    name: String,
    tool_call_id: String,
}

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: MessageRole,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<StoredToolCall>>,
    #[serde(default, skip_serializing)]
    tool_result: Option<StoredToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, alias = "create_time", skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl From<Message> for StoredMessage {
    fn from(msg: Message) -> Self {
        let created_at = msg
            .created_at
            .map(|dt| dt.format(MESSAGE_TIME_FORMAT).to_string());

        let (tool_calls, name, tool_call_id) = match msg.kind {
            MessageKind::Plain => (None, None, None),
            MessageKind::ToolCalls(calls) => {
                let stored = calls
                    .into_iter()
                    .map(|call| StoredToolCall {
                        kind: default_tool_type(),
                        function: StoredFunction {
                            arguments: Value::String(call.arguments_text()),
                            name: call.tool_name,
                        },
                        id: call.call_id,
                    })
                    .collect();
                (Some(stored), None, None)
            }
            MessageKind::ToolResult(r) => (None, Some(r.tool_name), Some(r.call_id)),
        };

        StoredMessage {
            role: msg.role,
            content: Some(msg.content),
            tool_calls,
            tool_result: None,
            name,
            tool_call_id,
            created_at,
        }
    }
}

impl TryFrom<StoredMessage> for Message {
    type Error = String;

    fn try_from(stored: StoredMessage) -> Result<Self, Self::Error> {
        let result_ref = match (stored.tool_result, stored.name, stored.tool_call_id) {
            (Some(r), _, _) => Some(ToolResultRef {
                tool_name: r.name,
                call_id: r.tool_call_id,
            }),
            // Flattened legacy form.
            (None, Some(name), Some(call_id)) => Some(ToolResultRef {
                tool_name: name,
                call_id,
            }),
            _ => None,
        };

        let kind = match (stored.tool_calls, result_ref) {
            (Some(_), Some(_)) => {
                return Err("message carries both tool calls and a tool result".to_string());
            }
            (Some(calls), None) => {
                if stored.role != MessageRole::Assistant {
                    return Err(format!("tool calls on a '{}' message", stored.role));
                }
                MessageKind::ToolCalls(
                    calls
                        .into_iter()
                        .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
                        .collect(),
                )
            }
            (None, Some(r)) => {
                if stored.role != MessageRole::Tool {
                    return Err(format!("tool result on a '{}' message", stored.role));
                }
                MessageKind::ToolResult(r)
            }
            (None, None) => MessageKind::Plain,
        };

        let created_at = match stored.created_at {
            Some(raw) => Some(parse_message_time(&raw)?),
            None => None,
        };

        Ok(Message {
            role: stored.role,
            content: stored.content.unwrap_or_default(),
            kind,
            created_at,
        })
    }
}

fn parse_message_time(raw: &str) -> Result<DateTime<Utc>, String> {
    match NaiveDateTime::parse_from_str(raw, MESSAGE_TIME_FORMAT) {
        Ok(naive) => Ok(naive.and_utc()),
        Err(_) => parse_timestamp(raw),
    }
}

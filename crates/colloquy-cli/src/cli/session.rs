//! Session management commands: create, list, show, set-metadata, delete
//! and clear.

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::Value;

use colloquy_types::llm::MessageRole;
use colloquy_types::session::{Metadata, NewSession, Session, SessionSummary};

use crate::state::AppState;

/// Parse `key=value` entries. Values that parse as JSON keep their type;
/// anything else is stored as a string.
pub fn parse_metadata_entries(entries: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for entry in entries {
        let Some((key, raw)) = entry.split_once('=') else {
            bail!("invalid metadata entry '{entry}': expected KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid metadata entry '{entry}': empty key");
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

/// Create a session and print its id.
///
/// ```bash
/// colloquy session create --type chat --user alice --meta topic=rust
/// ```
pub async fn create_session(
    state: &AppState,
    session_type: String,
    user: String,
    description: Option<String>,
    metadata: &[String],
    json: bool,
) -> Result<()> {
    let mut new = NewSession::new(session_type, user);
    new.description = description;
    new.metadata = parse_metadata_entries(metadata)?;

    let session_id = state.sessions.create(new).await?;

    if json {
        println!("{}", serde_json::json!({ "session_id": session_id }));
    } else {
        println!(
            "  {} Created session {}",
            style("✓").green().bold(),
            style(&session_id).cyan()
        );
    }
    Ok(())
}

/// List sessions, optionally filtered by type or user.
pub async fn list_sessions(
    state: &AppState,
    session_type: Option<&str>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let sessions = match (session_type, user) {
        (Some(t), _) => state.sessions.get_by_type(t).await?,
        (None, Some(u)) => state.sessions.get_by_user(u).await?,
        (None, None) => state.sessions.get_all().await?,
    };
    let summaries: Vec<SessionSummary> = sessions
        .iter()
        .filter(|s| user.is_none_or(|u| s.user_id == u))
        .map(|s| s.summary())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!();
        println!(
            "  {} No sessions found. Start one with: {}",
            style("i").blue().bold(),
            style("colloquy chat \"hello\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Description").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("User").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for s in &summaries {
        let description = s.description.as_deref().unwrap_or("(none)");
        table.add_row(vec![
            Cell::new(&s.session_id).fg(Color::Cyan),
            Cell::new(truncate(description, 40)),
            Cell::new(&s.session_type).fg(Color::DarkGrey),
            Cell::new(&s.user_id),
            Cell::new(&s.llm_name).fg(Color::DarkGrey),
            Cell::new(s.message_count.to_string()),
            Cell::new(s.last_updated.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(summaries.len()).bold(),
        if summaries.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// JSON form of `session show`, including tool results with no matching call.
pub fn detail_json(session: &Session) -> Result<Value> {
    let mut value = serde_json::to_value(session.detail())?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "dangling_tool_results".to_string(),
            serde_json::to_value(session.validate_tool_links())?,
        );
    }
    Ok(value)
}

/// Show one session with its messages rendered for display.
pub async fn show_session(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    let session = state
        .sessions
        .get(session_id)
        .await?
        .with_context(|| format!("Session '{session_id}' not found"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail_json(&session)?)?);
        return Ok(());
    }
    let detail = session.detail();
    let dangling = session.validate_tool_links();

    println!();
    println!("  {}", style(&detail.session_id).cyan().bold());
    if let Some(description) = &session.description {
        println!("  {}", style(description).dim());
    }
    println!();
    println!("  Type:     {}", detail.session_type);
    println!("  User:     {}", detail.user_id);
    println!("  Model:    {}", detail.llm_name);
    println!(
        "  Messages: {} ({} user, {} assistant)",
        detail.messages.len(),
        detail.count_by_role(MessageRole::User),
        detail.count_by_role(MessageRole::Assistant)
    );
    if !detail.metadata.is_empty() {
        println!("  Metadata: {}", Value::Object(detail.metadata.clone()));
    }
    if !dangling.is_empty() {
        println!(
            "  {} tool results without a matching call: {}",
            style("warning:").yellow().bold(),
            dangling.join(", ")
        );
    }
    println!();

    for msg in &detail.messages {
        let label = match msg.role {
            MessageRole::User => style("You").green().bold(),
            MessageRole::Assistant => style("Assistant").cyan().bold(),
            MessageRole::System => style("System").magenta().bold(),
            MessageRole::Tool => style("Tool").yellow().bold(),
        };
        match &msg.created_at {
            Some(ts) => println!("  {label} {}", style(ts).dim()),
            None => println!("  {label}"),
        }
        for line in msg.content.lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

/// Merge `key=value` entries into a session's metadata.
pub async fn set_metadata(
    state: &AppState,
    session_id: &str,
    entries: &[String],
    json: bool,
) -> Result<()> {
    let updates = parse_metadata_entries(entries)?;
    let count = updates.len();
    if !state.sessions.update_metadata(session_id, updates).await? {
        bail!("Session '{session_id}' not found");
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "updated": true, "session_id": session_id, "keys": count })
        );
    } else {
        println!(
            "  {} Updated {} metadata key{} on {}",
            style("✓").green().bold(),
            count,
            if count == 1 { "" } else { "s" },
            style(session_id).cyan()
        );
    }
    Ok(())
}

pub async fn delete_session(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    let deleted = state.sessions.delete(session_id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": deleted, "session_id": session_id })
        );
    } else if deleted {
        println!(
            "  {} Session '{}' deleted.",
            style("x").red().bold(),
            session_id
        );
    } else {
        println!(
            "  {} Session '{}' not found.",
            style("i").blue().bold(),
            session_id
        );
    }
    Ok(())
}

pub async fn clear_session(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    if !state.sessions.clear_history(session_id).await? {
        bail!("Session '{session_id}' not found");
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "cleared": true, "session_id": session_id })
        );
    } else {
        println!(
            "  {} Cleared history of {}",
            style("✓").green().bold(),
            style(session_id).cyan()
        );
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `colloquy-core` using sqlx with split
//! read/write pools. One row per session in `agent_sessions`; messages and
//! metadata are JSON text columns and message order is array order.

use colloquy_core::session::store::SessionStore;
use colloquy_types::error::RepositoryError;
use colloquy_types::message::Message;
use colloquy_types::session::{DEFAULT_LLM_NAME, Metadata, Session};
use colloquy_types::time::{format_timestamp, parse_timestamp};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, error, info, warn};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    session_id: String,
    description: Option<String>,
    session_type: String,
    user_id: String,
    llm_name: Option<String>,
    messages: Option<String>,
    metadata: Option<String>,
    created_at: String,
    last_updated: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            description: row.try_get("description")?,
            session_type: row.try_get("session_type")?,
            user_id: row.try_get("user_id")?,
            llm_name: row.try_get("llm_name")?,
            messages: row.try_get("messages")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let messages: Vec<Message> = match self.messages.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<Option<Vec<Message>>>(raw)
                .map_err(|e| RepositoryError::Serialization(format!("invalid messages: {e}")))?
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let metadata: Metadata = match self.metadata.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<Option<Metadata>>(raw)
                .map_err(|e| RepositoryError::Serialization(format!("invalid metadata: {e}")))?
                .unwrap_or_default(),
            _ => Metadata::new(),
        };

        Ok(Session {
            session_id: self.session_id,
            description: self.description,
            session_type: self.session_type,
            user_id: self.user_id,
            llm_name: self
                .llm_name
                .unwrap_or_else(|| DEFAULT_LLM_NAME.to_string()),
            messages,
            metadata,
            created_at: parse_datetime(&self.created_at)?,
            last_updated: parse_datetime(&self.last_updated)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    parse_timestamp(s).map_err(RepositoryError::Serialization)
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    SessionRow::from_row(row)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?
        .into_session()
}

async fn upsert(tx: &mut Transaction<'_, Sqlite>, session: &Session) -> Result<(), RepositoryError> {
    let messages = serde_json::to_string(&session.messages)?;
    let metadata = serde_json::to_string(&session.metadata)?;

    let existing = sqlx::query("SELECT 1 FROM agent_sessions WHERE session_id = ?")
        .bind(&session.session_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    if existing.is_some() {
        sqlx::query(
            r#"UPDATE agent_sessions
               SET description = ?, session_type = ?, user_id = ?, llm_name = ?,
                   messages = ?, metadata = ?, last_updated = ?
               WHERE session_id = ?"#,
        )
        .bind(&session.description)
        .bind(&session.session_type)
        .bind(&session.user_id)
        .bind(&session.llm_name)
        .bind(&messages)
        .bind(&metadata)
        .bind(format_timestamp(&session.last_updated))
        .bind(&session.session_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    } else {
        sqlx::query(
            r#"INSERT INTO agent_sessions (session_id, description, session_type, user_id, llm_name, messages, metadata, created_at, last_updated)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&session.session_id)
        .bind(&session.description)
        .bind(&session.session_type)
        .bind(&session.user_id)
        .bind(&session.llm_name)
        .bind(&messages)
        .bind(&metadata)
        .bind(format_timestamp(&session.created_at))
        .bind(format_timestamp(&session.last_updated))
        .execute(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agent_sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        match decode_row(&row) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "skipping malformed session row");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        if let Err(e) = upsert(&mut tx, session).await {
            error!(session_id = %session.session_id, error = %e, "session save failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(session_id = %session.session_id, error = %rollback_err, "rollback failed");
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        debug!(
            session_id = %session.session_id,
            messages = session.messages.len(),
            "saved session to database"
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM agent_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(session_id = %session_id, "deleted session from database");
        }
        Ok(removed)
    }

    async fn get_all(&self) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM agent_sessions ORDER BY created_at ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_row(row) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    let id: String = row.try_get("session_id").unwrap_or_default();
                    warn!(session_id = %id, error = %e, "skipping malformed session row");
                }
            }
        }

        Ok(sessions)
    }
}

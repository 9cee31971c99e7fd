//! File-backed session store.
//!
//! One pretty-printed JSON document per session at `<dir>/<session_id>.json`,
//! mirrored in memory. Writes go to a temporary sibling that is renamed over
//! the target, so a crash never leaves a half-written document behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use colloquy_core::session::store::SessionStore;
use colloquy_types::error::RepositoryError;
use colloquy_types::session::Session;

const DOCUMENT_EXTENSION: &str = "json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Session store writing one JSON document per session.
pub struct FileSessionStore {
    dir: PathBuf,
    mirror: DashMap<String, Session>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mirror: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `session_id`.
    pub fn document_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.{DOCUMENT_EXTENSION}"))
    }

    async fn read_document(&self, path: &Path) -> Result<Option<Session>, RepositoryError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed session document");
                Ok(None)
            }
        }
    }
}

/// Ids that would escape the directory or collide with special entries.
fn is_safe_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id != "."
        && session_id != ".."
        && !session_id.starts_with('.')
        && !session_id.contains(['/', '\\', '\0'])
}

impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        if !is_safe_id(session_id) {
            warn!(session_id = %session_id, "rejecting unsafe session id");
            return Ok(None);
        }
        if let Some(session) = self.mirror.get(session_id).map(|s| s.clone()) {
            return Ok(Some(session));
        }

        let session = self.read_document(&self.document_path(session_id)).await?;
        if let Some(session) = &session {
            self.mirror.insert(session_id.to_string(), session.clone());
        }
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let session_id = session.session_id.as_str();
        if !is_safe_id(session_id) {
            return Err(RepositoryError::InvalidId(session_id.to_string()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let document = serde_json::to_string_pretty(session)?;

        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self.dir.join(format!(".{session_id}.{n}.tmp"));
        let target = self.document_path(session_id);

        let written = match tokio::fs::write(&tmp_path, document).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        self.mirror.insert(session_id.to_string(), session.clone());
        debug!(session_id = %session_id, path = %target.display(), "saved session document");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        if !is_safe_id(session_id) {
            return Ok(false);
        }

        match tokio::fs::remove_file(self.document_path(session_id)).await {
            Ok(()) => {
                self.mirror.remove(session_id);
                info!(session_id = %session_id, "deleted session document");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.mirror.remove(session_id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self) -> Result<Vec<Session>, RepositoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            match self.read_document(&path).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable session document");
                }
            }
        }

        self.mirror.clear();
        for session in &sessions {
            self.mirror
                .insert(session.session_id.clone(), session.clone());
        }

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        debug!(count = sessions.len(), dir = %self.dir.display(), "scanned session documents");
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use colloquy_types::message::{Message, ToolCall};
    use serde_json::json;
    use tempfile::tempdir;

    fn session(id: &str) -> Session {
        let mut session = Session::new(id, "chat", "alice");
        session.set_metadata("topic", json!("rust"));
        session
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions"));
        let mut s = session("session_20250101000000_aaaaaaaa");
        s.add_message(Message::user("hi"));
        s.add_message(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "search", json!({"q": "rust"}))],
        ));
        s.add_message(Message::tool_result("done", "search", "c1"));

        store.save(&s).await.unwrap();

        // Fresh store: forces a read from disk.
        let reopened = FileSessionStore::new(dir.path().join("sessions"));
        let loaded = reopened.get(&s.session_id).await.unwrap().unwrap();
        assert_eq!(loaded, s);
    }

    fn temp_leftovers(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count()
    }

    #[tokio::test]
    async fn test_failed_save_removes_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let s = session("session_20250101000000_ffffffff");
        // A non-empty directory at the target makes the final rename fail.
        let target = store.document_path(&s.session_id);
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        assert!(store.save(&s).await.is_err());
        assert_eq!(temp_leftovers(dir.path()), 0);
        assert!(store.mirror.get(&s.session_id).is_none());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_session_readable() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let s = session("session_20250101000000_eeeeeeee");
        store.save(&s).await.unwrap();

        // Swap the document for a directory so unlinking it fails.
        let path = store.document_path(&s.session_id);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.delete(&s.session_id).await.is_err());
        assert_eq!(store.get(&s.session_id).await.unwrap(), Some(s));
    }

    #[tokio::test]
    async fn test_document_is_pretty_json_without_temp_leftovers() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let s = session("session_20250101000000_bbbbbbbb");
        store.save(&s).await.unwrap();
        store.save(&s).await.unwrap();

        let raw = std::fs::read_to_string(store.document_path(&s.session_id)).unwrap();
        assert!(raw.contains("\n  \"session_id\""));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["session_20250101000000_bbbbbbbb.json".to_string()]);
    }

    #[tokio::test]
    async fn test_messages_appended_in_order() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let mut s = session("session_20250101000000_cccccccc");
        for i in 0..10 {
            s.add_message(Message::user(format!("m{i}")));
            store.save(&s).await.unwrap();
        }
        let reopened = FileSessionStore::new(dir.path());
        let loaded = reopened.get(&s.session_id).await.unwrap().unwrap();
        let contents: Vec<_> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_missing_and_delete() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.get("session_missing").await.unwrap().is_none());
        assert!(!store.delete("session_missing").await.unwrap());

        let s = session("session_20250101000000_dddddddd");
        store.save(&s).await.unwrap();
        assert!(store.delete(&s.session_id).await.unwrap());
        assert!(store.get(&s.session_id).await.unwrap().is_none());
        assert!(!store.document_path(&s.session_id).exists());
    }

    #[tokio::test]
    async fn test_unsafe_ids() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("inner"));
        for id in ["", ".", "..", "../escape", "a/b", "a\\b"] {
            assert!(store.get(id).await.unwrap().is_none());
            assert!(!store.delete(id).await.unwrap());
            let s = Session::new(id, "chat", "u");
            assert!(matches!(
                store.save(&s).await,
                Err(RepositoryError::InvalidId(_))
            ));
        }
        assert!(!dir.path().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_get_all_creates_dir_and_skips_malformed() {
        let dir = tempdir().unwrap();
        let sessions_dir = dir.path().join("not-yet");
        let store = FileSessionStore::new(&sessions_dir);

        assert!(store.get_all().await.unwrap().is_empty());
        assert!(sessions_dir.is_dir());

        let mut older = session("session_20240101000000_eeeeeeee");
        older.created_at = Utc::now() - Duration::days(1);
        let newer = session("session_20250101000000_ffffffff");
        store.save(&newer).await.unwrap();
        store.save(&older).await.unwrap();
        std::fs::write(sessions_dir.join("garbage.json"), "{ not json").unwrap();
        std::fs::write(sessions_dir.join("notes.txt"), "ignored").unwrap();

        let all = store.get_all().await.unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec![older.session_id.as_str(), newer.session_id.as_str()]);
    }

    #[tokio::test]
    async fn test_get_all_rebuilds_mirror() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let s = session("session_20250101000000_01234567");
        store.save(&s).await.unwrap();

        // Removed behind the store's back.
        std::fs::remove_file(store.document_path(&s.session_id)).unwrap();
        assert!(store.get(&s.session_id).await.unwrap().is_some());

        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.get(&s.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_legacy_document() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(
            dir.path().join("session_20240101000000_abcdef12.json"),
            r#"{
  "session_id": "session_20240101000000_abcdef12",
  "description": "old",
  "session_type": "chat",
  "user_id": "anonymous",
  "llm_name": "openai-gpt-4",
  "messages": [
    {"role": "user", "content": "hello", "create_time": "2024-01-01 00:00:01"},
    {"role": "tool", "content": "42", "name": "calc", "tool_call_id": "c9"}
  ],
  "metadata": {},
  "created_at": "2024-01-01T00:00:00",
  "last_updated": "2024-01-01T00:00:02.500000"
}"#,
        )
        .unwrap();

        let loaded = store
            .get("session_20240101000000_abcdef12")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert!(loaded.messages[1].is_tool_result());
        assert_eq!(loaded.validate_tool_links(), vec!["c9".to_string()]);
    }
}

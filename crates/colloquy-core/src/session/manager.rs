//! SessionManager -- write-through cache over one session backend.
//!
//! Reads go through the cache and fall back to the backend on a miss.
//! Every mutation runs under a per-session async mutex, works on a copy of
//! the session, persists it, and only then replaces the cache entry.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use colloquy_types::error::RepositoryError;
use colloquy_types::message::Message;
use colloquy_types::session::{Metadata, NewSession, Session};

use super::box_store::BoxSessionStore;

/// Process-wide session manager. Construct once and share through `Arc`.
pub struct SessionManager {
    store: BoxSessionStore,
    cache: DashMap<String, Session>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(store: BoxSessionStore) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Label of the backend in use.
    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    /// New id of the form `session_<YYYYmmddHHMMSS>_<8 hex>`.
    pub fn generate_session_id() -> String {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        format!("session_{timestamp}_{}", &suffix[..8])
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry for `session_id` unless another task still holds it.
    fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(session_id, |_, l| Arc::strong_count(l) == 1);
    }

    /// Create and persist a session. Returns its id.
    pub async fn create(&self, new: NewSession) -> Result<String, RepositoryError> {
        let session_id = Self::generate_session_id();
        let mut session = Session::new(&session_id, new.session_type, new.user_id);
        session.description = new.description;
        if let Some(llm_name) = new.llm_name {
            session.llm_name = llm_name;
        }
        session.metadata = new.metadata;

        self.persist(&session).await?;
        info!(
            session_id = %session_id,
            session_type = %session.session_type,
            user_id = %session.user_id,
            "created session"
        );
        self.cache.insert(session_id.clone(), session);
        Ok(session_id)
    }

    /// Snapshot of a session, loading it from the backend on a cache miss.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        let cached = self.cache.get(session_id).map(|s| s.clone());
        if let Some(session) = cached {
            debug!(session_id = %session_id, "session cache hit");
            return Ok(Some(session));
        }

        match self.store.get(session_id).await? {
            Some(loaded) => {
                debug!(session_id = %session_id, backend = self.store.name(), "loaded session into cache");
                // A mutation that finished while we were loading wins.
                let session = self
                    .cache
                    .entry(session_id.to_string())
                    .or_insert(loaded)
                    .clone();
                Ok(Some(session))
            }
            None => {
                warn!(session_id = %session_id, "session not found");
                Ok(None)
            }
        }
    }

    /// Every session, after merging the full backend listing into the cache.
    ///
    /// Ordered by `created_at`.
    pub async fn get_all(&self) -> Result<Vec<Session>, RepositoryError> {
        let listing = self.store.get_all().await?;
        let count = listing.len();
        for session in listing {
            match self.cache.entry(session.session_id.clone()) {
                Entry::Occupied(mut cached) => {
                    if cached.get().last_updated <= session.last_updated {
                        cached.insert(session);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(session);
                }
            }
        }
        debug!(count, "merged backend listing into cache");

        let mut sessions: Vec<Session> = self.cache.iter().map(|e| e.value().clone()).collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }

    pub async fn get_by_type(&self, session_type: &str) -> Result<Vec<Session>, RepositoryError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.session_type == session_type)
            .collect())
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Vec<Session>, RepositoryError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect())
    }

    /// Read, mutate, persist, then cache. `None` if the session does not exist.
    ///
    /// The cache keeps the previous state when the backend write fails.
    pub async fn update<F>(&self, session_id: &str, f: F) -> Result<Option<Session>, RepositoryError>
    where
        F: FnOnce(&mut Session) + Send,
    {
        let lock = self.lock_for(session_id);
        let guard = lock.lock().await;

        let Some(mut session) = self.get(session_id).await? else {
            drop(guard);
            self.release_lock(session_id, lock);
            return Ok(None);
        };
        f(&mut session);
        self.persist(&session).await?;
        self.cache.insert(session_id.to_string(), session.clone());
        Ok(Some(session))
    }

    pub async fn add_message(
        &self,
        session_id: &str,
        message: Message,
    ) -> Result<bool, RepositoryError> {
        let role = message.role();
        let updated = self
            .update(session_id, |s| s.add_message(message))
            .await?;
        if updated.is_some() {
            debug!(session_id = %session_id, role = %role, "appended message");
        }
        Ok(updated.is_some())
    }

    /// Merge `metadata` into the session by key.
    pub async fn update_metadata(
        &self,
        session_id: &str,
        metadata: Metadata,
    ) -> Result<bool, RepositoryError> {
        let updated = self
            .update(session_id, |s| s.merge_metadata(metadata))
            .await?;
        Ok(updated.is_some())
    }

    /// Re-persist the session, stamping `last_updated`.
    pub async fn save(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let updated = self.update(session_id, Session::touch).await?;
        Ok(updated.is_some())
    }

    pub async fn clear_history(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let updated = self.update(session_id, Session::clear_messages).await?;
        if updated.is_some() {
            info!(session_id = %session_id, "cleared session history");
        }
        Ok(updated.is_some())
    }

    /// Delete from the backend, then evict from the cache.
    ///
    /// The cache entry is evicted only when the backend removed the session.
    pub async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let lock = self.lock_for(session_id);
        let guard = lock.lock().await;

        let removed = match self.store.delete(session_id).await {
            Ok(removed) => removed,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "failed to delete session");
                return Err(e);
            }
        };

        if removed {
            self.cache.remove(session_id);
            info!(session_id = %session_id, "deleted session");
        } else {
            warn!(session_id = %session_id, "delete of unknown session");
        }
        drop(guard);
        self.release_lock(session_id, lock);
        Ok(removed)
    }

    /// Whether a session is currently resident in the cache.
    pub fn is_cached(&self, session_id: &str) -> bool {
        self.cache.contains_key(session_id)
    }

    async fn persist(&self, session: &Session) -> Result<(), RepositoryError> {
        self.store.save(session).await.map_err(|e| {
            error!(
                session_id = %session.session_id,
                backend = self.store.name(),
                error = %e,
                "failed to persist session"
            );
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::session::store::SessionStore;

    #[derive(Default)]
    struct MemoryInner {
        sessions: DashMap<String, Session>,
        fail_saves: AtomicBool,
        backend_gets: AtomicUsize,
    }

    #[derive(Clone, Default)]
    struct MemoryStore {
        inner: Arc<MemoryInner>,
    }

    impl SessionStore for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }

        async fn get(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
            self.inner.backend_gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.sessions.get(session_id).map(|s| s.clone()))
        }

        async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
            tokio::task::yield_now().await;
            if self.inner.fail_saves.load(Ordering::SeqCst) {
                return Err(RepositoryError::Io("disk full".to_string()));
            }
            self.inner
                .sessions
                .insert(session.session_id.clone(), session.clone());
            Ok(())
        }

        async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
            Ok(self.inner.sessions.remove(session_id).is_some())
        }

        async fn get_all(&self) -> Result<Vec<Session>, RepositoryError> {
            Ok(self
                .inner
                .sessions
                .iter()
                .map(|e| e.value().clone())
                .collect())
        }
    }

    fn manager() -> (SessionManager, MemoryStore) {
        let store = MemoryStore::default();
        (SessionManager::new(BoxSessionStore::new(store.clone())), store)
    }

    fn is_session_id(id: &str) -> bool {
        let parts: Vec<&str> = id.split('_').collect();
        parts.len() == 3
            && parts[0] == "session"
            && parts[1].len() == 14
            && parts[1].chars().all(|c| c.is_ascii_digit())
            && parts[2].len() == 8
            && parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    #[test]
    fn test_generate_session_id_format() {
        for _ in 0..50 {
            let id = SessionManager::generate_session_id();
            assert!(is_session_id(&id), "bad id: {id}");
        }
    }

    #[tokio::test]
    async fn test_create_persists_and_caches() {
        let (manager, store) = manager();
        let mut metadata = Metadata::new();
        metadata.insert("channel".to_string(), json!("web"));
        let id = manager
            .create(NewSession {
                session_type: "chat".to_string(),
                user_id: "alice".to_string(),
                description: Some("first".to_string()),
                metadata,
                llm_name: None,
            })
            .await
            .unwrap();

        assert!(is_session_id(&id));
        assert!(manager.is_cached(&id));
        let stored = store.inner.sessions.get(&id).map(|s| s.clone()).unwrap();
        assert!(stored.messages.is_empty());
        assert_eq!(stored.llm_name, "default");
        assert_eq!(stored.get_metadata("channel"), Some(&json!("web")));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (manager, _) = manager();
        assert!(manager.get("session_nope").await.unwrap().is_none());
        assert!(!manager.add_message("session_nope", Message::user("x")).await.unwrap());
        assert!(!manager.clear_history("session_nope").await.unwrap());
        assert!(!manager.delete("session_nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_loads_from_backend_on_miss() {
        let (manager, store) = manager();
        let session = Session::new("session_20250101000000_abcdef01", "chat", "bob");
        store
            .inner
            .sessions
            .insert(session.session_id.clone(), session.clone());

        let loaded = manager.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        manager.get(&session.session_id).await.unwrap();
        assert_eq!(store.inner.backend_gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_messages_in_order() {
        let (manager, store) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        for i in 0..5 {
            assert!(manager
                .add_message(&id, Message::user(format!("m{i}")))
                .await
                .unwrap());
        }
        let session = manager.get(&id).await.unwrap().unwrap();
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);

        let stored = store.inner.sessions.get(&id).map(|s| s.clone()).unwrap();
        assert_eq!(stored.messages.len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let manager = manager.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .add_message(&id, Message::user(format!("m{i}")))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let session = manager.get(&id).await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 20);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_cache_unchanged() {
        let (manager, store) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        manager.add_message(&id, Message::user("kept")).await.unwrap();

        store.inner.fail_saves.store(true, Ordering::SeqCst);
        let result = manager.add_message(&id, Message::user("lost")).await;
        assert!(matches!(result, Err(RepositoryError::Io(_))));

        let session = manager.get(&id).await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "kept");
    }

    #[tokio::test]
    async fn test_clear_history_advances_last_updated() {
        let (manager, _) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        manager.add_message(&id, Message::user("hi")).await.unwrap();
        let before = manager.get(&id).await.unwrap().unwrap().last_updated;

        assert!(manager.clear_history(&id).await.unwrap());
        let after = manager.get(&id).await.unwrap().unwrap();
        assert!(after.messages.is_empty());
        assert!(after.last_updated > before);
    }

    #[tokio::test]
    async fn test_update_metadata_merges() {
        let (manager, _) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();

        let mut first = Metadata::new();
        first.insert("a".to_string(), json!(1));
        manager.update_metadata(&id, first).await.unwrap();
        let mut second = Metadata::new();
        second.insert("b".to_string(), json!(2));
        manager.update_metadata(&id, second).await.unwrap();

        let session = manager.get(&id).await.unwrap().unwrap();
        assert_eq!(session.get_metadata("a"), Some(&json!(1)));
        assert_eq!(session.get_metadata("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_save_stamps_last_updated() {
        let (manager, store) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        let before = manager.get(&id).await.unwrap().unwrap().last_updated;
        assert!(manager.save(&id).await.unwrap());
        let stored = store.inner.sessions.get(&id).map(|s| s.clone()).unwrap();
        assert!(stored.last_updated > before);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_none() {
        let (manager, store) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();

        assert!(manager.delete(&id).await.unwrap());
        assert!(!manager.is_cached(&id));
        assert!(store.inner.sessions.get(&id).is_none());
        assert!(manager.get(&id).await.unwrap().is_none());
        assert!(!manager.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_merges_backend_and_filters() {
        let (manager, store) = manager();
        let mine = manager.create(NewSession::new("chat", "alice")).await.unwrap();
        manager.create(NewSession::new("agent", "bob")).await.unwrap();

        // Written by another process: only the backend knows it.
        let mut external = Session::new("session_20200101000000_00000000", "chat", "carol");
        external.created_at = Utc::now() - chrono::Duration::days(1);
        external.last_updated = external.created_at;
        store
            .inner
            .sessions
            .insert(external.session_id.clone(), external.clone());

        let all = manager.get_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].session_id, external.session_id);
        assert!(manager.is_cached(&external.session_id));

        let chats = manager.get_by_type("chat").await.unwrap();
        assert_eq!(chats.len(), 2);
        let alice = manager.get_by_user("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].session_id, mine);
    }

    #[tokio::test]
    async fn test_missing_ids_leave_no_lock_entries() {
        let (manager, _) = manager();
        for i in 0..100 {
            let id = format!("session_missing_{i}");
            assert!(!manager.add_message(&id, Message::user("x")).await.unwrap());
            assert!(!manager.save(&id).await.unwrap());
            assert!(!manager.delete(&id).await.unwrap());
        }
        assert!(manager.locks.is_empty());
    }

    #[tokio::test]
    async fn test_delete_keeps_cache_when_backend_removed_nothing() {
        let (manager, store) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        // Gone from the backend behind the manager's back.
        store.inner.sessions.remove(&id);

        assert!(!manager.delete(&id).await.unwrap());
        assert!(manager.is_cached(&id));
    }

    #[tokio::test]
    async fn test_listing_never_replaces_newer_cached_state() {
        let (manager, store) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        let stale = store.inner.sessions.get(&id).map(|s| s.clone()).unwrap();
        manager.add_message(&id, Message::user("kept")).await.unwrap();

        // Backend still returns the pre-append copy.
        store.inner.sessions.insert(id.clone(), stale);
        manager.get_all().await.unwrap();
        let session = manager.get(&id).await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 1);

        // A newer backend copy replaces the cached one.
        let mut newer = session.clone();
        newer.add_message(Message::user("external"));
        store.inner.sessions.insert(id.clone(), newer);
        manager.get_all().await.unwrap();
        assert_eq!(manager.get(&id).await.unwrap().unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_update_returns_new_state() {
        let (manager, _) = manager();
        let id = manager.create(NewSession::new("chat", "u")).await.unwrap();
        let updated = manager
            .update(&id, |s| s.set_llm_name("openai-gpt-4o"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.llm_name, "openai-gpt-4o");
        assert!(manager.update("missing", |_| {}).await.unwrap().is_none());
    }
}

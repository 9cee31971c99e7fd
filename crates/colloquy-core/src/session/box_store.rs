//! BoxSessionStore -- object-safe dynamic dispatch wrapper for SessionStore.
//!
//! Same blanket-impl pattern as `BoxChatModel`: an object-safe
//! `SessionStoreDyn` with boxed futures, a blanket impl for every
//! `SessionStore`, and a wrapper that delegates.

use std::future::Future;
use std::pin::Pin;

use colloquy_types::error::RepositoryError;
use colloquy_types::session::Session;

use super::store::SessionStore;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`SessionStore`] with boxed futures.
pub trait SessionStoreDyn: Send + Sync {
    fn name(&self) -> &str;

    fn get_boxed<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Option<Session>>;

    fn save_boxed<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, ()>;

    fn delete_boxed<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, bool>;

    fn get_all_boxed(&self) -> BoxFuture<'_, Vec<Session>>;
}

impl<T: SessionStore> SessionStoreDyn for T {
    fn name(&self) -> &str {
        SessionStore::name(self)
    }

    fn get_boxed<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Option<Session>> {
        Box::pin(self.get(session_id))
    }

    fn save_boxed<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, ()> {
        Box::pin(self.save(session))
    }

    fn delete_boxed<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(self.delete(session_id))
    }

    fn get_all_boxed(&self) -> BoxFuture<'_, Vec<Session>> {
        Box::pin(self.get_all())
    }
}

/// Type-erased session store, holding the backend chosen at startup.
pub struct BoxSessionStore {
    inner: Box<dyn SessionStoreDyn>,
}

impl BoxSessionStore {
    pub fn new<T: SessionStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        self.inner.get_boxed(session_id).await
    }

    pub async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        self.inner.save_boxed(session).await
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        self.inner.delete_boxed(session_id).await
    }

    pub async fn get_all(&self) -> Result<Vec<Session>, RepositoryError> {
        self.inner.get_all_boxed().await
    }
}

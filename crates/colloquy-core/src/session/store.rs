//! SessionStore trait definition.
//!
//! Durable persistence of one session per id. Implementations live in
//! colloquy-infra (`FileSessionStore`, `SqliteSessionStore`).

use colloquy_types::error::RepositoryError;
use colloquy_types::session::Session;

/// Storage backend for sessions.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Contract shared by every backend:
/// - `get` returns `None` for unknown ids
/// - `delete` returns `false` for unknown ids
/// - `save` is idempotent and replaces the whole stored session
/// - malformed stored records are logged and treated as absent, and never
///   fail `get_all`
pub trait SessionStore: Send + Sync {
    /// Short backend label for logs (e.g., "file", "sqlite").
    fn name(&self) -> &str;

    fn get(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    fn save(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;
}

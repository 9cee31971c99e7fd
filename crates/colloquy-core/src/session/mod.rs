//! Session persistence and management.
//!
//! - `SessionStore`: RPITIT storage port implemented by each backend
//! - `BoxSessionStore`: object-safe wrapper holding the chosen backend
//! - `SessionManager`: write-through cache over one backend

pub mod box_store;
pub mod manager;
pub mod store;

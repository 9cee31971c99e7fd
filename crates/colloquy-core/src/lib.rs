//! Business logic and port trait definitions for Colloquy.
//!
//! This crate defines the "ports" (storage, model and search traits) that the
//! infrastructure layer implements, plus the session manager and the chat
//! orchestrator built on them. It depends only on `colloquy-types` -- never
//! on `colloquy-infra` or any database/IO crate.

pub mod chat;
pub mod llm;
pub mod search;
pub mod session;

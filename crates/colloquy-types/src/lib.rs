//! Shared domain types for Colloquy.
//!
//! This crate contains the domain types used across the Colloquy workspace:
//! Message, Session, chat turn records, LLM request/usage types, search
//! results, configuration and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod search;
pub mod session;
pub mod time;

//! Infrastructure layer for Colloquy.
//!
//! Contains implementations of the ports defined in `colloquy-core`:
//! file and SQLite session stores, the OpenAI-compatible chat model,
//! Tavily web search, plus config loading and data-dir resolution.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod search;
pub mod sqlite;

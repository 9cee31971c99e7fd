//! Chat model abstractions for Colloquy.
//!
//! - `ChatModel`: RPITIT trait for concrete model adapters
//! - `BoxChatModel`: Object-safe wrapper for dynamic dispatch
//! - `ModelRegistry`: lookup by provider and model name

pub mod box_model;
pub mod provider;
pub mod registry;

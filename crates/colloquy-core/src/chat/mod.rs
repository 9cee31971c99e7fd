//! Chat turn orchestration.
//!
//! `ChatOrchestrator` turns a user question into a (possibly streamed)
//! assistant reply, mutating the session exactly once per message.

pub mod orchestrator;

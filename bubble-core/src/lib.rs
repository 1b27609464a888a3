//! Core services for chat-bubble.
//!
//! - [`orchestrator`]: turns a user utterance into a persisted exchange, in
//!   plain or retrieval-augmented mode.
//! - [`ingest`]: hashes uploaded documents and hands new ones to the
//!   ingestion webhook exactly once.
//! - [`store`]: chat / message / document persistence and the chat-list feed.
//! - [`provider`], [`retrieval`], [`auth`]: clients for the external
//!   completion, embedding, vector index and identity services.

pub mod auth;
pub mod error;
pub mod ingest;
mod locks;
pub mod orchestrator;
pub mod provider;
pub mod retrieval;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use orchestrator::{Exchange, Orchestrator, OrchestratorSettings, FALLBACK_REPLY};
pub use session::SessionContext;

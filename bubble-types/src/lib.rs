//! Shared data model for chat-bubble.
//!
//! These types travel between the persistence layer, the orchestrator and the
//! HTTP surface. JSON field names are camelCase to match the persisted layout
//! (`systemMessage`, `createdAt`, `userId`, `pdfId`).

pub mod chat;
pub mod document;
pub mod retrieval;

pub use chat::{Chat, ChatFilter, Message, NewMessage, Sender};
pub use document::{DocumentRecord, PdfId};
pub use retrieval::{RetrievalMatch, RetrievalQuery, RetrievalResponse};

//! Persistence gateway.
//!
//! [`ChatStore`] holds chats and their append-only message history,
//! [`DocumentRegistry`] remembers which document hashes were already ingested.
//! The default implementation of both is [`sqlite::SqliteStore`]; implement
//! the traits for another type to swap the backend without touching the
//! orchestrator or the handlers.
//!
//! Trait methods use `impl Future` in their signatures so no boxing is needed
//! on the hot path.

pub mod feed;
pub mod sqlite;

use std::future::Future;

use bubble_types::{Chat, ChatFilter, DocumentRecord, Message, NewMessage, PdfId};
use tokio::sync::broadcast;

use crate::error::Result;

pub use feed::{subscribe, ChatSubscription};
pub use sqlite::SqliteStore;

/// Change notification published by a [`ChatStore`] after every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatChange {
    Created { chat_id: String },
    Updated { chat_id: String },
    Deleted { chat_id: String },
    MessageAdded { chat_id: String },
}

impl ChatChange {
    /// Whether a chat-list snapshot may differ after this change.
    pub fn affects_chat_list(&self) -> bool {
        !matches!(self, ChatChange::MessageAdded { .. })
    }

    pub fn chat_id(&self) -> &str {
        match self {
            ChatChange::Created { chat_id }
            | ChatChange::Updated { chat_id }
            | ChatChange::Deleted { chat_id }
            | ChatChange::MessageAdded { chat_id } => chat_id,
        }
    }
}

pub trait ChatStore: Send + Sync + 'static {
    fn create_chat(
        &self,
        user_id: &str,
        title: &str,
        system_message: &str,
    ) -> impl Future<Output = Result<Chat>> + Send;

    fn get_chat(&self, id: &str) -> impl Future<Output = Result<Option<Chat>>> + Send;

    /// Chats matching `filter`, newest first.
    fn list_chats(&self, filter: &ChatFilter) -> impl Future<Output = Result<Vec<Chat>>> + Send;

    fn update_title(&self, id: &str, title: &str) -> impl Future<Output = Result<()>> + Send;

    /// Set the title only if it still reads `expected`; `Ok(false)` when it
    /// was changed in the meantime.
    fn replace_title(
        &self,
        id: &str,
        expected: &str,
        title: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn update_system_message(
        &self,
        id: &str,
        system_message: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove a chat together with its messages.
    fn delete_chat(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Append a message; the store assigns id and timestamp.
    fn append_message(&self, msg: NewMessage) -> impl Future<Output = Result<Message>> + Send;

    /// Messages of one chat, oldest first.
    fn list_messages(&self, chat_id: &str) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// A fresh receiver for write notifications.
    fn changes(&self) -> broadcast::Receiver<ChatChange>;
}

pub trait DocumentRegistry: Send + Sync + 'static {
    fn find_document(&self, pdf_id: &PdfId) -> impl Future<Output = Result<Option<DocumentRecord>>> + Send;

    fn record_document(&self, record: DocumentRecord) -> impl Future<Output = Result<()>> + Send;
}

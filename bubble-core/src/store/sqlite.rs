//! SQLite implementation of [`ChatStore`] and [`DocumentRegistry`].
//!
//! Migrations under `bubble-core/migrations` are embedded at compile time and
//! run by [`SqliteStore::connect`]. Queries use the runtime-checked
//! `sqlx::query` form so no `DATABASE_URL` is needed to build.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so lexical order equals chronological order.

use std::str::FromStr;

use bubble_types::{Chat, ChatFilter, DocumentRecord, Message, NewMessage, PdfId, Sender};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChatChange, ChatStore, DocumentRegistry};
use crate::error::{Error, Result};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

type ChatRow = (String, String, String, String, String, Option<String>);
type MessageRow = (String, String, String, String, String, String);

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<ChatChange>,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL such as `"sqlite://bubble.db"`, or
    /// `"sqlite::memory:"` for tests. In-memory databases are pinned to a
    /// single connection that never expires, since every new connection would
    /// otherwise see an empty database.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { pool, changes })
    }

    fn publish(&self, change: ChatChange) {
        // No receivers is the common case and not an error.
        let _ = self.changes.send(change);
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str, column: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        warn!(raw = %raw, column, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

fn chat_from_row((id, title, system_message, user_id, created_at, updated_at): ChatRow) -> Chat {
    Chat {
        id,
        title,
        system_message,
        user_id,
        created_at: parse_ts(&created_at, "chats.created_at"),
        updated_at: updated_at.as_deref().map(|u| parse_ts(u, "chats.updated_at")),
    }
}

fn message_from_row((id, chat_id, content, sender, user_id, timestamp): MessageRow) -> Result<Message> {
    let sender = Sender::from_str(&sender)
        .map_err(|_| Error::Parse(format!("unknown sender '{sender}' on message {id}")))?;
    Ok(Message {
        timestamp: parse_ts(&timestamp, "messages.timestamp"),
        id,
        chat_id,
        content,
        sender,
        user_id,
    })
}

impl ChatStore for SqliteStore {
    async fn create_chat(&self, user_id: &str, title: &str, system_message: &str) -> Result<Chat> {
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            title: title.to_owned(),
            system_message: system_message.to_owned(),
            user_id: user_id.to_owned(),
            created_at: Utc::now(),
            updated_at: None,
        };
        sqlx::query(
            "INSERT INTO chats (id, title, system_message, user_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
        )
        .bind(&chat.id)
        .bind(&chat.title)
        .bind(&chat.system_message)
        .bind(&chat.user_id)
        .bind(format_ts(chat.created_at))
        .execute(&self.pool)
        .await?;

        debug!(chat_id = %chat.id, user_id = %chat.user_id, "chat created");
        self.publish(ChatChange::Created { chat_id: chat.id.clone() });
        Ok(chat)
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>> {
        let row: Option<ChatRow> = sqlx::query_as(
            "SELECT id, title, system_message, user_id, created_at, updated_at \
             FROM chats WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(chat_from_row))
    }

    async fn list_chats(&self, filter: &ChatFilter) -> Result<Vec<Chat>> {
        let rows: Vec<ChatRow> = match filter.user_id.as_deref() {
            Some(uid) => {
                sqlx::query_as(
                    "SELECT id, title, system_message, user_id, created_at, updated_at \
                     FROM chats WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
                )
                .bind(uid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, title, system_message, user_id, created_at, updated_at \
                     FROM chats ORDER BY created_at DESC, rowid DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(chat_from_row).collect())
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<()> {
        let result = sqlx::query("UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(title)
            .bind(format_ts(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("chat {id}")));
        }
        self.publish(ChatChange::Updated { chat_id: id.to_owned() });
        Ok(())
    }

    async fn replace_title(&self, id: &str, expected: &str, title: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3 AND title = ?4",
        )
        .bind(title)
        .bind(format_ts(Utc::now()))
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.publish(ChatChange::Updated { chat_id: id.to_owned() });
        Ok(true)
    }

    async fn update_system_message(&self, id: &str, system_message: &str) -> Result<()> {
        let result = sqlx::query("UPDATE chats SET system_message = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(system_message)
            .bind(format_ts(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("chat {id}")));
        }
        self.publish(ChatChange::Updated { chat_id: id.to_owned() });
        Ok(())
    }

    async fn delete_chat(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE chat_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM chats WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("chat {id}")));
        }
        self.publish(ChatChange::Deleted { chat_id: id.to_owned() });
        Ok(())
    }

    async fn append_message(&self, msg: NewMessage) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: msg.chat_id,
            content: msg.content,
            sender: msg.sender,
            timestamp: Utc::now(),
            user_id: msg.user_id,
        };
        sqlx::query(
            "INSERT INTO messages (id, chat_id, content, sender, user_id, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.content)
        .bind(message.sender.as_ref())
        .bind(&message.user_id)
        .bind(format_ts(message.timestamp))
        .execute(&self.pool)
        .await?;

        self.publish(ChatChange::MessageAdded { chat_id: message.chat_id.clone() });
        Ok(message)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, chat_id, content, sender, user_id, timestamp \
             FROM messages WHERE chat_id = ?1 ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    fn changes(&self) -> broadcast::Receiver<ChatChange> {
        self.changes.subscribe()
    }
}

impl DocumentRegistry for SqliteStore {
    async fn find_document(&self, pdf_id: &PdfId) -> Result<Option<DocumentRecord>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT pdf_id, file_name, uploaded_at FROM documents WHERE pdf_id = ?1",
        )
        .bind(pdf_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(pdf_id, file_name, uploaded_at)| DocumentRecord {
            pdf_id: PdfId::from(pdf_id),
            file_name,
            uploaded_at: parse_ts(&uploaded_at, "documents.uploaded_at"),
        }))
    }

    async fn record_document(&self, record: DocumentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (pdf_id, file_name, uploaded_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(pdf_id) DO UPDATE SET file_name = ?2, uploaded_at = ?3",
        )
        .bind(record.pdf_id.as_str())
        .bind(&record.file_name)
        .bind(format_ts(record.uploaded_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

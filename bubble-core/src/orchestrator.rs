//! Session orchestrator: one user utterance in, one assistant reply out.
//!
//! Two prompting modes:
//! - **plain**: system instruction + the most recent prior messages + the
//!   utterance;
//! - **retrieval-augmented** (a namespace is selected): the utterance is
//!   embedded, the top fragments of that namespace are fetched and prepended
//!   to it; system instruction and history are left out.
//!
//! Any failure while producing the reply turns into [`FALLBACK_REPLY`]. Both
//! messages are persisted in submission order, and the first exchange of a
//! chat spawns a best-effort title generation task.

use std::sync::Arc;

use bubble_types::{Chat, Message, NewMessage, PdfId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::locks::KeyedLocks;
use crate::provider::{ChatTurn, CompletionProvider, EmbeddingProvider};
use crate::retrieval::RetrievalGateway;
use crate::session::SessionContext;
use crate::store::ChatStore;

/// Reply stored and returned when the assistant could not be reached.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't get a response from the assistant.";

const TITLE_INSTRUCTION: &str = "Write a short title (at most six words) for a conversation that \
     starts with the following message. Answer with the title only, without quotes.";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Prior messages included in plain-mode context.
    pub history_window: usize,
    /// Length of the fallback title cut from the first message.
    pub title_max_chars: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { history_window: 10, title_max_chars: 30 }
    }
}

/// Result of one exchange.
#[derive(Debug)]
pub struct Exchange {
    pub user_message: Message,
    pub assistant_message: Message,
    /// Background title generation; only present for a chat's first exchange.
    pub title_task: Option<JoinHandle<()>>,
}

pub struct Orchestrator<S> {
    store: Arc<S>,
    completion: Arc<dyn CompletionProvider>,
    embedding: Arc<dyn EmbeddingProvider>,
    retrieval: Arc<dyn RetrievalGateway>,
    settings: OrchestratorSettings,
    /// Serialises exchanges per chat so messages land in submission order.
    locks: KeyedLocks,
}

impl<S: ChatStore> Orchestrator<S> {
    pub fn new(
        store: Arc<S>,
        completion: Arc<dyn CompletionProvider>,
        embedding: Arc<dyn EmbeddingProvider>,
        retrieval: Arc<dyn RetrievalGateway>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            completion,
            embedding,
            retrieval,
            settings,
            locks: KeyedLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Send `utterance` into the chat named by `ctx` and persist the exchange.
    ///
    /// Fails only for invalid input, an unknown (or foreign) chat, or a store
    /// error; assistant failures are absorbed into [`FALLBACK_REPLY`].
    pub async fn send(&self, ctx: &SessionContext, utterance: &str) -> Result<Exchange> {
        if utterance.trim().is_empty() {
            return Err(Error::InvalidInput("message must not be empty".into()));
        }

        let _guard = self.locks.lock(&ctx.chat_id).await;
        self.exchange(ctx, utterance).await
    }

    async fn exchange(&self, ctx: &SessionContext, utterance: &str) -> Result<Exchange> {
        let chat = self
            .store
            .get_chat(&ctx.chat_id)
            .await?
            .filter(|c| c.user_id == ctx.user_id)
            .ok_or_else(|| Error::NotFound(format!("chat {}", ctx.chat_id)))?;

        let history = self.store.list_messages(&chat.id).await?;

        let user_message = self
            .store
            .append_message(NewMessage::user(&chat.id, &ctx.user_id, utterance))
            .await?;

        let reply = self.reply(&chat, &history, utterance, ctx.namespace.as_ref()).await;

        let assistant_message = self
            .store
            .append_message(NewMessage::assistant(&chat.id, &ctx.user_id, reply))
            .await?;

        let title_task = history
            .is_empty()
            .then(|| self.spawn_title(chat.id.clone(), chat.title.clone(), utterance.to_owned()));

        info!(
            chat_id = %chat.id,
            augmented = ctx.namespace.is_some(),
            first = history.is_empty(),
            "exchange stored"
        );
        Ok(Exchange { user_message, assistant_message, title_task })
    }

    async fn reply(
        &self,
        chat: &Chat,
        history: &[Message],
        utterance: &str,
        namespace: Option<&PdfId>,
    ) -> String {
        match self.try_reply(chat, history, utterance, namespace).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(chat_id = %chat.id, error = %e, "assistant reply failed; using fallback");
                FALLBACK_REPLY.to_owned()
            }
        }
    }

    async fn try_reply(
        &self,
        chat: &Chat,
        history: &[Message],
        utterance: &str,
        namespace: Option<&PdfId>,
    ) -> Result<String> {
        let turns = match namespace {
            Some(ns) => {
                let vector = self.embedding.embed(utterance).await?;
                let found = self.retrieval.query(&vector, Some(ns)).await?;
                debug!(namespace = %ns, matches = found.matches.len(), "retrieved context");
                vec![ChatTurn::user(augmented_prompt(&found.context(), utterance))]
            }
            None => plain_context(&chat.system_message, history, utterance, self.settings.history_window),
        };
        self.completion.complete(&turns).await
    }

    /// Generate a title in the background. It is only written while the chat
    /// still carries `current_title`, so a rename in the meantime wins.
    fn spawn_title(
        &self,
        chat_id: String,
        current_title: String,
        first_message: String,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let completion = Arc::clone(&self.completion);
        let max_chars = self.settings.title_max_chars;

        tokio::spawn(async move {
            let turns = [ChatTurn::system(TITLE_INSTRUCTION), ChatTurn::user(first_message.as_str())];
            let title = match completion.complete(&turns).await {
                Ok(raw) => clean_title(&raw).unwrap_or_else(|| fallback_title(&first_message, max_chars)),
                Err(e) => {
                    warn!(chat_id = %chat_id, error = %e, "title generation failed; truncating first message");
                    fallback_title(&first_message, max_chars)
                }
            };
            match store.replace_title(&chat_id, &current_title, &title).await {
                Ok(true) => debug!(chat_id = %chat_id, title = %title, "chat title updated"),
                Ok(false) => debug!(chat_id = %chat_id, "chat renamed meanwhile; keeping its title"),
                Err(e) => warn!(chat_id = %chat_id, error = %e, "failed to store chat title"),
            }
        })
    }
}

/// Plain-mode turns: system instruction, the last `window` messages, utterance.
pub fn plain_context(system: &str, history: &[Message], utterance: &str, window: usize) -> Vec<ChatTurn> {
    let recent = &history[history.len().saturating_sub(window)..];
    let mut turns = Vec::with_capacity(recent.len() + 2);
    if !system.trim().is_empty() {
        turns.push(ChatTurn::system(system));
    }
    turns.extend(recent.iter().map(|m| ChatTurn {
        role: m.sender.role().to_owned(),
        content: m.content.clone(),
    }));
    turns.push(ChatTurn::user(utterance));
    turns
}

/// Retrieved context followed by the utterance; just the utterance when the
/// context is empty.
pub fn augmented_prompt(context: &str, utterance: &str) -> String {
    if context.is_empty() {
        utterance.to_owned()
    } else {
        format!("{context}\n\n{utterance}")
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn fallback_title(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    (!title.is_empty()).then(|| title.to_owned())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

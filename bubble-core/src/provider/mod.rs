//! Completion and embedding providers.
//!
//! The orchestrator only sees the [`CompletionProvider`] and
//! [`EmbeddingProvider`] traits; [`openai::OpenAiClient`] is the
//! OpenAI-compatible implementation used in production.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use openai::{OpenAiClient, OpenAiConfig};

/// A role-tagged entry in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `"system"`, `"user"` or `"assistant"` (see `Sender::role`).
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request a single, non-streamed completion for `turns`.
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Turn a non-2xx response into [`Error::Upstream`] carrying the body text.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    Err(Error::Upstream { status, message })
}

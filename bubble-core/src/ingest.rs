//! Document ingestion.
//!
//! A document is hashed into its [`PdfId`]; if the registry already knows that
//! hash the upload is skipped, otherwise the raw file is handed to the
//! ingestion webhook (which chunks, embeds and indexes it) and the hash is
//! recorded once the webhook answers 2xx.

use std::sync::Arc;

use async_trait::async_trait;
use bubble_types::{DocumentRecord, PdfId};
use bytes::Bytes;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::locks::KeyedLocks;
use crate::provider::ensure_success;
use crate::store::DocumentRegistry;

/// Destination that turns a raw document into index entries.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    async fn submit(&self, pdf_id: &PdfId, file_name: &str, bytes: Bytes) -> Result<()>;
}

/// Posts documents to an ingestion webhook as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { http: Client::new(), url: url.into() }
    }
}

#[async_trait]
impl IngestionSink for WebhookSink {
    async fn submit(&self, pdf_id: &PdfId, file_name: &str, bytes: Bytes) -> Result<()> {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_owned())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("file", part)
            .text("pdfId", pdf_id.as_str().to_owned());

        ensure_success(self.http.post(&self.url).multipart(form).send().await?).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub pdf_id: PdfId,
    /// `true` when the hash was already registered and the upload was skipped.
    pub already_indexed: bool,
}

pub struct Ingestor<R> {
    registry: Arc<R>,
    sink: Arc<dyn IngestionSink>,
    in_flight: KeyedLocks,
}

impl<R: DocumentRegistry> Ingestor<R> {
    pub fn new(registry: Arc<R>, sink: Arc<dyn IngestionSink>) -> Self {
        Self { registry, sink, in_flight: KeyedLocks::default() }
    }

    /// Make sure the document behind `bytes` is indexed exactly once.
    pub async fn ingest(&self, file_name: &str, bytes: Bytes) -> Result<IngestOutcome> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput("uploaded file is empty".into()));
        }

        let pdf_id = PdfId::from_bytes(&bytes);
        // Concurrent uploads of the same bytes wait here; the loser sees the
        // winner's record below.
        let _guard = self.in_flight.lock(pdf_id.as_str()).await;
        if self.registry.find_document(&pdf_id).await?.is_some() {
            info!(pdf_id = %pdf_id, "document already indexed; skipping upload");
            return Ok(IngestOutcome { pdf_id, already_indexed: true });
        }

        self.sink.submit(&pdf_id, file_name, bytes).await?;
        self.registry
            .record_document(DocumentRecord {
                pdf_id: pdf_id.clone(),
                file_name: file_name.to_owned(),
                uploaded_at: Utc::now(),
            })
            .await?;

        info!(pdf_id = %pdf_id, file_name, "document submitted for indexing");
        Ok(IngestOutcome { pdf_id, already_indexed: false })
    }
}

//! Fakes shared by the unit tests in this crate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use bubble_types::{PdfId, RetrievalMatch, RetrievalResponse};
use bytes::Bytes;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::ingest::IngestionSink;
use crate::provider::{ChatTurn, CompletionProvider, EmbeddingProvider};
use crate::retrieval::RetrievalGateway;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn upstream_failure() -> Error {
    Error::Upstream { status: 500, message: "boom".into() }
}

/// Completion fake that records every request and replies from a script.
#[derive(Default)]
pub struct FakeCompletion {
    replies: Mutex<Vec<Result<String>>>,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
    gate: Option<Arc<Notify>>,
}

impl FakeCompletion {
    /// Replies are handed out in order; once exhausted every call fails.
    pub fn scripted(replies: Vec<Result<String>>) -> Self {
        Self { replies: Mutex::new(replies), requests: Mutex::default(), gate: None }
    }

    /// Every call after the first waits for `gate` to be notified.
    pub fn gated_after_first(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn replying(reply: &str) -> Self {
        Self::scripted(vec![Ok(reply.to_owned())])
    }

    pub fn failing() -> Self {
        Self::scripted(vec![Err(upstream_failure())])
    }

    pub fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let earlier = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(turns.to_vec());
            requests.len() - 1
        };
        if let Some(gate) = self.gate.as_ref().filter(|_| earlier > 0) {
            gate.notified().await;
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Err(upstream_failure())
        } else {
            replies.remove(0)
        }
    }
}

#[derive(Default)]
pub struct FakeEmbedding {
    inputs: Mutex<Vec<String>>,
}

impl FakeEmbedding {
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inputs.lock().unwrap().push(text.to_owned());
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Retrieval fake returning fixed fragment texts.
#[derive(Default)]
pub struct FakeRetrieval {
    texts: Vec<String>,
    namespaces: Mutex<Vec<Option<String>>>,
}

impl FakeRetrieval {
    pub fn with_texts(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| (*t).to_owned()).collect(),
            namespaces: Mutex::default(),
        }
    }

    pub fn namespaces(&self) -> Vec<Option<String>> {
        self.namespaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalGateway for FakeRetrieval {
    async fn query(&self, _embedding: &[f32], namespace: Option<&PdfId>) -> Result<RetrievalResponse> {
        self.namespaces
            .lock()
            .unwrap()
            .push(namespace.map(|n| n.as_str().to_owned()));
        Ok(RetrievalResponse {
            matches: self
                .texts
                .iter()
                .enumerate()
                .map(|(i, t)| RetrievalMatch {
                    id: format!("m{i}"),
                    score: 1.0 - i as f32 * 0.1,
                    metadata: Some(serde_json::json!({ "text": t })),
                })
                .collect(),
            namespace: namespace.map(|n| n.as_str().to_owned()),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<usize>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Succeeds after `delay`, leaving room for concurrent callers to race.
    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl IngestionSink for RecordingSink {
    async fn submit(&self, _pdf_id: &PdfId, _file_name: &str, _bytes: Bytes) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            Err(Error::Upstream { status: 502, message: "webhook down".into() })
        } else {
            Ok(())
        }
    }
}

//! Fakes and request helpers for the router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use http::{header, Request, Response};
use axum::Router;
use bubble_core::auth::{Identity, IdentityProvider};
use bubble_core::ingest::{IngestionSink, Ingestor};
use bubble_core::provider::{ChatTurn, CompletionProvider, EmbeddingProvider};
use bubble_core::retrieval::{PineconeIndex, RetrievalGateway};
use bubble_core::store::SqliteStore;
use bubble_core::{Error, Orchestrator, Result};
use bubble_types::{PdfId, RetrievalMatch, RetrievalResponse};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{json, Value};

use crate::config::Config;
use crate::state::AppState;

pub const ASSISTANT_REPLY: &str = "Hello from the assistant";

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Accepts `token-<user>` and nothing else.
pub struct TokenIdentity;

#[async_trait]
impl IdentityProvider for TokenIdentity {
    async fn verify(&self, token: &str) -> Result<Identity> {
        token
            .strip_prefix("token-")
            .filter(|u| !u.is_empty())
            .map(|u| Identity { user_id: u.to_owned(), email: None })
            .ok_or_else(|| Error::Unauthorized("unknown token".into()))
    }
}

pub struct FixedCompletion(Option<&'static str>);

#[async_trait]
impl CompletionProvider for FixedCompletion {
    async fn complete(&self, _turns: &[ChatTurn]) -> Result<String> {
        self.0
            .map(str::to_owned)
            .ok_or_else(|| Error::Upstream { status: 503, message: "down".into() })
    }
}

pub struct FixedEmbedding;

#[async_trait]
impl EmbeddingProvider for FixedEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3])
    }
}

pub struct FixedRetrieval;

#[async_trait]
impl RetrievalGateway for FixedRetrieval {
    async fn query(&self, _embedding: &[f32], _namespace: Option<&PdfId>) -> Result<RetrievalResponse> {
        Ok(RetrievalResponse {
            matches: vec![RetrievalMatch {
                id: "frag-1".into(),
                score: 0.9,
                metadata: Some(json!({ "text": "fragment" })),
            }],
            namespace: None,
        })
    }
}

#[derive(Default)]
pub struct CountingSink {
    calls: AtomicUsize,
}

impl CountingSink {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngestionSink for CountingSink {
    async fn submit(&self, _pdf_id: &PdfId, _file_name: &str, _bytes: Bytes) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Fixture {
    pub state: Arc<AppState>,
    pub sink: Arc<CountingSink>,
}

impl Fixture {
    pub fn app(&self) -> Router {
        crate::routes::build(Arc::clone(&self.state))
    }
}

/// App state over an in-memory store whose assistant always answers
/// [`ASSISTANT_REPLY`].
pub async fn fixture(config: Config) -> Fixture {
    build(config, Some(ASSISTANT_REPLY)).await
}

/// Same as [`fixture`] but every completion request fails.
pub async fn failing_fixture(config: Config) -> Fixture {
    build(config, None).await
}

async fn build(config: Config, reply: Option<&'static str>) -> Fixture {
    let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        Arc::new(FixedCompletion(reply)),
        Arc::new(FixedEmbedding),
        Arc::new(FixedRetrieval),
        config.orchestrator(),
    ));
    let sink = Arc::new(CountingSink::default());
    let ingestor = Arc::new(Ingestor::new(Arc::clone(&store), sink.clone() as Arc<dyn IngestionSink>));

    let state = AppState {
        vector_index: Arc::new(PineconeIndex::new(config.pinecone())),
        config: Arc::new(config),
        store,
        orchestrator,
        ingestor: Some(ingestor),
        identity: Arc::new(TokenIdentity),
    };
    Fixture { state: Arc::new(state), sink }
}

/// Request builder already carrying `user`'s bearer token.
pub fn authed(method: &str, uri: &str, user: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer token-{user}"))
}

pub fn json_request(method: &str, uri: &str, user: &str, body: Value) -> Request<Body> {
    authed(method, uri, user)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(resp: Response<Body>) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

use async_trait::async_trait;
use bubble_types::{PdfId, RetrievalResponse};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{RetrievalGateway, TOP_K};
use crate::error::{Error, Result};

pub const MISSING_API_KEY: &str = "Missing Pinecone API key";

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// `None` when the server was started without a key.
    pub api_key: Option<String>,
    /// Index host, e.g. `https://pdfai-openai-us-east-1-aws.pinecone.io`.
    pub host: String,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            host: "https://pdfai-openai-us-east-1-aws.pinecone.io".into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    vector: &'a [f64],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

/// Status and body of an upstream answer, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for the vector index `query` endpoint.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    http: Client,
    config: PineconeConfig,
}

impl PineconeIndex {
    pub fn new(config: PineconeConfig) -> Self {
        Self { http: Client::new(), config }
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Send one query and hand back the upstream status and body as-is.
    ///
    /// `embedding` is forwarded at full precision.
    ///
    /// Fails with [`Error::Config`] before any network traffic when no API key
    /// is configured.
    pub async fn query_raw(&self, embedding: &[f64], namespace: Option<&str>) -> Result<UpstreamReply> {
        let api_key = match self.config.api_key.as_deref() {
            Some(k) if !k.is_empty() => k,
            _ => return Err(Error::Config(MISSING_API_KEY.into())),
        };

        let body = QueryBody {
            vector: embedding,
            top_k: TOP_K,
            include_metadata: true,
            namespace,
        };
        let url = format!("{}/query", self.config.host.trim_end_matches('/'));
        debug!(dims = embedding.len(), namespace = ?namespace, "querying vector index");

        let resp = self
            .http
            .post(url)
            .header("Api-Key", api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(UpstreamReply { status, body })
    }
}

#[async_trait]
impl RetrievalGateway for PineconeIndex {
    async fn query(&self, embedding: &[f32], namespace: Option<&PdfId>) -> Result<RetrievalResponse> {
        let vector: Vec<f64> = embedding.iter().copied().map(f64::from).collect();
        let reply = self.query_raw(&vector, namespace.map(PdfId::as_str)).await?;
        if !reply.is_success() {
            return Err(Error::Upstream { status: reply.status, message: reply.body });
        }
        Ok(serde_json::from_str(&reply.body)?)
    }
}

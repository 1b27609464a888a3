use async_trait::async_trait;
use bubble_types::{PdfId, RetrievalQuery, RetrievalResponse};
use reqwest::Client;
use serde::Deserialize;

use super::RetrievalGateway;
use crate::error::{Error, Result};

#[derive(Deserialize)]
struct ErrorBody {
    error: serde_json::Value,
}

/// Calls a retrieval proxy (`POST {embedding, pdfId}`) instead of the index.
#[derive(Debug, Clone)]
pub struct ProxyGateway {
    http: Client,
    endpoint: String,
}

impl ProxyGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { http: Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl RetrievalGateway for ProxyGateway {
    async fn query(&self, embedding: &[f32], namespace: Option<&PdfId>) -> Result<RetrievalResponse> {
        let body = RetrievalQuery {
            embedding: embedding.to_vec(),
            pdf_id: namespace.map(|n| n.as_str().to_owned()),
        };
        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| match b.error {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or(text);
            return Err(Error::Upstream { status, message });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::serve;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};


    #[tokio::test]
    async fn posts_embedding_and_pdf_id() {
        let app = Router::new().route(
            "/q",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["pdfId"], "ns");
                assert_eq!(body["embedding"].as_array().map(Vec::len), Some(2));
                Json(json!({ "matches": [] }))
            }),
        );
        let base = serve(app).await;
        let gw = ProxyGateway::new(format!("{base}/q"));
        let resp = gw.query(&[1.0, 2.0], Some(&PdfId::from("ns"))).await.unwrap();
        assert!(resp.matches.is_empty());
    }

    #[tokio::test]
    async fn error_body_becomes_upstream_error() {
        let app = Router::new().route(
            "/q",
            post(|| async {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Missing Pinecone API key" })))
            }),
        );
        let base = serve(app).await;
        let err = ProxyGateway::new(format!("{base}/q")).query(&[1.0], None).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 500, ref message } if message == "Missing Pinecone API key"));
    }
}

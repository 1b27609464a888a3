//! Retrieval proxy: forwards a query vector to the vector index so browsers
//! never see the index credential.
//!
//! Served on `/v1/retrieval/query` and on the legacy
//! `/.netlify/functions/pinecone-query` path. Every response, errors and
//! preflights included, carries the same three permissive CORS headers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bubble_core::retrieval::pinecone::MISSING_API_KEY;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};
use utoipa::OpenApi;

use crate::state::AppState;

pub const QUERY_PATH: &str = "/v1/retrieval/query";
pub const LEGACY_QUERY_PATH: &str = "/.netlify/functions/pinecone-query";

#[derive(OpenApi)]
#[openapi(paths(query))]
pub struct RetrievalApi;

pub fn router() -> Router<Arc<AppState>> {
    let headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ));

    Router::new()
        .route(QUERY_PATH, post(query).options(preflight))
        .route(LEGACY_QUERY_PATH, post(query).options(preflight))
        .layer(headers)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn error(status: StatusCode, message: impl Into<Value>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Embedding and optional namespace pulled out of a raw request body.
fn parse_query(body: &[u8]) -> Result<(Vec<f64>, Option<String>), String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("request body is not valid JSON: {e}"))?;
    let embedding = value
        .get("embedding")
        .ok_or_else(|| "missing field `embedding`".to_owned())?
        .as_array()
        .ok_or_else(|| "`embedding` must be an array of numbers".to_owned())?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| "`embedding` must be an array of numbers".to_owned())?;
    let pdf_id = value.get("pdfId").and_then(Value::as_str).map(str::to_owned);
    Ok((embedding, pdf_id))
}

/// Query the vector index for the top fragments near `embedding`.
///
/// The upstream answer is relayed verbatim on success; a non-2xx upstream
/// status is relayed with the upstream text as the error.
#[utoipa::path(
    post,
    path = "/v1/retrieval/query",
    tag = "retrieval",
    request_body(content = Value, description = "`{\"embedding\": [f32], \"pdfId\"?: string}`"),
    responses(
        (status = 200, description = "Upstream matches, verbatim", body = Value),
        (status = 400, description = "Body is not JSON or has no numeric embedding", body = Value),
        (status = 500, description = "Missing API key, invalid upstream JSON or transport failure", body = Value),
    )
)]
pub async fn query(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if !state.vector_index.has_api_key() {
        return error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_API_KEY);
    }

    let (embedding, pdf_id) = match parse_query(&body) {
        Ok(parsed) => parsed,
        Err(reason) => {
            debug!(%reason, "rejecting retrieval query");
            return error(StatusCode::BAD_REQUEST, reason);
        }
    };

    let reply = match state.vector_index.query_raw(&embedding, pdf_id.as_deref()).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "vector index request failed");
            return error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    if !reply.is_success() {
        warn!(status = reply.status, "vector index returned an error");
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return error(status, reply.body);
    }

    if serde_json::from_str::<Value>(&reply.body).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Invalid JSON from upstream", "raw": reply.body })),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        reply.body,
    )
        .into_response()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{body_bytes, body_json, fixture, serve};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn post_body(path: &str, body: &str) -> Request<Body> {
        Request::post(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn assert_cors(resp: &Response) {
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, Authorization");
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    }

    /// Fake index that answers every query with `status` and `body`, counting hits.
    async fn fake_index(status: StatusCode, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/query",
            post(move |headers: axum::http::HeaderMap, Json(req): Json<Value>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(headers["api-key"], "secret");
                    assert_eq!(req["topK"], 3);
                    assert_eq!(req["includeMetadata"], true);
                    (status, body)
                }
            }),
        );
        (serve(app).await, hits)
    }

    fn config_for(host: &str) -> Config {
        Config {
            pinecone_api_key: Some("secret".into()),
            pinecone_host: host.to_owned(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn preflight_is_ok_with_cors_headers() {
        let fx = fixture(Config::default()).await;
        for path in [QUERY_PATH, LEGACY_QUERY_PATH] {
            let resp = fx
                .app()
                .oneshot(
                    Request::builder()
                        .method("OPTIONS")
                        .uri(path)
                        .body(Body::from("anything"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_cors(&resp);
            assert!(body_bytes(resp).await.is_empty());
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_a_fixed_500() {
        let fx = fixture(Config::default()).await;
        let resp = fx
            .app()
            .oneshot(post_body(QUERY_PATH, r#"{"embedding":[0.1]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_cors(&resp);
        assert_eq!(body_json(resp).await, json!({ "error": "Missing Pinecone API key" }));
    }

    #[tokio::test]
    async fn malformed_bodies_never_reach_upstream() {
        let (host, hits) = fake_index(StatusCode::OK, "{}").await;
        let fx = fixture(config_for(&host)).await;

        for body in ["not json", r#"{"pdfId":"x"}"#, r#"{"embedding":"0.1"}"#, r#"{"embedding":[1,"a"]}"#] {
            let resp = fx.app().oneshot(post_body(QUERY_PATH, body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert_cors(&resp);
            assert!(body_json(resp).await["error"].is_string());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_error_status_is_relayed() {
        let (host, _) = fake_index(StatusCode::FORBIDDEN, "forbidden namespace").await;
        let fx = fixture(config_for(&host)).await;
        let resp = fx
            .app()
            .oneshot(post_body(LEGACY_QUERY_PATH, r#"{"embedding":[0.1,0.2],"pdfId":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_cors(&resp);
        assert_eq!(body_json(resp).await, json!({ "error": "forbidden namespace" }));
    }

    #[tokio::test]
    async fn non_json_upstream_body_is_reported_with_raw_text() {
        let (host, _) = fake_index(StatusCode::OK, "<html>oops</html>").await;
        let fx = fixture(config_for(&host)).await;
        let resp = fx
            .app()
            .oneshot(post_body(QUERY_PATH, r#"{"embedding":[0.1]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({ "error": "Invalid JSON from upstream", "raw": "<html>oops</html>" })
        );
    }

    #[tokio::test]
    async fn success_relays_upstream_body_verbatim() {
        let upstream = r#"{"matches":[{"id":"a","score":0.9,"metadata":{"text":"hi"}}],"namespace":"abc"}"#;
        let (host, hits) = fake_index(StatusCode::OK, upstream).await;
        let fx = fixture(config_for(&host)).await;
        let resp = fx
            .app()
            .oneshot(post_body(QUERY_PATH, r#"{"embedding":[0.1,0.2,0.3],"pdfId":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_cors(&resp);
        assert_eq!(body_bytes(resp).await, upstream.as_bytes());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn embedding_is_forwarded_at_full_precision() {
        let received = Arc::new(std::sync::Mutex::new(None::<Value>));
        let sink = received.clone();
        let app = Router::new().route(
            "/query",
            post(move |Json(req): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(req);
                    Json(json!({ "matches": [] }))
                }
            }),
        );
        let fx = fixture(config_for(&serve(app).await)).await;

        let resp = fx
            .app()
            .oneshot(post_body(
                QUERY_PATH,
                r#"{"embedding":[1e40,0.123456789012345,-2.5e-8],"pdfId":"abc"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = received.lock().unwrap().take().unwrap();
        assert_eq!(req["vector"], json!([1e40, 0.123456789012345, -2.5e-8]));
        assert_eq!(req["namespace"], "abc");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_500() {
        let fx = fixture(config_for("http://127.0.0.1:1")).await;
        let resp = fx
            .app()
            .oneshot(post_body(QUERY_PATH, r#"{"embedding":[0.1]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(resp).await["error"].is_string());
    }
}

//! Per-request tracing.
//!
//! Every request runs inside an `http_request` span carrying a trace id taken
//! from the `x-trace-id` header (or freshly generated) and echoed back on the
//! response. Small JSON bodies are logged at debug level; anything else
//! (multipart uploads, event streams) passes through unbuffered.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies larger than this are never buffered for logging.
const MAX_LOGGED_BODY: usize = 1024;

pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        debug!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let response = match log_json_body("request", &parts.headers, body).await {
            Ok(body) => {
                let mut req = Request::from_parts(parts, body);
                if let Some(v) = &header_value {
                    req.headers_mut().insert(X_TRACE_ID, v.clone());
                }
                let response = next.run(req).await;

                let (parts, body) = response.into_parts();
                match log_json_body("response", &parts.headers, body).await {
                    Ok(body) => Response::from_parts(parts, body),
                    Err(e) => ServerError::Internal(format!("failed to read response body: {e}"))
                        .into_response(),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                ServerError::BadRequest("failed to read request body".into()).into_response()
            }
        };

        let (mut parts, body) = response.into_parts();
        if let Some(v) = header_value {
            parts.headers.insert(X_TRACE_ID, v);
        }
        let response = Response::from_parts(parts, body);

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

fn is_small_json(headers: &HeaderMap) -> bool {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let small = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= MAX_LOGGED_BODY);
    is_json && small
}

/// Log a small JSON body and hand back an equivalent one; other bodies are
/// returned untouched.
async fn log_json_body(direction: &str, headers: &HeaderMap, body: Body) -> Result<Body, axum::Error> {
    if !is_small_json(headers) {
        return Ok(body);
    }
    let bytes: Bytes = body.collect().await?.to_bytes();
    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!("{direction} body: {text}");
    }
    Ok(Body::from(bytes))
}

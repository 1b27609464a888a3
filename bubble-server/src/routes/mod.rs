//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - health route (unauthenticated)
//! - the chat API under `/v1`, behind bearer-token auth and the CORS layer
//! - the retrieval proxy, which carries its own fixed CORS headers
//! - optional Swagger UI (disable with `BUBBLE_ENABLE_SWAGGER=false`)
//! - per-request trace-ID middleware around everything

pub mod doc;
mod health;
mod retrieval;
mod v1;

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{auth, cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let chat_api = v1::router(&state).route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::auth_middleware,
    ));

    let api_router = Router::new()
        .merge(health::router())
        .nest("/v1", chat_api)
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)));

    let mut app = Router::new().merge(api_router).merge(retrieval::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(middleware::from_fn_with_state(
        state.clone(),
        trace::trace_middleware,
    ))
    .with_state(state)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::test_support::fixture;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn trace_id_is_echoed_back() {
        let fx = fixture(Config::default()).await;
        let id = "6f1c2a3e-8f2d-4b7a-9c1d-2e3f4a5b6c7d";
        let resp = fx
            .app()
            .oneshot(Request::get("/health").header(trace::X_TRACE_ID, id).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[trace::X_TRACE_ID], id);
    }

    #[tokio::test]
    async fn unreadable_json_request_body_is_rejected() {
        let fx = fixture(Config::default()).await;
        let chunks = futures::stream::iter(vec![Err::<bytes::Bytes, _>(std::io::Error::other("reset"))]);
        let req = Request::post("/v1/retrieval/query")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "10")
            .body(Body::from_stream(chunks))
            .unwrap();

        let resp = fx.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers().contains_key(trace::X_TRACE_ID));
        assert_eq!(
            crate::test_support::body_json(resp).await,
            serde_json::json!({ "error": "failed to read request body" })
        );
    }

    #[tokio::test]
    async fn swagger_can_be_disabled() {
        let enabled = fixture(Config::default()).await;
        let resp = enabled
            .app()
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let disabled = fixture(Config { enable_swagger: false, ..Config::default() }).await;
        let resp = disabled
            .app()
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_api_answers_cors_preflight_without_auth() {
        let fx = fixture(Config::default()).await;
        let resp = fx
            .app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/v1/chats")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}

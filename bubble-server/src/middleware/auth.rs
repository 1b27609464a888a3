//! Bearer-token authentication for the chat API.
//!
//! A verified [`Identity`] is stored in the request extensions for handlers to
//! extract. Unauthenticated browsers are redirected to the sign-in page; other
//! clients get a 401 JSON body naming it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use bubble_core::auth::{Identity, IdentityProvider};
use serde_json::json;
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

/// Identity provider used when none is configured: every token is refused.
pub struct RejectAll;

#[async_trait]
impl IdentityProvider for RejectAll {
    async fn verify(&self, _token: &str) -> bubble_core::Result<Identity> {
        Err(bubble_core::Error::Unauthorized("no identity provider configured".into()))
    }
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned());

    let verified = match token {
        Some(t) => state.identity.verify(&t).await,
        None => Err(bubble_core::Error::Unauthorized("missing bearer token".into())),
    };

    match verified {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(bubble_core::Error::Unauthorized(reason)) => {
            debug!(reason = %reason, path = %req.uri().path(), "rejecting unauthenticated request");
            unauthenticated(&req, &state.config.sign_in_url)
        }
        // The identity provider itself failed; the token was never judged.
        Err(e) => ServerError::from(e).into_response(),
    }
}

fn unauthenticated(req: &Request<Body>, sign_in_url: &str) -> Response {
    let wants_html = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));

    if wants_html {
        Redirect::to(sign_in_url).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorised", "signIn": sign_in_url })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use bubble_core::auth::UserInfoIdentity;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::test_support::{authed, fixture, serve, Fixture};

    async fn with_identity(identity: Arc<dyn IdentityProvider>) -> Fixture {
        let mut fx = fixture(Config::default()).await;
        let mut state = (*fx.state).clone();
        state.identity = identity;
        fx.state = Arc::new(state);
        fx
    }

    #[tokio::test]
    async fn failing_identity_provider_is_a_bad_gateway() {
        let upstream = serve(Router::new().route(
            "/userinfo",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }),
        ))
        .await;
        let fx = with_identity(Arc::new(UserInfoIdentity::new(format!("{upstream}/userinfo")))).await;

        let req = authed("GET", "/v1/chats", "alice")
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();
        let resp = fx.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn unreachable_identity_provider_is_a_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let fx = with_identity(Arc::new(UserInfoIdentity::new(format!("http://{addr}/userinfo")))).await;

        let req = authed("GET", "/v1/chats", "alice").body(Body::empty()).unwrap();
        let resp = fx.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn rejected_token_still_redirects_browsers() {
        let upstream = serve(Router::new().route(
            "/userinfo",
            get(|| async { StatusCode::UNAUTHORIZED }),
        ))
        .await;
        let fx = with_identity(Arc::new(UserInfoIdentity::new(format!("{upstream}/userinfo")))).await;

        let req = authed("GET", "/v1/chats", "alice")
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();
        let resp = fx.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }
}

pub mod chats;
pub mod documents;

use crate::state::AppState;
use utoipa::OpenApi;

use axum::Router;
use std::sync::Arc;

/// Routes nested under `/v1`; every one of them requires a bearer token.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .merge(chats::router())
        .merge(documents::router(state.config.max_upload_bytes))
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut docs = V1Api::openapi();
    docs.merge(chats::ChatsApi::openapi());
    docs.merge(documents::DocumentsApi::openapi());
    docs
}

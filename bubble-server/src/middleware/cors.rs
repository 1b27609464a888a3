use crate::state::AppState;
use tower_http::cors::{Any, CorsLayer};

/// CORS for the chat API.
///
/// `BUBBLE_CORS_ORIGINS` restricts the allowed origins; without it (or when
/// nothing in it parses) any origin is accepted. The retrieval proxy carries
/// its own fixed headers and is not wrapped by this layer.
pub fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .map(|list| list.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    let layer = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

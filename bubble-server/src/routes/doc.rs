use crate::routes::{health, retrieval, v1};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "bubble-server",
    description = "chat-bubble API: chats, messages, document upload and the retrieval proxy",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(retrieval::RetrievalApi::openapi());
    root.merge(v1::api_docs());
    root
}

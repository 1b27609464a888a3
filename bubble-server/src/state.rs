//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use bubble_core::auth::{IdentityProvider, UserInfoIdentity};
use bubble_core::ingest::{Ingestor, WebhookSink};
use bubble_core::provider::OpenAiClient;
use bubble_core::retrieval::{PineconeIndex, ProxyGateway, RetrievalGateway};
use bubble_core::store::SqliteStore;
use bubble_core::Orchestrator;

use crate::config::Config;
use crate::middleware::auth::RejectAll;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Chats, messages and document hashes.
    pub store: Arc<SqliteStore>,
    pub orchestrator: Arc<Orchestrator<SqliteStore>>,
    /// `None` when no ingestion webhook is configured.
    pub ingestor: Option<Arc<Ingestor<SqliteStore>>>,
    /// Vector index behind the retrieval proxy.
    pub vector_index: Arc<PineconeIndex>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Wire the production clients described by `config` around `store`.
    pub fn new(config: Config, store: SqliteStore) -> Self {
        let store = Arc::new(store);
        let openai = Arc::new(OpenAiClient::new(config.openai()));
        let vector_index = Arc::new(PineconeIndex::new(config.pinecone()));

        let retrieval: Arc<dyn RetrievalGateway> = match &config.retrieval_proxy_url {
            Some(url) => Arc::new(ProxyGateway::new(url.clone())),
            None => vector_index.clone(),
        };

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            openai.clone(),
            openai,
            retrieval,
            config.orchestrator(),
        ));

        let ingestor = config.ingest_webhook_url.as_ref().map(|url| {
            Arc::new(Ingestor::new(Arc::clone(&store), Arc::new(WebhookSink::new(url.clone()))))
        });

        let identity: Arc<dyn IdentityProvider> = match &config.userinfo_url {
            Some(url) => Arc::new(UserInfoIdentity::new(url.clone())),
            None => Arc::new(RejectAll),
        };

        Self {
            config: Arc::new(config),
            store,
            orchestrator,
            ingestor,
            vector_index,
            identity,
        }
    }
}

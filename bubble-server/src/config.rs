//! Server configuration, loaded from environment variables at startup.

use bubble_core::provider::OpenAiConfig;
use bubble_core::retrieval::PineconeConfig;
use bubble_core::OrchestratorSettings;

/// Runtime configuration for bubble-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; features whose upstream is not configured answer with an
/// error instead of failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://bubble.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated origins allowed to call the chat API. `None` = any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,

    /// Prior messages included in plain-mode prompts.
    pub history_window: usize,
    /// Fallback title length when title generation fails.
    pub title_max_chars: usize,
    pub default_chat_title: String,
    pub default_system_message: String,

    /// Vector index credential; the retrieval proxy answers 500 without it.
    pub pinecone_api_key: Option<String>,
    pub pinecone_host: String,
    /// When set, the orchestrator queries this retrieval proxy instead of
    /// calling the vector index directly.
    pub retrieval_proxy_url: Option<String>,

    /// Ingestion webhook; uploads are refused when unset.
    pub ingest_webhook_url: Option<String>,
    /// Largest accepted document upload in bytes.
    pub max_upload_bytes: usize,

    /// Identity provider user-info endpoint used to verify bearer tokens.
    pub userinfo_url: Option<String>,
    /// Where unauthenticated browsers are sent.
    pub sign_in_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        let num = |key: &str, default: usize| {
            lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        let openai = OpenAiConfig::default();
        let pinecone = PineconeConfig::default();
        let orchestrator = OrchestratorSettings::default();

        Self {
            bind_address: get("BUBBLE_BIND", "0.0.0.0:3000"),
            database_url: get("BUBBLE_DATABASE_URL", "sqlite://bubble.db"),
            log_level: get("BUBBLE_LOG", "info"),
            log_json: flag("BUBBLE_LOG_JSON", false),
            cors_allowed_origins: opt("BUBBLE_CORS_ORIGINS"),
            enable_swagger: flag("BUBBLE_ENABLE_SWAGGER", true),
            openai_api_key: get("OPENAI_API_KEY", ""),
            openai_base_url: get("BUBBLE_OPENAI_BASE_URL", &openai.base_url),
            chat_model: get("BUBBLE_CHAT_MODEL", &openai.chat_model),
            embedding_model: get("BUBBLE_EMBEDDING_MODEL", &openai.embedding_model),
            history_window: num("BUBBLE_HISTORY_WINDOW", orchestrator.history_window),
            title_max_chars: num("BUBBLE_TITLE_MAX_CHARS", orchestrator.title_max_chars),
            default_chat_title: get("BUBBLE_DEFAULT_CHAT_TITLE", "New Chat"),
            default_system_message: get(
                "BUBBLE_DEFAULT_SYSTEM_MESSAGE",
                "You are a helpful assistant.",
            ),
            pinecone_api_key: opt("PINECONE_API_KEY"),
            pinecone_host: get("BUBBLE_PINECONE_HOST", &pinecone.host),
            retrieval_proxy_url: opt("BUBBLE_RETRIEVAL_PROXY_URL"),
            ingest_webhook_url: opt("BUBBLE_INGEST_WEBHOOK_URL"),
            max_upload_bytes: num("BUBBLE_MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            userinfo_url: opt("BUBBLE_USERINFO_URL"),
            sign_in_url: get("BUBBLE_SIGN_IN_URL", "/login"),
        }
    }

    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
        }
    }

    pub fn pinecone(&self) -> PineconeConfig {
        PineconeConfig {
            api_key: self.pinecone_api_key.clone(),
            host: self.pinecone_host.clone(),
        }
    }

    pub fn orchestrator(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            history_window: self.history_window,
            title_max_chars: self.title_max_chars,
        }
    }
}

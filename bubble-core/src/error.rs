use thiserror::Error;

/// Errors returned by bubble-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An HTTP request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Propagated from the SQLite (or other) store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded schema migrations failed to apply.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// An upstream service answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// An upstream body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// The caller supplied input that is rejected before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced resource does not exist (or is not visible to the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// Token verification failed.
    #[error("unauthorised: {0}")]
    Unauthorized(String),

    /// A required setting is missing.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content hash of an uploaded document.
///
/// Doubles as the deduplication key for ingestion and the namespace that
/// scopes vector queries, so identical bytes always map to the same index
/// partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PdfId(String);

impl PdfId {
    /// Lowercase hex SHA-256 of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for PdfId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PdfId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for PdfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document that has been handed to the ingestion webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub pdf_id: PdfId,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

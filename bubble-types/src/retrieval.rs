//! Wire types for the retrieval proxy and the vector index behind it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body accepted by the retrieval proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalQuery {
    pub embedding: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pdf_id: Option<String>,
}

/// One nearest-neighbour hit returned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RetrievalMatch {
    /// The fragment text stored under `metadata.text`, if any.
    pub fn text(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("text")?.as_str()
    }
}

/// Vector index query response (extra fields are ignored).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    #[serde(default)]
    pub matches: Vec<RetrievalMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl RetrievalResponse {
    /// Newline-joined fragment texts; empty when nothing matched.
    pub fn context(&self) -> String {
        self.matches
            .iter()
            .filter_map(RetrievalMatch::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

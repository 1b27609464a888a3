use bubble_core::ingest::IngestOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Hex SHA-256 of the uploaded bytes; doubles as the retrieval namespace.
    pub pdf_id: String,
    pub already_indexed: bool,
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            pdf_id: outcome.pdf_id.into_inner(),
            already_indexed: outcome.already_indexed,
        }
    }
}

//! Retrieval gateway: top-K similar fragments for a query vector.
//!
//! [`pinecone::PineconeIndex`] talks to the hosted vector index directly.
//! [`proxy::ProxyGateway`] speaks the retrieval proxy's HTTP contract, for
//! deployments where the index is only reachable through such a proxy.

pub mod pinecone;
pub mod proxy;

use async_trait::async_trait;
use bubble_types::{PdfId, RetrievalResponse};

use crate::error::Result;

pub use pinecone::{PineconeConfig, PineconeIndex, UpstreamReply};
pub use proxy::ProxyGateway;

/// Number of fragments requested per query.
pub const TOP_K: usize = 3;

#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    /// Return the [`TOP_K`] nearest fragments to `embedding` inside `namespace`.
    async fn query(&self, embedding: &[f32], namespace: Option<&PdfId>) -> Result<RetrievalResponse>;
}

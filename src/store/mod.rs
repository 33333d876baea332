//! Embedding/search backend boundary
//!
//! The pipeline consumes the store as a capability: nearest-neighbor search
//! over chunks plus whole-conversation fetch. [`ElasticStore`] talks to an
//! Elasticsearch index over HTTP; [`MemoryStore`] is an in-process double for
//! tests and local runs.

pub mod elastic;
pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::filter::FilterExpression;
use crate::schema::{Chunk, ScoredChunk};

pub use elastic::ElasticStore;
pub use memory::MemoryStore;

/// Read-only access to the chunk corpus.
#[async_trait]
pub trait EmailStore: Send + Sync {
    /// Nearest-neighbor search with optional boosted filter.
    ///
    /// Returned chunks carry `vector_score` (and `combined_score` initialized
    /// to the same value) plus the boost categories their documents matched.
    /// An empty list is a valid zero-hit result; unreachable backends surface
    /// as [`StoreError::Unavailable`].
    async fn similarity_search(
        &self,
        query: &str,
        filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    /// Fetch every chunk of one conversation, sorted by `chunk_index`.
    async fn chunks_by_conversation(&self, conversation_id: &str)
        -> Result<Vec<Chunk>, StoreError>;
}

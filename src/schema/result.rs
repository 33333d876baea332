//! Retrieval result schema

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::filter::FilterExpression;
use crate::processor::ConversationGroup;
use crate::schema::{QueryAnalysis, ScoredChunk};

/// Projection mode for the top results. The two modes are mutually exclusive
/// and discriminated explicitly, never by inspecting which field happens to
/// be populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TopSelection {
    /// Flattened, truncation-processed chunks of the top-ranked conversations
    Conversations(Vec<ScoredChunk>),
    /// Top individual chunks across all conversations
    Chunks(Vec<ScoredChunk>),
}

impl TopSelection {
    pub fn chunks(&self) -> &[ScoredChunk] {
        match self {
            TopSelection::Conversations(chunks) | TopSelection::Chunks(chunks) => chunks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks().is_empty()
    }
}

/// Everything the retrieval pipeline produced for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Original query text
    pub query: String,
    /// Query analysis, absent when the analyzer failed or was skipped
    pub analysis: Option<QueryAnalysis>,
    /// Boosted filter expression used for retrieval, absent when analysis was
    /// unavailable or produced no confident facets
    pub filter: Option<FilterExpression>,
    /// All touched conversations with their complete chunk sets
    pub conversation_groups: HashMap<String, ConversationGroup>,
    /// Top-k projection in the requested mode
    pub selection: TopSelection,
}

impl RetrievalResult {
    /// Look up a chunk anywhere in the result by its manifest id.
    pub fn chunk_by_id(&self, chunk_id: &str) -> Option<&ScoredChunk> {
        let index: u32 = chunk_id.parse().ok()?;
        self.conversation_groups
            .values()
            .flat_map(|group| group.chunks.iter())
            .find(|scored| scored.chunk.metadata.chunk_index == index)
    }
}

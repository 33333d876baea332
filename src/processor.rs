//! Conversation grouping and selection
//!
//! Retrieval returns the chunks that matched well, but downstream context
//! needs whole threads. The processor re-fetches the complete chunk set for
//! every touched conversation, re-applies the known scores onto the subset
//! that matched, and ranks conversations by their best chunk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::StoreError;
use crate::schema::{BoostCategory, ScoredChunk};
use crate::store::EmailStore;

/// One conversation with its complete chunk set and per-query rank key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationGroup {
    pub conversation_id: String,
    /// All chunks of the conversation; only the ones that appeared in the
    /// raw hit list carry non-zero scores
    pub chunks: Vec<ScoredChunk>,
    /// Best-evidence-wins rank key: max combined score across chunks
    pub max_score: f64,
}

/// Groups raw hits into complete conversations.
pub struct ConversationProcessor {
    store: Arc<dyn EmailStore>,
    /// Character cap for chunks below the relevance threshold
    pub max_chunk_length: usize,
    /// Chunks scoring above this keep their full length
    pub high_relevance_threshold: f64,
}

impl ConversationProcessor {
    pub fn new(store: Arc<dyn EmailStore>) -> Self {
        Self {
            store,
            max_chunk_length: 1000,
            high_relevance_threshold: 0.7,
        }
    }

    /// Group hits by conversation, re-fetching the full chunk set per
    /// conversation from the store.
    ///
    /// A conversation whose re-fetch comes back empty (store inconsistency)
    /// is logged and skipped, never fatal.
    pub async fn group_conversations(
        &self,
        hits: &[ScoredChunk],
    ) -> Result<HashMap<String, ConversationGroup>, StoreError> {
        // Scores from the hit list, keyed by (conversation, chunk index)
        let mut known_scores: HashMap<(&str, u32), (f64, f64, &[BoostCategory])> = HashMap::new();
        for hit in hits {
            known_scores.insert(
                (
                    hit.chunk.metadata.conversation_id.as_str(),
                    hit.chunk.metadata.chunk_index,
                ),
                (hit.combined_score, hit.vector_score, &hit.boosts),
            );
        }

        let mut groups = HashMap::new();

        for hit in hits {
            let conv_id = hit.chunk.metadata.conversation_id.as_str();
            if groups.contains_key(conv_id) {
                continue;
            }

            let full_set = self.store.chunks_by_conversation(conv_id).await?;
            if full_set.is_empty() {
                tracing::warn!(conversation_id = conv_id, "no chunks found on re-fetch, skipping");
                continue;
            }

            let chunks: Vec<ScoredChunk> = full_set
                .into_iter()
                .map(|chunk| {
                    let key = (conv_id, chunk.metadata.chunk_index);
                    match known_scores.get(&key) {
                        Some(&(combined, vector, boosts)) => ScoredChunk {
                            chunk,
                            vector_score: vector,
                            combined_score: combined,
                            boosts: boosts.to_vec(),
                        },
                        // Chunks outside the hit list keep zero scores
                        None => ScoredChunk::unscored(chunk),
                    }
                })
                .collect();

            let max_score = chunks
                .iter()
                .map(|c| c.combined_score)
                .fold(f64::NEG_INFINITY, f64::max);

            groups.insert(
                conv_id.to_string(),
                ConversationGroup {
                    conversation_id: conv_id.to_string(),
                    chunks,
                    max_score,
                },
            );
        }

        Ok(groups)
    }

    /// Select the top conversations and return their chunks as one flat,
    /// truncation-processed list.
    pub fn select_top_conversations(
        &self,
        groups: &HashMap<String, ConversationGroup>,
        max_conversations: usize,
    ) -> Vec<ScoredChunk> {
        let mut sorted: Vec<&ConversationGroup> = groups.values().collect();
        sorted.sort_by(|a, b| {
            b.max_score
                .partial_cmp(&a.max_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });

        let mut selected = Vec::new();
        for group in sorted.into_iter().take(max_conversations) {
            let mut chunks = group.chunks.clone();
            order_for_presentation(&mut chunks);
            for chunk in chunks {
                selected.push(self.apply_truncation(chunk));
            }
        }
        selected
    }

    /// High scorers keep full length; everything else is cut to the character
    /// cap with an ellipsis, but every chunk stays present.
    fn apply_truncation(&self, mut scored: ScoredChunk) -> ScoredChunk {
        if scored.combined_score > self.high_relevance_threshold {
            return scored;
        }
        scored.chunk.text = truncate_text(&scored.chunk.text, self.max_chunk_length);
        scored
    }
}

/// Presentation order inside a conversation: the email-body chunk first
/// (narrative anchor), then attachments by descending score.
pub fn order_for_presentation(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        let a_body = a.chunk.metadata.chunk_type.is_email_body();
        let b_body = b.chunk.metadata.chunk_type.is_email_body();
        b_body.cmp(&a_body).then_with(|| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
}

/// Character-cap truncation with an ellipsis marker.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

//! In-memory email store
//!
//! Test double with real semantics: seeded per-chunk vector scores stand in
//! for the embedding distance, and the filter expression is evaluated locally
//! to reproduce the backend's matched-clause reporting. Also usable for small
//! local corpora.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::errors::StoreError;
use crate::filter::FilterExpression;
use crate::schema::{Chunk, ScoredChunk};

use super::EmailStore;

struct SeededChunk {
    chunk: Chunk,
    vector_score: f64,
}

/// In-process store over a seeded chunk set.
#[derive(Default)]
pub struct MemoryStore {
    chunks: Mutex<Vec<SeededChunk>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one chunk with the vector score it should receive for any query.
    pub fn add_chunk(&self, chunk: Chunk, vector_score: f64) {
        self.chunks
            .lock()
            .expect("store poisoned")
            .push(SeededChunk {
                chunk,
                vector_score,
            });
    }

    /// Simulate an unreachable backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EmailStore for MemoryStore {
    async fn similarity_search(
        &self,
        _query: &str,
        filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.check_available()?;

        let chunks = self.chunks.lock().expect("store poisoned");
        let mut hits: Vec<ScoredChunk> = chunks
            .iter()
            .map(|seeded| {
                let boosts = filter
                    .map(|f| f.matched_categories(&seeded.chunk))
                    .unwrap_or_default();
                ScoredChunk {
                    chunk: seeded.chunk.clone(),
                    vector_score: seeded.vector_score,
                    combined_score: seeded.vector_score,
                    boosts,
                }
            })
            .collect();

        // Stable sort keeps seed order for tied scores
        hits.sort_by(|a, b| {
            b.vector_score
                .partial_cmp(&a.vector_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn chunks_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Chunk>, StoreError> {
        self.check_available()?;

        let chunks = self.chunks.lock().expect("store poisoned");
        let mut matched: Vec<Chunk> = chunks
            .iter()
            .filter(|seeded| seeded.chunk.metadata.conversation_id == conversation_id)
            .map(|seeded| seeded.chunk.clone())
            .collect();
        matched.sort_by_key(|chunk| chunk.metadata.chunk_index);
        Ok(matched)
    }
}

//! Retriever strategies
//!
//! Three interchangeable strategies behind one contract. All are
//! result-order-stable: sorting is stable, so tied scores keep store order.
//! A store failure propagates; an empty hit list is a valid result.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::StoreError;
use crate::filter::FilterExpression;
use crate::schema::{QueryAnalysis, ScoredChunk};
use crate::store::EmailStore;

/// Common retrieval contract.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `k` scored chunks for the query. Strategies that use
    /// metadata signals consume `analysis`/`filter`; without analysis they
    /// degrade to the pure vector path.
    async fn retrieve(
        &self,
        query: &str,
        analysis: Option<&QueryAnalysis>,
        filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
}

/// Weighted-average combination of vector and metadata scores.
pub(crate) fn weighted_combine(
    vector_score: f64,
    metadata_score: f64,
    vector_weight: f64,
    metadata_weight: f64,
) -> f64 {
    (vector_weight * vector_score + metadata_weight * metadata_score)
        / (vector_weight + metadata_weight)
}

/// Multiplicative combination: metadata amplifies the vector score, so zero
/// metadata match leaves the raw score untouched.
pub(crate) fn multiplicative_combine(vector_score: f64, metadata_score: f64) -> f64 {
    vector_score * (1.0 + metadata_score)
}

fn sort_by_combined(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Pure vector similarity. Baseline and fallback strategy; ignores filters.
pub struct VectorRetriever {
    store: Arc<dyn EmailStore>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn EmailStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(
        &self,
        query: &str,
        _analysis: Option<&QueryAnalysis>,
        _filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let mut results = self.store.similarity_search(query, None, k).await?;
        for result in &mut results {
            result.combined_score = result.vector_score;
        }
        Ok(results)
    }
}

/// Additive combination: vector similarity and metadata match averaged by
/// weight. Metadata is a secondary signal under the default 0.7/0.3 split.
pub struct WeightedAverageRetriever {
    store: Arc<dyn EmailStore>,
    vector_weight: f64,
    metadata_weight: f64,
}

impl WeightedAverageRetriever {
    pub fn new(store: Arc<dyn EmailStore>) -> Self {
        Self::with_weights(store, 0.7, 0.3)
    }

    pub fn with_weights(
        store: Arc<dyn EmailStore>,
        vector_weight: f64,
        metadata_weight: f64,
    ) -> Self {
        Self {
            store,
            vector_weight,
            metadata_weight,
        }
    }
}

#[async_trait]
impl Retriever for WeightedAverageRetriever {
    async fn retrieve(
        &self,
        query: &str,
        analysis: Option<&QueryAnalysis>,
        filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if analysis.is_none() {
            let mut results = self.store.similarity_search(query, None, k).await?;
            for result in &mut results {
                result.combined_score = result.vector_score;
            }
            return Ok(results);
        }

        let mut results = self.store.similarity_search(query, filter, k).await?;
        for result in &mut results {
            result.combined_score = weighted_combine(
                result.vector_score,
                result.metadata_score(),
                self.vector_weight,
                self.metadata_weight,
            );
        }
        sort_by_combined(&mut results);
        Ok(results)
    }
}

/// Multiplicative combination: `vector_score * (1 + metadata_score)`.
///
/// Rewards multi-signal agreement more sharply than averaging; the
/// recommended default strategy.
pub struct MultiplicativeRetriever {
    store: Arc<dyn EmailStore>,
}

impl MultiplicativeRetriever {
    pub fn new(store: Arc<dyn EmailStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for MultiplicativeRetriever {
    async fn retrieve(
        &self,
        query: &str,
        analysis: Option<&QueryAnalysis>,
        filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if analysis.is_none() {
            let mut results = self.store.similarity_search(query, None, k).await?;
            for result in &mut results {
                result.combined_score = result.vector_score;
            }
            return Ok(results);
        }

        let mut results = self.store.similarity_search(query, filter, k).await?;
        for result in &mut results {
            result.combined_score =
                multiplicative_combine(result.vector_score, result.metadata_score());
        }
        sort_by_combined(&mut results);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BoostCategory, Chunk, ChunkMetadata, ChunkType};
    use crate::store::MemoryStore;
    use quickcheck_macros::quickcheck;

    fn chunk(conversation_id: &str, chunk_index: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                conversation_id: conversation_id.to_string(),
                subject: "subject".to_string(),
                sender_name: "sender".to_string(),
                sender_email: "sender@example.com".to_string(),
                year: 2024,
                month: 6,
                day: 1,
                chunk_type: ChunkType::EmailBody,
                chunk_index,
                total_chunks: 1,
                attachment_metadata: None,
            },
        }
    }

    fn bare_analysis() -> QueryAnalysis {
        QueryAnalysis {
            thought_process: Vec::new(),
            company_info: Default::default(),
            temporal_info: Default::default(),
            content_info: Default::default(),
            original_query: "q".to_string(),
        }
    }

    #[quickcheck]
    fn prop_multiplicative_monotone_in_matches(vector_milli: u16) -> bool {
        // vector_score fixed and positive; combined must be non-decreasing in
        // match count and equal to the raw score at zero matches
        let vector_score = (vector_milli % 1000) as f64 / 1000.0 + 0.001;
        let scores: Vec<f64> = (0..=BoostCategory::COUNT)
            .map(|matches| {
                multiplicative_combine(vector_score, matches as f64 / BoostCategory::COUNT as f64)
            })
            .collect();
        let monotone = scores.windows(2).all(|w| w[1] >= w[0]);
        monotone && (scores[0] - vector_score).abs() < 1e-12
    }

    #[test]
    fn test_weighted_combine_normalizes() {
        // Full metadata match and full vector score stay at 1.0
        assert!((weighted_combine(1.0, 1.0, 0.7, 0.3) - 1.0).abs() < 1e-12);
        // Zero metadata pulls the score down proportionally
        assert!((weighted_combine(1.0, 0.0, 0.7, 0.3) - 0.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_vector_retriever_ignores_filter() {
        let store = Arc::new(MemoryStore::new());
        store.add_chunk(chunk("c1", 0, "Samsung earnings"), 0.8);

        let retriever = VectorRetriever::new(store);
        let filter = FilterExpression::default();
        let hits = retriever
            .retrieve("q", Some(&bare_analysis()), Some(&filter), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].combined_score, hits[0].vector_score);
        assert!(hits[0].boosts.is_empty());
    }

    #[tokio::test]
    async fn test_multiplicative_without_analysis_is_vector_path() {
        let store = Arc::new(MemoryStore::new());
        store.add_chunk(chunk("c1", 0, "text"), 0.6);

        let retriever = MultiplicativeRetriever::new(store);
        let hits = retriever.retrieve("q", None, None, 10).await.unwrap();
        assert_eq!(hits[0].combined_score, 0.6);
    }

    #[tokio::test]
    async fn test_store_unavailable_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);

        let retriever = MultiplicativeRetriever::new(store);
        let err = retriever.retrieve("q", None, None, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}

//! Elasticsearch-backed email store
//!
//! Uses the `_search` API directly: a knn clause built from the query
//! embedding, with the boosted filter expression attached so matched clause
//! names come back in `matched_queries`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::StoreError;
use crate::filter::FilterExpression;
use crate::llm::Embedder;
use crate::schema::{BoostCategory, Chunk, ScoredChunk};

use super::EmailStore;

/// Maximum chunks fetched for a single conversation
const CONVERSATION_FETCH_SIZE: usize = 100;

/// Elasticsearch store configuration
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub index: String,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: "elastic".to_string(),
            password: String::new(),
            index: "emails".to_string(),
        }
    }
}

/// HTTP client for an Elasticsearch email index
pub struct ElasticStore {
    client: Client,
    config: ElasticConfig,
    embedder: Arc<dyn Embedder>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Chunk,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(default)]
    matched_queries: Vec<String>,
}

impl ElasticStore {
    pub fn new(config: ElasticConfig, embedder: Arc<dyn Embedder>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            config,
            embedder,
        }
    }

    async fn search(&self, body: Value) -> Result<SearchResponse, StoreError> {
        let url = format!("{}/{}/_search", self.config.url, self.config.index);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| StoreError::MalformedResponse(e.to_string()))
    }

    fn knn_clause(embedding: Vec<f32>, k: usize) -> Value {
        json!({
            "field": "embedding",
            "query_vector": embedding,
            "k": k,
            "num_candidates": (k * 2).max(100)
        })
    }
}

#[async_trait]
impl EmailStore for ElasticStore {
    async fn similarity_search(
        &self,
        query: &str,
        filter: Option<&FilterExpression>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let embedding = self.embedder.embed(query).await?;
        let knn = Self::knn_clause(embedding, k);

        // The filter is attached as a scoring context, not an exclusion: the
        // knn clause stays the gate, matched clause names come back per hit.
        let body = match filter.and_then(|f| f.to_query_dsl()) {
            Some(dsl) => json!({
                "query": {
                    "bool": {
                        "filter": dsl,
                        "must": { "knn": knn }
                    }
                },
                "size": k
            }),
            None => json!({
                "query": { "knn": knn },
                "size": k
            }),
        };

        let response = self.search(body).await?;

        Ok(response
            .hits
            .hits
            .into_iter()
            .map(|hit| {
                let score = hit.score.unwrap_or(0.0);
                ScoredChunk {
                    chunk: hit.source,
                    vector_score: score,
                    combined_score: score,
                    boosts: hit
                        .matched_queries
                        .iter()
                        .filter_map(|name| BoostCategory::from_wire_name(name))
                        .collect(),
                }
            })
            .collect())
    }

    async fn chunks_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Chunk>, StoreError> {
        let body = json!({
            "query": {
                "match": { "metadata.conversation_id.keyword": conversation_id }
            },
            "size": CONVERSATION_FETCH_SIZE,
            "sort": [ { "metadata.chunk_index": "asc" } ]
        });

        let response = self.search(body).await?;
        Ok(response.hits.hits.into_iter().map(|h| h.source).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_parsing_with_matched_queries() {
        let raw = json!({
            "hits": { "hits": [ {
                "_score": 1.42,
                "matched_queries": ["company_match", "unknown_tag"],
                "_source": {
                    "text": "Samsung SDS Q4 results",
                    "metadata": {
                        "conversation_id": "c1",
                        "subject": "Q4",
                        "sender_name": "IR",
                        "sender_email": "ir@samsungsds.com",
                        "year": 2024,
                        "month": 10,
                        "day": 2,
                        "chunk_type": "email_body",
                        "chunk_index": 0,
                        "total_chunks": 2
                    }
                }
            } ] }
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        let hit = &parsed.hits.hits[0];
        assert_eq!(hit.score, Some(1.42));
        assert_eq!(hit.source.metadata.conversation_id, "c1");
        // Unknown tags are dropped during mapping
        let boosts: Vec<_> = hit
            .matched_queries
            .iter()
            .filter_map(|n| BoostCategory::from_wire_name(n))
            .collect();
        assert_eq!(boosts, vec![BoostCategory::Company]);
    }

    #[test]
    fn test_knn_num_candidates_floor() {
        let clause = ElasticStore::knn_clause(vec![0.1], 10);
        assert_eq!(clause["num_candidates"], 100);
        let clause = ElasticStore::knn_clause(vec![0.1], 100);
        assert_eq!(clause["num_candidates"], 200);
    }
}

//! Retrieval pipeline orchestration
//!
//! Wires the analyzer, filter builder, retriever, and processor into one
//! entry point. Analysis failure is recoverable here: the pipeline logs it,
//! reports it through the event sink, and continues with plain vector
//! retrieval rather than failing the query.

use chrono::{Datelike, Local};
use std::sync::Arc;
use uuid::Uuid;

use crate::analyzer::QueryAnalyzer;
use crate::config::RetrievalConfig;
use crate::errors::StoreError;
use crate::events::{EventSink, NullSink, PipelineEvent};
use crate::filter::{FilterBuilder, FilterExpression};
use crate::llm::ChatClient;
use crate::processor::ConversationProcessor;
use crate::retrieval::{
    MultiplicativeRetriever, Retriever, VectorRetriever, WeightedAverageRetriever,
};
use crate::schema::{QueryAnalysis, RetrievalResult, TopSelection};
use crate::store::EmailStore;

/// Selectable retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverType {
    /// Pure vector similarity
    Vector,
    /// Weighted average of vector and metadata scores
    Weighted,
    /// Multiplicative boost, the recommended default
    Multiplicative,
}

/// End-to-end retrieval: analyze, filter, retrieve, group, select.
pub struct RetrievalPipeline {
    store: Arc<dyn EmailStore>,
    chat_client: Arc<dyn ChatClient>,
    analyzer: QueryAnalyzer,
    filter_builder: FilterBuilder,
    processor: ConversationProcessor,
    sink: Arc<dyn EventSink>,
    config: RetrievalConfig,
    /// Fixed `(year, month)` reference date; today when unset
    reference_date: Option<(i32, u32)>,
}

impl RetrievalPipeline {
    pub fn new(store: Arc<dyn EmailStore>, chat_client: Arc<dyn ChatClient>) -> Self {
        Self::with_config(store, chat_client, RetrievalConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn EmailStore>,
        chat_client: Arc<dyn ChatClient>,
        config: RetrievalConfig,
    ) -> Self {
        let filter_builder = FilterBuilder {
            min_confidence: config.min_confidence,
            company_variation_limit: config.company_variation_limit,
            content_term_limit: config.content_term_limit,
        };
        let mut processor = ConversationProcessor::new(store.clone());
        processor.max_chunk_length = config.max_chunk_length;
        processor.high_relevance_threshold = config.high_relevance_threshold;

        Self {
            store,
            analyzer: QueryAnalyzer::new(chat_client.clone()),
            chat_client,
            filter_builder,
            processor,
            sink: Arc::new(NullSink),
            config,
            reference_date: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Override the analyzer retry policy.
    pub fn with_retry_policy(mut self, policy: crate::agent::RetryPolicy) -> Self {
        self.analyzer = QueryAnalyzer::with_policy(self.chat_client.clone(), policy);
        self
    }

    /// Pin the reference date instead of reading the clock.
    pub fn with_reference_date(mut self, year: i32, month: u32) -> Self {
        self.reference_date = Some((year, month));
        self
    }

    /// Retrieve the top conversations for a query. `top_k` bounds the number
    /// of conversations in the selection.
    pub async fn retrieve(
        &self,
        query: &str,
        retriever_type: RetrieverType,
        top_k: usize,
    ) -> Result<RetrievalResult, StoreError> {
        let query_id = Uuid::new_v4();
        let (analysis, filter) = self
            .analysis_for_strategy(query, retriever_type, query_id)
            .await;

        let hits = self
            .retriever(retriever_type)
            .retrieve(query, analysis.as_ref(), filter.as_ref(), self.config.raw_k)
            .await?;
        self.sink.emit(PipelineEvent::RetrievalCompleted {
            query_id,
            hits: hits.len(),
        });

        let groups = self.processor.group_conversations(&hits).await?;
        self.sink.emit(PipelineEvent::ConversationsGrouped {
            query_id,
            conversations: groups.len(),
        });

        let selected = self
            .processor
            .select_top_conversations(&groups, top_k.min(self.config.max_conversations));

        Ok(RetrievalResult {
            query: query.to_string(),
            analysis,
            filter,
            conversation_groups: groups,
            selection: TopSelection::Conversations(selected),
        })
    }

    /// Retrieve the top `top_k` individual chunks, skipping conversation
    /// completion. Conversations are still grouped so downstream citation
    /// lookups keep working.
    pub async fn retrieve_chunks(
        &self,
        query: &str,
        retriever_type: RetrieverType,
        top_k: usize,
    ) -> Result<RetrievalResult, StoreError> {
        let query_id = Uuid::new_v4();
        let (analysis, filter) = self
            .analysis_for_strategy(query, retriever_type, query_id)
            .await;

        let mut hits = self
            .retriever(retriever_type)
            .retrieve(query, analysis.as_ref(), filter.as_ref(), self.config.raw_k)
            .await?;
        self.sink.emit(PipelineEvent::RetrievalCompleted {
            query_id,
            hits: hits.len(),
        });

        let groups = self.processor.group_conversations(&hits).await?;
        self.sink.emit(PipelineEvent::ConversationsGrouped {
            query_id,
            conversations: groups.len(),
        });

        hits.truncate(top_k);

        Ok(RetrievalResult {
            query: query.to_string(),
            analysis,
            filter,
            conversation_groups: groups,
            selection: TopSelection::Chunks(hits),
        })
    }

    /// The vector strategy never consults analysis, so skip the model call
    /// entirely and retrieve unfiltered.
    async fn analysis_for_strategy(
        &self,
        query: &str,
        retriever_type: RetrieverType,
        query_id: Uuid,
    ) -> (Option<QueryAnalysis>, Option<FilterExpression>) {
        match retriever_type {
            RetrieverType::Vector => (None, None),
            _ => self.analyze_and_filter(query, query_id).await,
        }
    }

    /// Run analysis and filter construction. Failure degrades to no analysis
    /// and no filter instead of failing the query.
    async fn analyze_and_filter(
        &self,
        query: &str,
        query_id: Uuid,
    ) -> (Option<QueryAnalysis>, Option<FilterExpression>) {
        self.sink.emit(PipelineEvent::AnalysisStarted { query_id });

        let analysis = match self.analyzer.analyze(query, self.reference_date()).await {
            Ok(analysis) => {
                self.sink.emit(PipelineEvent::AnalysisCompleted {
                    query_id,
                    company_confidence: analysis.company_info.confidence,
                    temporal_confidence: analysis.temporal_info.confidence,
                    content_confidence: analysis.content_info.confidence,
                });
                Some(analysis)
            }
            Err(err) => {
                tracing::warn!(error = %err, "query analysis failed, retrieving unfiltered");
                self.sink.emit(PipelineEvent::AnalysisFailed {
                    query_id,
                    reason: err.to_string(),
                });
                None
            }
        };

        let filter = analysis
            .as_ref()
            .map(|a| self.filter_builder.build_filter(a))
            .filter(|f| !f.is_empty());
        self.sink.emit(PipelineEvent::FilterBuilt {
            query_id,
            clause_count: filter.as_ref().map_or(0, |f| f.clauses.len()),
        });

        (analysis, filter)
    }

    fn retriever(&self, which: RetrieverType) -> Box<dyn Retriever> {
        match which {
            RetrieverType::Vector => Box::new(VectorRetriever::new(self.store.clone())),
            RetrieverType::Weighted => Box::new(WeightedAverageRetriever::with_weights(
                self.store.clone(),
                self.config.vector_weight,
                self.config.metadata_weight,
            )),
            RetrieverType::Multiplicative => {
                Box::new(MultiplicativeRetriever::new(self.store.clone()))
            }
        }
    }

    fn reference_date(&self) -> (i32, u32) {
        self.reference_date.unwrap_or_else(|| {
            let now = Local::now();
            (now.year(), now.month())
        })
    }
}

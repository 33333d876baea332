//! Answer generation over retrieval results
//!
//! The answer pipeline composes retrieval, context assembly, and cited
//! generation into the question-to-answer path.

pub mod generator;
pub mod prompt;

pub use generator::{invalid_citations, AnswerGenerator, GeneratorResponse};

use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{ContextBuilder, GenerationContext};
use crate::errors::PipelineError;
use crate::events::{EventSink, NullSink, PipelineEvent};
use crate::llm::ChatClient;
use crate::pipeline::{RetrievalPipeline, RetrieverType};
use crate::schema::{RetrievalResult, ScoredChunk};

/// A fully answered query with its supporting evidence.
#[derive(Debug, Clone)]
pub struct AnsweredQuery {
    pub query: String,
    /// Answer text for the user
    pub response: String,
    /// Model reasoning trace
    pub thought_process: Vec<String>,
    /// Cited chunk id to the model's stated reason
    pub citations: BTreeMap<String, String>,
    /// Resolved cited chunks, in manifest order
    pub used_chunks: Vec<ScoredChunk>,
    pub retrieval: RetrievalResult,
    pub context: GenerationContext,
}

/// Question-to-answer pipeline: retrieve, assemble context, generate.
pub struct AnswerPipeline {
    retrieval: RetrievalPipeline,
    context_builder: ContextBuilder,
    generator: AnswerGenerator,
    sink: Arc<dyn EventSink>,
}

impl AnswerPipeline {
    pub fn new(retrieval: RetrievalPipeline, chat_client: Arc<dyn ChatClient>) -> Self {
        Self {
            retrieval,
            context_builder: ContextBuilder::new(),
            generator: AnswerGenerator::new(chat_client),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.context_builder = builder;
        self
    }

    pub fn with_generator(mut self, generator: AnswerGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Answer a question end to end.
    ///
    /// An empty assembled context is not an error: the result carries an
    /// explicit no-evidence response with no citations.
    pub async fn answer(
        &self,
        query: &str,
        retriever_type: RetrieverType,
        top_k: usize,
    ) -> Result<AnsweredQuery, PipelineError> {
        let query_id = Uuid::new_v4();

        let retrieval = self.retrieval.retrieve(query, retriever_type, top_k).await?;
        let context = self.context_builder.build(&retrieval);
        self.sink.emit(PipelineEvent::ContextBuilt {
            query_id,
            conversations: context.num_conversations,
            tokens: context.total_tokens,
        });

        if context.chunk_ids.is_empty() {
            return Ok(AnsweredQuery {
                query: query.to_string(),
                response: "No relevant email conversations were found for this question."
                    .to_string(),
                thought_process: Vec::new(),
                citations: BTreeMap::new(),
                used_chunks: Vec::new(),
                retrieval,
                context,
            });
        }

        let generated = self.generator.generate(query, &context).await?;
        self.sink.emit(PipelineEvent::GenerationCompleted {
            query_id,
            cited_chunks: generated.answer.len(),
        });

        // Citations were validated against the manifest, so every id resolves
        // unless the store mutated mid-query
        let used_chunks = generated
            .answer
            .keys()
            .filter_map(|id| retrieval.chunk_by_id(id).cloned())
            .collect();

        Ok(AnsweredQuery {
            query: query.to_string(),
            response: generated.response,
            thought_process: generated.thought_process,
            citations: generated.answer,
            used_chunks,
            retrieval,
            context,
        })
    }
}

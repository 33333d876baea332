//! End-to-end tests over the in-memory store with scripted model responses.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mailscout::agent::RetryPolicy;
use mailscout::errors::LlmError;
use mailscout::events::{CollectingSink, PipelineEvent};
use mailscout::generation::{AnswerGenerator, AnswerPipeline};
use mailscout::llm::{ChatClient, ChatMessage};
use mailscout::schema::{ChunkMetadata, TopSelection};
use mailscout::store::MemoryStore;
use mailscout::{Chunk, ChunkType, RetrievalPipeline, RetrieverType};

const ANALYSIS: &str = r#"{
    "thought_process": ["company and quarter are explicit"],
    "company_info": {"name": "Samsung SDS", "origin": "South Korea",
                     "variations": ["Samsung SDS", "삼성SDS"], "confidence": 0.95},
    "temporal_info": {"years": [2024, 2025], "months": [10, 11, 12, 1],
                      "quarter": {"number": [4], "year": [2024]}, "confidence": 0.9},
    "content_info": {"domain": "IT services", "key_terms": ["earnings", "실적"],
                     "action_type": "earnings announcement", "confidence": 0.85}
}"#;

const ANSWER: &str = r#"{
    "thought_process": ["chunk 0 states the revenue figure"],
    "response": "Samsung SDS reported Q4 2024 revenue of 3.5 trillion KRW.",
    "answer": {"0": "states the Q4 revenue figure",
               "1": "detailed earnings tables"}
}"#;

/// Routes analyzer and generator turns to their scripted responses.
struct ScriptedClient {
    analysis: Option<String>,
    answer: String,
    generator_calls: AtomicU32,
}

impl ScriptedClient {
    fn new(analysis: Option<&str>, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            analysis: analysis.map(str::to_string),
            answer: answer.to_string(),
            generator_calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let is_generation = messages
            .iter()
            .any(|m| m.content.contains("Email context:"));
        if is_generation {
            self.generator_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        } else {
            match &self.analysis {
                Some(text) => Ok(text.clone()),
                None => Err(LlmError::Unreachable("analyzer endpoint down".to_string())),
            }
        }
    }
}

fn chunk(
    conversation_id: &str,
    chunk_index: u32,
    chunk_type: ChunkType,
    subject: &str,
    sender_name: &str,
    sender_email: &str,
    year: i32,
    month: u32,
    text: &str,
) -> Chunk {
    Chunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            conversation_id: conversation_id.to_string(),
            subject: subject.to_string(),
            sender_name: sender_name.to_string(),
            sender_email: sender_email.to_string(),
            year,
            month,
            day: 20,
            chunk_type,
            chunk_index,
            total_chunks: 2,
            attachment_metadata: None,
        },
    }
}

/// Corpus: one on-topic conversation with a body and an attachment, and one
/// noise conversation with a higher raw vector score.
fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_chunk(
        chunk(
            "conv-sds",
            0,
            ChunkType::EmailBody,
            "Samsung SDS 4Q24 earnings announcement",
            "Samsung SDS IR",
            "ir@samsungsds.com",
            2025,
            1,
            "Samsung SDS reported Q4 2024 revenue of 3.5 trillion KRW.",
        ),
        0.62,
    );
    store.add_chunk(
        chunk(
            "conv-sds",
            1,
            ChunkType::Attachment("pdf".to_string()),
            "Samsung SDS 4Q24 earnings announcement",
            "Samsung SDS IR",
            "ir@samsungsds.com",
            2025,
            1,
            "Detailed earnings tables by business unit.",
        ),
        0.5,
    );
    store.add_chunk(
        chunk(
            "conv-noise",
            10,
            ChunkType::EmailBody,
            "Weekly market digest",
            "Market News",
            "news@market.example",
            2023,
            6,
            "Generic market commentary unrelated to any company.",
        ),
        0.7,
    );
    store
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        attempt_timeout: Duration::from_secs(5),
    }
}

fn retrieval_pipeline(
    store: Arc<MemoryStore>,
    client: Arc<ScriptedClient>,
    sink: Arc<CollectingSink>,
) -> RetrievalPipeline {
    RetrievalPipeline::new(store, client)
        .with_sink(sink)
        .with_retry_policy(fast_policy())
        .with_reference_date(2025, 2)
}

#[tokio::test]
async fn test_answers_with_citations_end_to_end() {
    let client = ScriptedClient::new(Some(ANALYSIS), ANSWER);
    let sink = CollectingSink::new();
    let pipeline = AnswerPipeline::new(
        retrieval_pipeline(seeded_store(), client.clone(), sink.clone()),
        client.clone(),
    )
    .with_generator(AnswerGenerator::with_policy(client.clone(), fast_policy()))
    .with_sink(sink.clone());

    let answered = pipeline
        .answer(
            "What were Samsung SDS Q4 2024 earnings?",
            RetrieverType::Multiplicative,
            5,
        )
        .await
        .unwrap();

    assert_eq!(
        answered.response,
        "Samsung SDS reported Q4 2024 revenue of 3.5 trillion KRW."
    );
    assert_eq!(answered.citations.len(), 2);

    // Cited ids resolve to the on-topic conversation's chunks
    assert_eq!(answered.used_chunks.len(), 2);
    assert!(answered
        .used_chunks
        .iter()
        .all(|c| c.chunk.metadata.conversation_id == "conv-sds"));

    // Context carries the formatting contract and a sound manifest
    assert!(answered.context.context_text.contains("=== Conversation 1 ==="));
    assert!(answered
        .context
        .context_text
        .contains("[Subject: Samsung SDS 4Q24 earnings announcement]"));
    assert!(answered.context.chunk_ids.contains(&"0".to_string()));

    // The full lifecycle was reported
    let events = sink.events();
    for matcher in [
        |e: &PipelineEvent| matches!(e, PipelineEvent::AnalysisCompleted { .. }),
        |e: &PipelineEvent| matches!(e, PipelineEvent::FilterBuilt { clause_count: 3, .. }),
        |e: &PipelineEvent| matches!(e, PipelineEvent::RetrievalCompleted { .. }),
        |e: &PipelineEvent| matches!(e, PipelineEvent::ConversationsGrouped { .. }),
        |e: &PipelineEvent| matches!(e, PipelineEvent::ContextBuilt { .. }),
        |e: &PipelineEvent| matches!(e, PipelineEvent::GenerationCompleted { cited_chunks: 2, .. }),
    ] {
        assert!(events.iter().any(matcher));
    }
}

#[tokio::test]
async fn test_boosts_outrank_raw_vector_score() {
    let client = ScriptedClient::new(Some(ANALYSIS), ANSWER);
    let pipeline = retrieval_pipeline(seeded_store(), client, CollectingSink::new());

    let result = pipeline
        .retrieve(
            "Samsung SDS Q4 2024 earnings",
            RetrieverType::Multiplicative,
            5,
        )
        .await
        .unwrap();

    // The noise conversation has the best raw vector score, but boosts put
    // the on-topic conversation first
    let selected = result.selection.chunks();
    assert_eq!(selected[0].chunk.metadata.conversation_id, "conv-sds");
    assert!(!selected[0].boosts.is_empty());

    // Conversation completeness: the attachment came along even though only
    // by similarity it scored below the noise
    assert!(selected
        .iter()
        .any(|c| matches!(c.chunk.metadata.chunk_type, ChunkType::Attachment(_))));
}

#[tokio::test]
async fn test_vector_strategy_ignores_boosts() {
    let client = ScriptedClient::new(Some(ANALYSIS), ANSWER);
    let pipeline = retrieval_pipeline(seeded_store(), client, CollectingSink::new());

    let result = pipeline
        .retrieve("Samsung SDS Q4 2024 earnings", RetrieverType::Vector, 5)
        .await
        .unwrap();

    // Raw similarity alone ranks the noise conversation first
    let selected = result.selection.chunks();
    assert_eq!(selected[0].chunk.metadata.conversation_id, "conv-noise");
}

#[tokio::test]
async fn test_analysis_failure_still_produces_an_answer() {
    let client = ScriptedClient::new(None, ANSWER);
    let sink = CollectingSink::new();
    let pipeline = AnswerPipeline::new(
        retrieval_pipeline(seeded_store(), client.clone(), sink.clone()),
        client.clone(),
    )
    .with_generator(AnswerGenerator::with_policy(client.clone(), fast_policy()))
    .with_sink(sink.clone());

    let answered = pipeline
        .answer("anything", RetrieverType::Multiplicative, 5)
        .await
        .unwrap();

    assert!(answered.retrieval.analysis.is_none());
    assert!(answered.retrieval.filter.is_none());
    assert!(!answered.response.is_empty());
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::AnalysisFailed { .. })));
}

#[tokio::test]
async fn test_empty_corpus_yields_no_evidence_answer() {
    let client = ScriptedClient::new(Some(ANALYSIS), ANSWER);
    let pipeline = AnswerPipeline::new(
        retrieval_pipeline(Arc::new(MemoryStore::new()), client.clone(), CollectingSink::new()),
        client.clone(),
    )
    .with_generator(AnswerGenerator::with_policy(client.clone(), fast_policy()));

    let answered = pipeline
        .answer("anything at all", RetrieverType::Multiplicative, 5)
        .await
        .unwrap();

    assert!(answered.citations.is_empty());
    assert!(answered.used_chunks.is_empty());
    assert!(answered.response.contains("No relevant email conversations"));
    // The generator is never consulted without evidence
    assert_eq!(client.generator_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chunk_mode_returns_individual_chunks() {
    let client = ScriptedClient::new(Some(ANALYSIS), ANSWER);
    let pipeline = retrieval_pipeline(seeded_store(), client, CollectingSink::new());

    let result = pipeline
        .retrieve_chunks("Samsung SDS earnings", RetrieverType::Multiplicative, 2)
        .await
        .unwrap();

    match &result.selection {
        TopSelection::Chunks(chunks) => {
            assert_eq!(chunks.len(), 2);
            assert_eq!(chunks[0].chunk.metadata.conversation_id, "conv-sds");
        }
        TopSelection::Conversations(_) => panic!("expected chunk selection"),
    }
    // Groups still cover every touched conversation for citation lookups
    assert!(result.conversation_groups.contains_key("conv-sds"));
    assert!(result.conversation_groups.contains_key("conv-noise"));
}

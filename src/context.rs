//! Context assembly under a token budget
//!
//! Two-pass greedy packing over ranked conversations: estimate each
//! conversation's token cost, accept whole conversations until the first
//! overflow, then render the accepted set. A conversation is an atomic
//! packing unit; the rendered chunk-id manifest is the only valid set of
//! citation targets downstream.

use serde::{Deserialize, Serialize};

use crate::processor::{order_for_presentation, ConversationGroup};
use crate::schema::{RetrievalResult, ScoredChunk};

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Token budget for the assembled context
    pub max_tokens: usize,
    /// Hard cap on conversations regardless of budget headroom
    pub max_conversations: usize,
    /// Character allowance for chunks above the relevance threshold
    pub top_chunk_length: usize,
    /// Character allowance for everything else
    pub bottom_chunk_length: usize,
    /// Combined-score threshold separating the two allowances
    pub high_relevance_threshold: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 6000,
            max_conversations: 15,
            top_chunk_length: 3000,
            bottom_chunk_length: 300,
            high_relevance_threshold: 0.7,
        }
    }
}

/// Context prepared for answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationContext {
    pub context_text: String,
    /// Ordered manifest of chunk ids actually rendered; authoritative for
    /// citation validation
    pub chunk_ids: Vec<String>,
    pub total_tokens: usize,
    pub num_conversations: usize,
    pub num_chunks: usize,
    pub num_full_chunks: usize,
    pub num_truncated_chunks: usize,
}

impl GenerationContext {
    /// Empty context signalling that nothing fit the budget.
    pub fn empty() -> Self {
        Self {
            context_text: String::new(),
            chunk_ids: Vec::new(),
            total_tokens: 0,
            num_conversations: 0,
            num_chunks: 0,
            num_full_chunks: 0,
            num_truncated_chunks: 0,
        }
    }
}

#[derive(Default)]
struct ChunkStats {
    full: usize,
    truncated: usize,
}

/// Assembles bounded context text from a retrieval result.
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Build context from a retrieval result under the token budget.
    ///
    /// When not even the best conversation fits, the result is an empty
    /// context with `num_conversations == 0`, which callers treat as a
    /// signal rather than an error.
    pub fn build(&self, result: &RetrievalResult) -> GenerationContext {
        let mut sorted: Vec<&ConversationGroup> =
            result.conversation_groups.values().collect();
        sorted.sort_by(|a, b| {
            b.max_score
                .partial_cmp(&a.max_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });

        let header_tokens = count_tokens("=== Conversation X ===");

        // First pass: accept whole conversations until the first overflow
        let mut total_tokens = 0usize;
        let mut accepted: Vec<Vec<ScoredChunk>> = Vec::new();
        let mut stats = ChunkStats::default();

        for group in sorted {
            let mut chunks = group.chunks.clone();
            order_for_presentation(&mut chunks);

            let (conv_tokens, conv_stats) = self.estimate_conversation(&chunks);
            let conv_tokens = conv_tokens + header_tokens;

            if total_tokens + conv_tokens > self.config.max_tokens {
                break;
            }

            total_tokens += conv_tokens;
            stats.full += conv_stats.full;
            stats.truncated += conv_stats.truncated;
            accepted.push(chunks);

            if accepted.len() >= self.config.max_conversations {
                break;
            }
        }

        if accepted.is_empty() {
            return GenerationContext::empty();
        }

        // Second pass: render the accepted set
        let mut context_parts = Vec::new();
        let mut chunk_ids = Vec::new();

        for (i, chunks) in accepted.iter().enumerate() {
            context_parts.push(format!("\n=== Conversation {} ===", i + 1));
            for (j, chunk) in chunks.iter().enumerate() {
                let (formatted, chunk_id) = self.format_chunk(chunk, j == 0);
                context_parts.push(formatted);
                chunk_ids.push(chunk_id);
            }
        }

        GenerationContext {
            context_text: context_parts.join("\n"),
            num_conversations: accepted.len(),
            num_chunks: stats.full + stats.truncated,
            num_full_chunks: stats.full,
            num_truncated_chunks: stats.truncated,
            total_tokens,
            chunk_ids,
        }
    }

    fn estimate_conversation(&self, chunks: &[ScoredChunk]) -> (usize, ChunkStats) {
        let mut tokens = 0usize;
        let mut stats = ChunkStats::default();

        for (i, chunk) in chunks.iter().enumerate() {
            let (formatted, _) = self.format_chunk(chunk, i == 0);
            tokens += count_tokens(&formatted);
            if self.is_high_relevance(chunk) {
                stats.full += 1;
            } else {
                stats.truncated += 1;
            }
        }
        (tokens, stats)
    }

    fn is_high_relevance(&self, chunk: &ScoredChunk) -> bool {
        chunk.combined_score > self.config.high_relevance_threshold
    }

    /// Render one chunk. The first chunk of a conversation shows the full
    /// metadata header; later chunks only their chunk-id marker.
    fn format_chunk(&self, scored: &ScoredChunk, show_metadata: bool) -> (String, String) {
        let metadata = &scored.chunk.metadata;
        let chunk_id = scored.chunk.chunk_id();
        let mut lines = Vec::new();

        if show_metadata {
            lines.push(format!("[Subject: {}]", metadata.subject));
            lines.push(format!(
                "[From: {} <{}>]",
                metadata.sender_name, metadata.sender_email
            ));
            lines.push(format!(
                "[Date: {}-{}-{}]",
                metadata.year, metadata.month, metadata.day
            ));
            lines.push(format!("[Chunk: {chunk_id}]"));
        } else {
            lines.push(format!("[Chunk: {chunk_id}]"));
        }

        lines.push(metadata.chunk_type.content_header());

        let allowance = if self.is_high_relevance(scored) {
            self.config.top_chunk_length
        } else {
            self.config.bottom_chunk_length
        };
        lines.push(crate::processor::truncate_text(&scored.chunk.text, allowance));
        lines.push(String::new());

        (lines.join("\n"), chunk_id)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-count token approximation; the budget is a planning bound, not an
/// exact tokenizer count.
fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

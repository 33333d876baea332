//! Structured progress events
//!
//! The pipeline reports progress through an observer interface instead of
//! knowing about any UI. Sinks decide what to do with events; the core only
//! emits them.

use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Progress events emitted during one query's lifecycle
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    AnalysisStarted {
        query_id: Uuid,
    },
    AnalysisCompleted {
        query_id: Uuid,
        company_confidence: f64,
        temporal_confidence: f64,
        content_confidence: f64,
    },
    /// Analysis failed; retrieval continues unfiltered
    AnalysisFailed {
        query_id: Uuid,
        reason: String,
    },
    FilterBuilt {
        query_id: Uuid,
        clause_count: usize,
    },
    RetrievalCompleted {
        query_id: Uuid,
        hits: usize,
    },
    ConversationsGrouped {
        query_id: Uuid,
        conversations: usize,
    },
    ContextBuilt {
        query_id: Uuid,
        conversations: usize,
        tokens: usize,
    },
    GenerationCompleted {
        query_id: Uuid,
        cited_chunks: usize,
    },
}

/// Observer for pipeline progress.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Sink that drops everything; the default when no observer is attached.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Sink that records events for inspection; used in tests and diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().expect("sink poisoned").clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().expect("sink poisoned").push(event);
    }
}

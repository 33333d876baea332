//! mailscout - Retrieval-augmented question answering over email archives
//!
//! Pipeline: analyze the query into company/temporal/content facets, build a
//! boosted metadata filter, run multi-signal vector retrieval, complete and
//! rank conversations, assemble a token-bounded context, and generate a
//! cited answer.
//!
//! # Layers
//!
//! - Schema + filters: [`schema`], [`filter`]
//! - Model and store boundaries: [`llm`], [`store`], [`agent`]
//! - Retrieval core: [`analyzer`], [`retrieval`], [`processor`], [`pipeline`]
//! - Answering: [`context`], [`generation`]

pub mod agent;
pub mod analyzer;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod filter;
pub mod generation;
pub mod llm;
pub mod pipeline;
pub mod processor;
pub mod retrieval;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use errors::{PipelineError, Result};
pub use generation::{AnswerPipeline, AnsweredQuery};
pub use pipeline::{RetrievalPipeline, RetrieverType};
pub use schema::{Chunk, ChunkMetadata, ChunkType, RetrievalResult, ScoredChunk};

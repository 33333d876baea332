//! Core data model: chunks, query analysis facets, and retrieval results

pub mod analysis;
pub mod chunk;
pub mod result;

pub use analysis::{
    CompanyInfo, ContentInfo, QuarterInfo, QuarterValidationError, QueryAnalysis, TemporalInfo,
};
pub use chunk::{BoostCategory, Chunk, ChunkMetadata, ChunkType, ScoredChunk};
pub use result::{RetrievalResult, TopSelection};

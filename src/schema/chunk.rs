//! Chunk data model
//!
//! A chunk is the atomic retrievable unit: one email body or one
//! attachment-derived fragment with its stored metadata. Chunks are created
//! during ingestion and are immutable here; scoring fields live on
//! [`ScoredChunk`] and are recomputed per query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which facet's filter clause a document satisfied.
///
/// Carried as an explicit tag from filter construction through scoring, and
/// mapped to/from the Elasticsearch `matched_queries` names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoostCategory {
    Company,
    Temporal,
    Content,
}

impl BoostCategory {
    /// Name used for the Elasticsearch `_name` tag on the clause.
    pub fn wire_name(&self) -> &'static str {
        match self {
            BoostCategory::Company => "company_match",
            BoostCategory::Temporal => "temporal_match",
            BoostCategory::Content => "content_match",
        }
    }

    /// Reverse mapping from a `matched_queries` entry.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "company_match" => Some(BoostCategory::Company),
            "temporal_match" => Some(BoostCategory::Temporal),
            "content_match" => Some(BoostCategory::Content),
            _ => None,
        }
    }

    /// Number of distinct boost categories, used to normalize metadata scores.
    pub const COUNT: usize = 3;
}

/// Chunk kind: the email body or one attachment type (pdf, docx, xlsx, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChunkType {
    EmailBody,
    Attachment(String),
}

impl ChunkType {
    pub fn is_email_body(&self) -> bool {
        matches!(self, ChunkType::EmailBody)
    }

    /// Stored string form. Field values are load-bearing: the document store
    /// persists "email_body" or the attachment extension.
    pub fn wire_name(&self) -> &str {
        match self {
            ChunkType::EmailBody => "email_body",
            ChunkType::Attachment(kind) => kind,
        }
    }

    /// Content header line used when rendering a chunk into context text.
    pub fn content_header(&self) -> String {
        match self {
            ChunkType::EmailBody => "[Email Body Content:]".to_string(),
            ChunkType::Attachment(kind) => format!("[{} Content:]", kind.to_uppercase()),
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl From<&str> for ChunkType {
    fn from(value: &str) -> Self {
        if value == "email_body" {
            ChunkType::EmailBody
        } else {
            ChunkType::Attachment(value.to_string())
        }
    }
}

impl Serialize for ChunkType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for ChunkType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ChunkType::from(raw.as_str()))
    }
}

/// Stored metadata for a chunk. Field names mirror the document store schema
/// and must not change: the filter builder references them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub conversation_id: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub chunk_type: ChunkType,
    /// Global, monotonic within a conversation
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Flattened key-value metadata for attachment chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Immutable retrievable unit: text plus stored metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Chunk id used in context manifests and downstream citations.
    pub fn chunk_id(&self) -> String {
        self.metadata.chunk_index.to_string()
    }
}

/// A chunk with per-query transient scoring attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Raw similarity score from the vector search
    pub vector_score: f64,
    /// Final relevance score after the retriever strategy merged signals
    pub combined_score: f64,
    /// Boost categories this chunk's document matched
    #[serde(default)]
    pub boosts: Vec<BoostCategory>,
}

impl ScoredChunk {
    /// Wrap a freshly fetched chunk with zero scores (direct store fetch).
    pub fn unscored(chunk: Chunk) -> Self {
        Self {
            chunk,
            vector_score: 0.0,
            combined_score: 0.0,
            boosts: Vec::new(),
        }
    }

    /// Metadata match score normalized against the maximum number of
    /// boost categories.
    pub fn metadata_score(&self) -> f64 {
        self.boosts.len() as f64 / BoostCategory::COUNT as f64
    }
}

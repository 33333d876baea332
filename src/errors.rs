//! Error types for the mailscout retrieval pipeline
//!
//! Every failure mode has a typed variant so callers can branch on outcome
//! instead of parsing messages. Analysis failures are recoverable (fall back
//! to unfiltered retrieval); backend unavailability is not and must stay
//! distinct from an empty result set.

use thiserror::Error;

/// Errors from the LLM-backed query analyzer.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Query was empty or whitespace-only
    #[error("Query must be a non-empty string")]
    EmptyQuery,

    /// Model output never conformed to the QueryAnalysis schema
    #[error("Analyzer produced no valid output after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Single attempt exceeded its deadline
    #[error("Analyzer call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Underlying chat client failure
    #[error("Analyzer model call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Errors from the embedding/search backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend unreachable. Distinct from a valid zero-hit result.
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    /// Backend reachable but the request was rejected
    #[error("Search backend rejected request: {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Response did not match the expected document schema
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// Query embedding failed
    #[error("Embedding failed: {0}")]
    Embedding(#[from] LlmError),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Rejected {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                body: err.to_string(),
            }
        }
    }
}

/// Errors from answer generation and citation validation.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Generator referenced chunk ids outside the context manifest
    #[error("Response cites chunk ids outside the context manifest: {invalid_ids:?}")]
    Citation { invalid_ids: Vec<String> },

    /// Model output never conformed to the response schema
    #[error("Generator produced no valid output after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Underlying chat client failure
    #[error("Generator model call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Errors from model client HTTP calls.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Model API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            LlmError::Unreachable(err.to_string())
        } else {
            LlmError::Api {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                body: err.to_string(),
            }
        }
    }
}

/// Umbrella error for pipeline entry points.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

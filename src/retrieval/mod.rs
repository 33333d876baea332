//! Retrieval strategies over the email store

pub mod retrievers;

pub use retrievers::{
    MultiplicativeRetriever, Retriever, VectorRetriever, WeightedAverageRetriever,
};

/// Raw hit depth requested from the store before conversation grouping
pub const DEFAULT_RAW_K: usize = 100;

//! Model client boundary
//!
//! Pipeline components take these handles by `Arc<dyn ...>` so tests can
//! substitute doubles for the hosted endpoints.

pub mod client;
pub mod embedding;

pub use client::{ChatClient, ChatMessage, OpenAiChatClient, Role};
pub use embedding::{Embedder, OpenAiEmbedder};

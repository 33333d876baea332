//! Pipeline configuration
//!
//! All knobs with their defaults, loadable from a TOML file. Components take
//! the relevant section by value so tests can tweak one knob at a time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::agent::RetryPolicy;
use crate::context::ContextConfig;

/// Retrieval-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Conversations kept after ranking
    pub max_conversations: usize,
    /// Raw hit depth requested from the store
    pub raw_k: usize,
    /// Character cap applied by the processor to low-relevance chunks
    pub max_chunk_length: usize,
    /// Combined-score threshold for full-length chunks
    pub high_relevance_threshold: f64,
    /// Facet confidence gate for filter construction
    pub min_confidence: f64,
    pub company_variation_limit: usize,
    pub content_term_limit: usize,
    /// Weights for the weighted-average retriever
    pub vector_weight: f64,
    pub metadata_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_conversations: 5,
            raw_k: crate::retrieval::DEFAULT_RAW_K,
            max_chunk_length: 1000,
            high_relevance_threshold: 0.7,
            min_confidence: 0.5,
            company_variation_limit: 10,
            content_term_limit: 10,
            vector_weight: 0.7,
            metadata_weight: 0.3,
        }
    }
}

/// Retry settings for structured model calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            attempt_timeout_secs: 30,
        }
    }
}

impl AgentConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.retrieval.max_conversations, 5);
        assert_eq!(config.retrieval.raw_k, 100);
        assert_eq!(config.context.max_tokens, 6000);
        assert_eq!(config.agent.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        // One knob per section; everything else falls back to defaults
        let parsed: PipelineConfig = toml::from_str(
            r#"
            [retrieval]
            raw_k = 50

            [context]
            max_tokens = 2000
            "#,
        )
        .unwrap();
        assert_eq!(parsed.retrieval.raw_k, 50);
        assert_eq!(parsed.retrieval.max_conversations, 5);
        assert_eq!(parsed.context.max_tokens, 2000);
        assert_eq!(parsed.context.max_conversations, 15);
        assert_eq!(parsed.agent.max_attempts, 3);
    }

    #[test]
    fn test_retry_policy_conversion() {
        let agent = AgentConfig {
            max_attempts: 5,
            initial_backoff_ms: 100,
            attempt_timeout_secs: 10,
        };
        let policy = agent.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
    }
}

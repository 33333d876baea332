//! Cited answer generation
//!
//! Turns an assembled context plus the user's question into a grounded
//! answer with per-chunk citations. Citations are validated against the
//! context manifest inside the retry loop, so a hallucinated chunk id gets
//! the model another attempt instead of reaching the caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::agent::{run_structured, AgentFailure, RetryPolicy};
use crate::context::GenerationContext;
use crate::errors::GenerationError;
use crate::llm::{ChatClient, ChatMessage};

use super::prompt;

/// Structured generator output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorResponse {
    /// Model's reasoning trace, kept for diagnostics
    #[serde(default)]
    pub thought_process: Vec<String>,
    /// Answer text shown to the user
    pub response: String,
    /// Cited chunk id to the reason it supports the answer
    #[serde(default)]
    pub answer: BTreeMap<String, String>,
}

impl GeneratorResponse {
    pub fn cited_chunk_ids(&self) -> Vec<&str> {
        self.answer.keys().map(String::as_str).collect()
    }
}

/// Check cited ids against the context manifest; returns the offenders.
pub fn invalid_citations(response: &GeneratorResponse, manifest: &[String]) -> Vec<String> {
    let valid: HashSet<&str> = manifest.iter().map(String::as_str).collect();
    response
        .answer
        .keys()
        .filter(|id| !valid.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Generates cited answers over an assembled context.
pub struct AnswerGenerator {
    client: Arc<dyn ChatClient>,
    policy: RetryPolicy,
}

impl AnswerGenerator {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(client: Arc<dyn ChatClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Generate an answer for `query` grounded in `context`.
    ///
    /// Every attempt must parse as a [`GeneratorResponse`] and cite only ids
    /// from the context manifest. If the retry budget runs out and the last
    /// rejection was a citation failure, the error names the invalid ids.
    pub async fn generate(
        &self,
        query: &str,
        context: &GenerationContext,
    ) -> Result<GeneratorResponse, GenerationError> {
        let messages = vec![
            ChatMessage::system(prompt::generator_system_prompt()),
            ChatMessage::user(prompt::generator_user_prompt(&context.context_text, query)),
        ];

        // Last citation offenders, surfaced if retries run out on them
        let last_invalid: Mutex<Vec<String>> = Mutex::new(Vec::new());

        let result = run_structured(
            self.client.as_ref(),
            &messages,
            &self.policy,
            |raw| -> Result<GeneratorResponse, String> {
                let response: GeneratorResponse =
                    serde_json::from_str(raw).map_err(|e| format!("not a valid response: {e}"))?;
                let invalid = invalid_citations(&response, &context.chunk_ids);
                if invalid.is_empty() {
                    last_invalid.lock().expect("lock poisoned").clear();
                    Ok(response)
                } else {
                    let reason = format!("cited unknown chunk ids: {invalid:?}");
                    *last_invalid.lock().expect("lock poisoned") = invalid;
                    Err(reason)
                }
            },
        )
        .await;

        result.map_err(|failure| match failure {
            AgentFailure::RetriesExhausted { attempts } => {
                let invalid = last_invalid.lock().expect("lock poisoned").clone();
                if invalid.is_empty() {
                    GenerationError::RetriesExhausted { attempts }
                } else {
                    GenerationError::Citation {
                        invalid_ids: invalid,
                    }
                }
            }
            // A final-attempt timeout spent the whole budget too
            AgentFailure::Timeout { .. } => GenerationError::RetriesExhausted {
                attempts: self.policy.max_attempts,
            },
            AgentFailure::Llm(err) => GenerationError::Llm(err),
        })
    }
}

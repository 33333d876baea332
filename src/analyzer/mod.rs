//! LLM-backed query analyzer
//!
//! Turns a free-text query plus a reference date into a [`QueryAnalysis`]
//! with independent per-facet confidences. Model output is normalized and
//! validated before it becomes an analysis; exhausting the retry budget is a
//! typed failure the pipeline treats as "fall back to unfiltered retrieval".

pub mod prompt;

use serde_json::Value;
use std::sync::Arc;

use crate::agent::{run_structured, AgentFailure, RetryPolicy};
use crate::errors::AnalysisError;
use crate::llm::{ChatClient, ChatMessage};
use crate::schema::{QuarterInfo, QueryAnalysis};

/// Months associated with a fiscal quarter mention.
///
/// Windows are wider than the calendar quarter and overlap adjacent quarters
/// on purpose: quarter mentions cluster around the announcement, from the
/// reporting period through the following announcement month.
pub fn quarter_months(quarter: u8) -> &'static [u32] {
    match quarter {
        1 => &[3, 4, 5, 6, 7, 8],
        2 => &[3, 4, 5, 6, 7, 8, 9],
        3 => &[6, 7, 8, 9, 10, 11, 12],
        4 => &[10, 11, 12, 1, 2, 3],
        _ => &[],
    }
}

/// Analyzer over a chat client, with bounded retries.
pub struct QueryAnalyzer {
    client: Arc<dyn ChatClient>,
    policy: RetryPolicy,
}

impl QueryAnalyzer {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(client: Arc<dyn ChatClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Analyze one query against a `(year, month)` reference date.
    pub async fn analyze(
        &self,
        query: &str,
        reference_date: (i32, u32),
    ) -> Result<QueryAnalysis, AnalysisError> {
        if query.trim().is_empty() {
            return Err(AnalysisError::EmptyQuery);
        }

        let (year, month) = reference_date;
        let mut messages = prompt::example_messages();
        messages.push(ChatMessage::user(prompt::analyzer_prompt(
            query, year, month,
        )));

        let query_owned = query.to_string();
        run_structured(self.client.as_ref(), &messages, &self.policy, |raw| {
            parse_analysis(raw, &query_owned)
        })
        .await
        .map_err(|failure| match failure {
            AgentFailure::RetriesExhausted { attempts } => {
                AnalysisError::RetriesExhausted { attempts }
            }
            AgentFailure::Timeout { duration_ms } => AnalysisError::Timeout { duration_ms },
            AgentFailure::Llm(err) => AnalysisError::Llm(err),
        })
    }
}

/// Parse and normalize raw model output into a validated analysis.
///
/// Normalizations match known model quirks: company_info sometimes arrives as
/// a list (first entry wins); quarter fields may be scalars instead of lists;
/// a quarter with both fields null, or one failing validation, degrades to no
/// quarter rather than rejecting the whole analysis.
fn parse_analysis(raw: &str, query: &str) -> Result<QueryAnalysis, String> {
    let mut value: Value =
        serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {e}"))?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| "top level is not an object".to_string())?;

    if let Some(company) = obj.get_mut("company_info") {
        if let Some(list) = company.as_array() {
            let first = list.first().cloned().unwrap_or(Value::Null);
            *company = first;
        }
    }

    if let Some(temporal) = obj.get_mut("temporal_info").and_then(Value::as_object_mut) {
        if let Some(quarter) = temporal.get("quarter").cloned() {
            temporal.insert("quarter".to_string(), normalize_quarter(quarter));
        }
    }

    let needs_query = obj
        .get("original_query")
        .and_then(Value::as_str)
        .map(str::is_empty)
        .unwrap_or(true);
    if needs_query {
        obj.insert(
            "original_query".to_string(),
            Value::String(query.to_string()),
        );
    }

    serde_json::from_value(value).map_err(|e| format!("schema mismatch: {e}"))
}

/// Reduce a raw quarter value to either a valid quarter object or null.
fn normalize_quarter(raw: Value) -> Value {
    let Some(obj) = raw.as_object() else {
        return Value::Null;
    };

    let number = int_list(obj.get("number"));
    let year = int_list(obj.get("year"));
    let (Some(number), Some(year)) = (number, year) else {
        return Value::Null;
    };

    let numbers: Vec<u8> = number
        .iter()
        .filter_map(|&n| u8::try_from(n).ok())
        .collect();
    if numbers.len() != number.len() {
        return Value::Null;
    }
    let years: Vec<i32> = year.iter().map(|&y| y as i32).collect();

    match QuarterInfo::new(numbers, years) {
        Ok(quarter) => serde_json::to_value(quarter).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

/// Accept a JSON int list or a bare scalar; None for null/missing/other.
fn int_list(value: Option<&Value>) -> Option<Vec<i64>> {
    match value? {
        Value::Number(n) => n.as_i64().map(|v| vec![v]),
        Value::Array(items) => items.iter().map(Value::as_i64).collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LlmError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct CannedClient {
        response: String,
    }

    #[async_trait]
    impl ChatClient for CannedClient {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            Ok(self.response.clone())
        }
    }

    fn analyzer(response: &str) -> QueryAnalyzer {
        QueryAnalyzer::with_policy(
            Arc::new(CannedClient {
                response: response.to_string(),
            }),
            RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                attempt_timeout: Duration::from_secs(1),
            },
        )
    }

    const VALID: &str = r#"{
        "thought_process": ["step"],
        "company_info": {"name": "Samsung SDS", "origin": "South Korea",
                         "variations": ["Samsung", "삼성"], "confidence": 0.95},
        "temporal_info": {"years": [2024, 2025], "months": [10, 11, 12, 1],
                          "quarter": {"number": [4], "year": [2024]}, "confidence": 0.9},
        "content_info": {"domain": "IT services", "key_terms": ["earnings", "실적"],
                         "action_type": "earnings call", "confidence": 0.85}
    }"#;

    #[test]
    fn test_quarter_window_mapping() {
        assert_eq!(quarter_months(4), &[10, 11, 12, 1, 2, 3]);
        assert_eq!(quarter_months(1), &[3, 4, 5, 6, 7, 8]);
        // Adjacent windows overlap on purpose
        assert!(quarter_months(1).iter().any(|m| quarter_months(2).contains(m)));
    }

    #[tokio::test]
    async fn test_analyze_valid_output() {
        let result = analyzer(VALID)
            .analyze("Samsung SDS Q4 2024 earnings", (2025, 2))
            .await
            .unwrap();
        assert_eq!(result.company_info.variations.as_ref().unwrap()[0], "Samsung");
        let quarter = result.temporal_info.quarter.unwrap();
        assert_eq!(quarter.numbers(), &[4]);
        assert_eq!(result.original_query, "Samsung SDS Q4 2024 earnings");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let err = analyzer(VALID).analyze("  ", (2025, 2)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_malformed_output_exhausts_retries() {
        let err = analyzer("not json at all")
            .analyze("query", (2025, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::RetriesExhausted { attempts: 2 }));
    }

    #[test]
    fn test_company_list_collapses_to_first() {
        let raw = r#"{
            "company_info": [{"name": "Atara", "variations": ["Atara", "ATRA"], "confidence": 0.9}],
            "temporal_info": {"confidence": 0.0},
            "content_info": {"confidence": 0.0}
        }"#;
        let analysis = parse_analysis(raw, "q").unwrap();
        assert_eq!(analysis.company_info.name.as_deref(), Some("Atara"));
    }

    #[test]
    fn test_invalid_quarter_degrades_to_none() {
        let raw = r#"{
            "company_info": {"confidence": 0.0},
            "temporal_info": {"years": [2024],
                              "quarter": {"number": [7], "year": [2024]},
                              "confidence": 0.8},
            "content_info": {"confidence": 0.0}
        }"#;
        let analysis = parse_analysis(raw, "q").unwrap();
        assert!(analysis.temporal_info.quarter.is_none());
        assert_eq!(analysis.temporal_info.years, Some(vec![2024]));
    }

    #[test]
    fn test_scalar_quarter_fields_normalize_to_lists() {
        let raw = r#"{
            "company_info": {"confidence": 0.0},
            "temporal_info": {"quarter": {"number": 2, "year": 2024}, "confidence": 0.8},
            "content_info": {"confidence": 0.0}
        }"#;
        let analysis = parse_analysis(raw, "q").unwrap();
        let quarter = analysis.temporal_info.quarter.unwrap();
        assert_eq!(quarter.pairs().collect::<Vec<_>>(), vec![(2, 2024)]);
    }

    #[test]
    fn test_half_null_quarter_degrades_to_none() {
        let raw = r#"{
            "company_info": {"confidence": 0.0},
            "temporal_info": {"quarter": {"number": [2], "year": null}, "confidence": 0.8},
            "content_info": {"confidence": 0.0}
        }"#;
        let analysis = parse_analysis(raw, "q").unwrap();
        assert!(analysis.temporal_info.quarter.is_none());
    }
}

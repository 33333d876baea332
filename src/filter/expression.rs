//! Typed filter expression tree
//!
//! Two consumers: [`to_query_dsl`](FilterExpression::to_query_dsl) renders the
//! Elasticsearch bool/should JSON sent alongside the knn query, and
//! [`matched_categories`](FilterExpression::matched_categories) evaluates the
//! same expression locally so the in-memory store can reproduce the backend's
//! `matched_queries` behavior.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::{BoostCategory, Chunk};

/// Searchable document fields. Paths mirror the store mapping and are
/// load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    SenderName,
    SenderEmail,
    Subject,
    Text,
    Year,
    Month,
}

impl Field {
    pub fn path(&self) -> &'static str {
        match self {
            Field::SenderName => "metadata.sender_name",
            Field::SenderEmail => "metadata.sender_email",
            Field::Subject => "metadata.subject",
            Field::Text => "text",
            Field::Year => "metadata.year",
            Field::Month => "metadata.month",
        }
    }

    /// All free-text fields a company variation can appear in.
    pub const COMPANY_FIELDS: [Field; 4] = [
        Field::SenderName,
        Field::SenderEmail,
        Field::Subject,
        Field::Text,
    ];

    /// Fields searched for content terms and quarter notation.
    pub const CONTENT_FIELDS: [Field; 2] = [Field::Subject, Field::Text];
}

/// One leaf or nested condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// Case-insensitive wildcard match, e.g. `*Samsung*`
    Wildcard { field: Field, pattern: String },
    /// Exact integer term match against metadata
    Terms { field: Field, values: Vec<i64> },
    /// Nested at-least-one-match group
    AnyOf(Vec<Condition>),
}

impl Condition {
    pub fn wildcard(field: Field, pattern: impl Into<String>) -> Self {
        Condition::Wildcard {
            field,
            pattern: pattern.into(),
        }
    }

    fn to_query_dsl(&self) -> Value {
        match self {
            Condition::Wildcard { field, pattern } => json!({
                "wildcard": {
                    field.path(): {
                        "value": pattern,
                        "case_insensitive": true
                    }
                }
            }),
            Condition::Terms { field, values } => json!({
                "terms": { field.path(): values }
            }),
            Condition::AnyOf(conditions) => json!({
                "bool": {
                    "should": conditions.iter().map(|c| c.to_query_dsl()).collect::<Vec<_>>(),
                    "minimum_should_match": 1
                }
            }),
        }
    }

    fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Condition::Wildcard { field, pattern } => {
                wildcard_matches(pattern, field_text(chunk, *field))
            }
            Condition::Terms { field, values } => match field_integer(chunk, *field) {
                Some(value) => values.contains(&value),
                None => false,
            },
            Condition::AnyOf(conditions) => conditions.iter().any(|c| c.matches(chunk)),
        }
    }
}

/// One boost clause: a tagged at-least-one-match group with its weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostClause {
    pub category: BoostCategory,
    pub boost: f64,
    pub conditions: Vec<Condition>,
}

impl BoostClause {
    fn to_query_dsl(&self) -> Value {
        json!({
            "bool": {
                "should": self.conditions.iter().map(|c| c.to_query_dsl()).collect::<Vec<_>>(),
                "minimum_should_match": 1,
                "boost": self.boost,
                "_name": self.category.wire_name()
            }
        })
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.conditions.iter().any(|c| c.matches(chunk))
    }
}

/// Complete filter: a disjunction of tagged boost clauses. Empty means
/// retrieval degrades to pure vector similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterExpression {
    pub clauses: Vec<BoostClause>,
}

impl FilterExpression {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Clause for a given category, if present.
    pub fn clause(&self, category: BoostCategory) -> Option<&BoostClause> {
        self.clauses.iter().find(|c| c.category == category)
    }

    /// Render the Elasticsearch query DSL, or `None` when empty.
    pub fn to_query_dsl(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        Some(json!({
            "bool": {
                "should": self.clauses.iter().map(|c| c.to_query_dsl()).collect::<Vec<_>>(),
                "minimum_should_match": 1
            }
        }))
    }

    /// Evaluate which boost categories a chunk's document satisfies.
    pub fn matched_categories(&self, chunk: &Chunk) -> Vec<BoostCategory> {
        self.clauses
            .iter()
            .filter(|clause| clause.matches(chunk))
            .map(|clause| clause.category)
            .collect()
    }
}

fn field_text(chunk: &Chunk, field: Field) -> &str {
    match field {
        Field::SenderName => &chunk.metadata.sender_name,
        Field::SenderEmail => &chunk.metadata.sender_email,
        Field::Subject => &chunk.metadata.subject,
        Field::Text => &chunk.text,
        Field::Year | Field::Month => "",
    }
}

fn field_integer(chunk: &Chunk, field: Field) -> Option<i64> {
    match field {
        Field::Year => Some(chunk.metadata.year as i64),
        Field::Month => Some(chunk.metadata.month as i64),
        _ => None,
    }
}

/// Case-insensitive wildcard match. `*` matches any run of characters;
/// literal segments must occur in order.
fn wildcard_matches(pattern: &str, value: &str) -> bool {
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();

    let segments: Vec<&str> = pattern.split('*').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return true;
    }

    let mut cursor = 0usize;
    for (i, segment) in segments.iter().enumerate() {
        match value[cursor..].find(segment) {
            Some(offset) => {
                // An unanchored head segment may start anywhere; an anchored
                // one must start at the beginning.
                if i == 0 && !pattern.starts_with('*') && offset != 0 {
                    return false;
                }
                cursor += offset + segment.len();
            }
            None => return false,
        }
    }

    if !pattern.ends_with('*') {
        return value.ends_with(segments[segments.len() - 1]);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChunkMetadata, ChunkType};

    fn chunk(subject: &str, text: &str, year: i32, month: u32) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                conversation_id: "c1".to_string(),
                subject: subject.to_string(),
                sender_name: "Samsung SDS IR".to_string(),
                sender_email: "ir@samsungsds.com".to_string(),
                year,
                month,
                day: 15,
                chunk_type: ChunkType::EmailBody,
                chunk_index: 0,
                total_chunks: 1,
                attachment_metadata: None,
            },
        }
    }

    #[test]
    fn test_wildcard_matching() {
        assert!(wildcard_matches("*samsung*", "Samsung SDS earnings"));
        assert!(wildcard_matches("*Q4*24*", "Results for Q4 FY24"));
        assert!(!wildcard_matches("*24*Q4*", "Results for Q4 FY24"));
        assert!(wildcard_matches("*", "anything"));
        assert!(!wildcard_matches("*krafton*", "Samsung SDS earnings"));
    }

    #[test]
    fn test_terms_condition() {
        let c = chunk("s", "t", 2024, 11);
        let cond = Condition::Terms {
            field: Field::Year,
            values: vec![2024, 2025],
        };
        assert!(cond.matches(&c));
        let cond = Condition::Terms {
            field: Field::Month,
            values: vec![1, 2],
        };
        assert!(!cond.matches(&c));
    }

    #[test]
    fn test_matched_categories_tags() {
        let filter = FilterExpression {
            clauses: vec![
                BoostClause {
                    category: BoostCategory::Company,
                    boost: 2.0,
                    conditions: vec![Condition::wildcard(Field::SenderName, "*samsung*")],
                },
                BoostClause {
                    category: BoostCategory::Temporal,
                    boost: 1.5,
                    conditions: vec![Condition::Terms {
                        field: Field::Year,
                        values: vec![2023],
                    }],
                },
            ],
        };
        let c = chunk("s", "t", 2024, 11);
        assert_eq!(filter.matched_categories(&c), vec![BoostCategory::Company]);
    }

    #[test]
    fn test_query_dsl_shape() {
        let filter = FilterExpression {
            clauses: vec![BoostClause {
                category: BoostCategory::Company,
                boost: 2.0,
                conditions: vec![Condition::wildcard(Field::Text, "*samsung*")],
            }],
        };
        let dsl = filter.to_query_dsl().unwrap();
        let clause = &dsl["bool"]["should"][0]["bool"];
        assert_eq!(clause["_name"], "company_match");
        assert_eq!(clause["minimum_should_match"], 1);
        assert_eq!(
            clause["should"][0]["wildcard"]["text"]["value"],
            "*samsung*"
        );
        assert!(FilterExpression::default().to_query_dsl().is_none());
    }
}

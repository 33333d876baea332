//! Filter builder: analysis facets to boosted filter clauses
//!
//! Each facet contributes only when its confidence clears the threshold.
//! Clause weights encode entity > timing > topic: the right company matters
//! most, timing next, topic least.

use crate::schema::{
    BoostCategory, CompanyInfo, ContentInfo, QueryAnalysis, TemporalInfo,
};

use super::expression::{BoostClause, Condition, Field, FilterExpression};

const COMPANY_BOOST: f64 = 2.0;
const TEMPORAL_BOOST: f64 = 1.5;
const CONTENT_BOOST: f64 = 1.2;

/// Builds a [`FilterExpression`] from a [`QueryAnalysis`].
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    /// Facets at or below this confidence contribute nothing
    pub min_confidence: f64,
    /// Maximum company name variations used per filter
    pub company_variation_limit: usize,
    /// Maximum content terms used per filter
    pub content_term_limit: usize,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            company_variation_limit: 10,
            content_term_limit: 10,
        }
    }
}

impl FilterBuilder {
    pub fn new(company_variation_limit: usize, content_term_limit: usize) -> Self {
        Self {
            company_variation_limit,
            content_term_limit,
            ..Self::default()
        }
    }

    /// Build the boosted filter. Possibly empty: when no facet clears the
    /// confidence bar, retrieval degrades gracefully to pure vector search.
    pub fn build_filter(&self, analysis: &QueryAnalysis) -> FilterExpression {
        let mut clauses = Vec::new();

        if let Some(clause) = self.company_clause(&analysis.company_info) {
            clauses.push(clause);
        }
        if let Some(clause) = self.temporal_clause(&analysis.temporal_info) {
            clauses.push(clause);
        }
        if let Some(clause) = self.content_clause(&analysis.content_info) {
            clauses.push(clause);
        }

        FilterExpression { clauses }
    }

    fn company_clause(&self, info: &CompanyInfo) -> Option<BoostClause> {
        if info.confidence <= self.min_confidence {
            return None;
        }
        let variations = info.variations.as_deref().filter(|v| !v.is_empty())?;

        let mut conditions = Vec::new();
        for field in Field::COMPANY_FIELDS {
            for variation in variations.iter().take(self.company_variation_limit) {
                conditions.push(Condition::wildcard(field, format!("*{variation}*")));
            }
        }

        Some(BoostClause {
            category: BoostCategory::Company,
            boost: COMPANY_BOOST,
            conditions,
        })
    }

    fn temporal_clause(&self, info: &TemporalInfo) -> Option<BoostClause> {
        if info.confidence <= self.min_confidence {
            return None;
        }

        let mut conditions = Vec::new();

        if let Some(years) = info.years.as_deref().filter(|y| !y.is_empty()) {
            conditions.push(Condition::Terms {
                field: Field::Year,
                values: years.iter().map(|&y| y as i64).collect(),
            });
        }
        if let Some(months) = info.months.as_deref().filter(|m| !m.is_empty()) {
            conditions.push(Condition::Terms {
                field: Field::Month,
                values: months.iter().map(|&m| m as i64).collect(),
            });
        }

        // Quarter-labeled documents often carry no usable year/month metadata,
        // so also search the text for quarter notation in common conventions.
        if let Some(quarter) = &info.quarter {
            let mut quarter_conditions = Vec::new();
            for (q, y) in quarter.pairs() {
                let yy = format!("{:02}", y.rem_euclid(100));
                let patterns = [
                    format!("*Q{q}*{yy}*"),
                    format!("*{yy}*Q{q}*"),
                    format!("*{q}Q*{yy}*"),
                    format!("*{yy}*{q}Q*"),
                    format!("*{yy}*{q}분기*"),
                ];
                for pattern in patterns {
                    for field in Field::CONTENT_FIELDS {
                        quarter_conditions.push(Condition::wildcard(field, pattern.clone()));
                    }
                }
            }
            if !quarter_conditions.is_empty() {
                conditions.push(Condition::AnyOf(quarter_conditions));
            }
        }

        if conditions.is_empty() {
            return None;
        }
        Some(BoostClause {
            category: BoostCategory::Temporal,
            boost: TEMPORAL_BOOST,
            conditions,
        })
    }

    fn content_clause(&self, info: &ContentInfo) -> Option<BoostClause> {
        if info.confidence <= self.min_confidence {
            return None;
        }

        let mut terms: Vec<&str> = Vec::new();
        if let Some(key_terms) = &info.key_terms {
            terms.extend(key_terms.iter().map(String::as_str));
        }
        if let Some(action) = &info.action_type {
            terms.push(action);
        }

        let mut conditions = Vec::new();
        for term in terms.into_iter().take(self.content_term_limit) {
            for field in Field::CONTENT_FIELDS {
                conditions.push(Condition::wildcard(field, format!("*{term}*")));
            }
        }

        if conditions.is_empty() {
            return None;
        }
        Some(BoostClause {
            category: BoostCategory::Content,
            boost: CONTENT_BOOST,
            conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::QuarterInfo;

    fn analysis() -> QueryAnalysis {
        QueryAnalysis {
            thought_process: Vec::new(),
            company_info: CompanyInfo {
                name: Some("Samsung SDS".to_string()),
                origin: Some("South Korea".to_string()),
                variations: Some(vec![
                    "Samsung".to_string(),
                    "삼성".to_string(),
                    "Samsung SDS".to_string(),
                    "삼성SDS".to_string(),
                ]),
                confidence: 0.95,
            },
            temporal_info: TemporalInfo {
                years: Some(vec![2024, 2025]),
                months: Some(vec![10, 11, 12, 1]),
                quarter: Some(QuarterInfo::new(vec![4], vec![2024]).unwrap()),
                confidence: 0.9,
            },
            content_info: ContentInfo {
                domain: Some("IT services".to_string()),
                key_terms: Some(vec!["earnings".to_string(), "실적".to_string()]),
                action_type: Some("earnings call".to_string()),
                confidence: 0.85,
            },
            original_query: "Samsung SDS Q4 2024 earnings".to_string(),
        }
    }

    #[test]
    fn test_all_facets_produce_ordered_clauses() {
        let filter = FilterBuilder::default().build_filter(&analysis());
        let categories: Vec<_> = filter.clauses.iter().map(|c| c.category).collect();
        assert_eq!(
            categories,
            vec![
                BoostCategory::Company,
                BoostCategory::Temporal,
                BoostCategory::Content
            ]
        );

        // Entity outweighs timing outweighs topic
        let boosts: Vec<_> = filter.clauses.iter().map(|c| c.boost).collect();
        assert!(boosts[0] > boosts[1] && boosts[1] > boosts[2]);
    }

    #[test]
    fn test_confidence_gating() {
        let mut low = analysis();
        low.company_info.confidence = 0.5;
        low.content_info.confidence = 0.2;
        let filter = FilterBuilder::default().build_filter(&low);
        assert!(filter.clause(BoostCategory::Company).is_none());
        assert!(filter.clause(BoostCategory::Content).is_none());
        assert!(filter.clause(BoostCategory::Temporal).is_some());
    }

    #[test]
    fn test_no_confident_facets_gives_empty_filter() {
        let mut none = analysis();
        none.company_info.confidence = 0.0;
        none.temporal_info.confidence = 0.0;
        none.content_info.confidence = 0.0;
        assert!(FilterBuilder::default().build_filter(&none).is_empty());
    }

    #[test]
    fn test_company_variation_limit() {
        let mut many = analysis();
        many.company_info.variations =
            Some((0..50).map(|i| format!("var{i}")).collect());
        let builder = FilterBuilder::new(10, 10);
        let filter = builder.build_filter(&many);
        let clause = filter.clause(BoostCategory::Company).unwrap();
        // 4 fields x 10 variations
        assert_eq!(clause.conditions.len(), 40);
    }

    #[test]
    fn test_quarter_notation_patterns() {
        let filter = FilterBuilder::default().build_filter(&analysis());
        let clause = filter.clause(BoostCategory::Temporal).unwrap();
        let nested = clause
            .conditions
            .iter()
            .find_map(|c| match c {
                Condition::AnyOf(inner) => Some(inner),
                _ => None,
            })
            .expect("quarter conditions present");
        // 5 notation conventions x 2 fields for one (quarter, year) pair
        assert_eq!(nested.len(), 10);
        let has_korean = nested.iter().any(|c| match c {
            Condition::Wildcard { pattern, .. } => pattern.contains("분기"),
            _ => false,
        });
        assert!(has_korean);
    }

    #[test]
    fn test_missing_variations_drops_company_clause() {
        let mut no_vars = analysis();
        no_vars.company_info.variations = None;
        let filter = FilterBuilder::default().build_filter(&no_vars);
        assert!(filter.clause(BoostCategory::Company).is_none());
    }
}

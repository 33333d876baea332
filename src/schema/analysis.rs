//! Query analysis schema
//!
//! One [`QueryAnalysis`] is produced per query by the analyzer and discarded
//! after the response. The three facets are independent: each carries its own
//! confidence, and a facet below the confidence threshold contributes nothing
//! to filter construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures when constructing a [`QuarterInfo`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuarterValidationError {
    #[error("Quarter numbers must be between 1 and 4, got {0}")]
    NumberOutOfRange(u8),

    #[error("Quarter number and year lists must have the same non-zero length")]
    MismatchedLists,
}

/// Fiscal quarter references extracted from the query.
///
/// Invariant: `number` and `year` are parallel, non-empty lists of equal
/// length, and every number is in [1, 4]. The constructor is the only way to
/// build one, so a `QuarterInfo` that exists is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterInfo {
    number: Vec<u8>,
    year: Vec<i32>,
}

impl QuarterInfo {
    pub fn new(number: Vec<u8>, year: Vec<i32>) -> Result<Self, QuarterValidationError> {
        if number.is_empty() || number.len() != year.len() {
            return Err(QuarterValidationError::MismatchedLists);
        }
        if let Some(&bad) = number.iter().find(|&&q| !(1..=4).contains(&q)) {
            return Err(QuarterValidationError::NumberOutOfRange(bad));
        }
        Ok(Self { number, year })
    }

    pub fn numbers(&self) -> &[u8] {
        &self.number
    }

    pub fn years(&self) -> &[i32] {
        &self.year
    }

    /// Parallel (quarter, year) pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (u8, i32)> + '_ {
        self.number.iter().copied().zip(self.year.iter().copied())
    }
}

impl<'de> Deserialize<'de> for QuarterInfo {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            number: Vec<u8>,
            year: Vec<i32>,
        }
        let raw = Raw::deserialize(deserializer)?;
        QuarterInfo::new(raw.number, raw.year).map_err(serde::de::Error::custom)
    }
}

/// Company identity facet: primary name, origin country, and ordered name
/// variations.
///
/// Variation ordering is a contract: primary English name first, ticker only
/// for well-known tickers, then native-script forms. Downstream consumers may
/// rely on earlier variations being shorter and cleaner matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub variations: Option<Vec<String>>,
    #[serde(default)]
    pub confidence: f64,
}

/// Temporal facet: explicit year/month candidates plus an optional validated
/// quarter reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalInfo {
    #[serde(default)]
    pub years: Option<Vec<i32>>,
    #[serde(default)]
    pub months: Option<Vec<u32>>,
    #[serde(default)]
    pub quarter: Option<QuarterInfo>,
    #[serde(default)]
    pub confidence: f64,
}

/// Content facet: domain label, ordered key terms, and action type.
///
/// For non-English companies the key terms interleave English/native-script
/// pairs, each English term immediately followed by its translation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentInfo {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub key_terms: Option<Vec<String>>,
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Structured understanding of one free-text query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    #[serde(default)]
    pub thought_process: Vec<String>,
    pub company_info: CompanyInfo,
    pub temporal_info: TemporalInfo,
    pub content_info: ContentInfo,
    #[serde(default)]
    pub original_query: String,
}

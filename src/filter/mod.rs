//! Boosted filter construction from query analysis
//!
//! The filter is a soft signal: a single top-level at-least-one-match
//! expression whose clauses boost within vector search, never exclude. Each
//! clause carries its [`BoostCategory`](crate::schema::BoostCategory) as an
//! explicit tag from construction onward.

pub mod builder;
pub mod expression;

pub use builder::FilterBuilder;
pub use expression::{BoostClause, Condition, Field, FilterExpression};

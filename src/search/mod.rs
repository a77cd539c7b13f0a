//! Search functionality
//!
//! This module provides search capabilities:
//! - Tantivy n-gram index over chart names and descriptions
//! - Identity-keyed cache holding the index of the current dataset
//! - Search term tokenization
//! - Match highlighting for rendering

pub mod tantivy_search;
mod cache;
mod highlight;
mod query_parser;

pub use tantivy_search::ChartSearchIndex;
pub use cache::SearchIndexCache;
pub use highlight::get_match_positions;
pub use query_parser::{parse_search, ParsedQuery};

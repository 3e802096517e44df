pub mod facets;
pub mod fanout;
pub mod filter;
pub mod ranking;
pub mod stopwords;

use crate::model::ModelDescriptor;
use crate::types::{Operator, SearchTerms};
use std::sync::Arc;

pub use filter::Filters;
pub use ranking::{RankedHit, Ranking};

/// Which attributes a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Standard,
    /// Prefix matching on the model's `_ngrams` attributes.
    Autocomplete,
}

/// A compiled search over one base model and its descendants.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub model: Arc<ModelDescriptor>,
    pub terms: SearchTerms,
    /// Restrict matching to these declared fields.
    pub fields: Option<Vec<String>>,
    pub operator: Operator,
    pub order_by_relevance: bool,
    pub mode: SearchMode,
}

impl SearchQuery {
    pub fn new(model: Arc<ModelDescriptor>, terms: SearchTerms) -> Self {
        Self {
            model,
            terms,
            fields: None,
            operator: Operator::And,
            order_by_relevance: true,
            mode: SearchMode::Standard,
        }
    }

    pub fn autocomplete(mut self) -> Self {
        self.mode = SearchMode::Autocomplete;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn order_by_relevance(mut self, yes: bool) -> Self {
        self.order_by_relevance = yes;
        self
    }

    /// The `q` sent to the engine. Match-all queries send an empty string.
    pub fn q(&self) -> &str {
        self.terms.query_string().unwrap_or("")
    }
}

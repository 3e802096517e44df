use crate::error::{BridgeError, Result};
use crate::model::FILTER_SUFFIX;
use crate::types::Operator;

/// Validated `(field, value)` filter pairs and the connective joining them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pairs: Vec<(String, String)>,
    operator: Operator,
}

impl Filters {
    /// Rejects an empty list and pairs with an empty field name.
    pub fn new<F, V>(pairs: Vec<(F, V)>, operator: Operator) -> Result<Self>
    where
        F: Into<String>,
        V: Into<String>,
    {
        if pairs.is_empty() {
            return Err(BridgeError::InvalidFilter("No filters provided".to_string()));
        }
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(f, v)| (f.into(), v.into()))
            .collect();
        if let Some((field, value)) = pairs.iter().find(|(f, _)| f.trim().is_empty()) {
            return Err(BridgeError::InvalidFilter(format!(
                "Invalid filter item: ({:?}, {:?})",
                field, value
            )));
        }
        Ok(Self { pairs, operator })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Filter expression for an index exposing `filterable` attributes.
    /// Clauses on attributes the index cannot filter are dropped; `None`
    /// when nothing is left.
    pub fn expression_for(&self, filterable: &[String]) -> Option<String> {
        let clauses: Vec<String> = self
            .pairs
            .iter()
            .filter_map(|(field, value)| {
                let attribute = format!("{}{}", field, FILTER_SUFFIX);
                filterable
                    .contains(&attribute)
                    .then(|| clause(&attribute, value))
            })
            .collect();
        if clauses.is_empty() {
            return None;
        }
        Some(clauses.join(&format!(" {} ", self.operator)))
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn clause(attribute: &str, value: &str) -> String {
    format!("({} = '{}')", attribute, escape(value))
}

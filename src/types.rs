use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Record identifier, the numeric primary key shared by the relational
/// store and the remote index.
pub type RecordId = u64;

/// Remote index identifier (`app-Model`).
pub type IndexLabel = String;

/// A framework-native value read off a record before it is coerced for the
/// remote engine.
#[derive(Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Array(Vec<FieldValue>),
    Object(IndexMap<String, FieldValue>),
    /// A value produced on demand, e.g. a method on the model.
    Computed(Arc<dyn Fn() -> FieldValue + Send + Sync>),
}

impl FieldValue {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        FieldValue::Computed(Arc::new(f))
    }

    /// Empty or zero-like values, which are indexed as empty strings.
    pub fn is_falsy(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Integer(i) => *i == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Array(items) => items.is_empty(),
            FieldValue::Object(map) => map.is_empty(),
            FieldValue::DateTime(_) | FieldValue::Date(_) | FieldValue::Computed(_) => false,
        }
    }

    /// Coerce to the string form sent to the engine. Lists and mappings are
    /// joined with `", "` after coercing each element.
    pub fn to_index_string(&self) -> String {
        if self.is_falsy() {
            return String::new();
        }
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Array(items) => items
                .iter()
                .map(FieldValue::to_index_string)
                .collect::<Vec<_>>()
                .join(", "),
            FieldValue::Object(map) => map
                .values()
                .map(FieldValue::to_index_string)
                .collect::<Vec<_>>()
                .join(", "),
            FieldValue::Computed(f) => f().to_index_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::DateTime(dt) => dt.to_rfc3339(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Null => String::new(),
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "Null"),
            FieldValue::Bool(b) => write!(f, "Bool({})", b),
            FieldValue::Integer(i) => write!(f, "Integer({})", i),
            FieldValue::Float(x) => write!(f, "Float({})", x),
            FieldValue::Text(s) => write!(f, "Text({:?})", s),
            FieldValue::DateTime(dt) => write!(f, "DateTime({})", dt),
            FieldValue::Date(d) => write!(f, "Date({})", d),
            FieldValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            FieldValue::Object(map) => f.debug_tuple("Object").field(map).finish(),
            FieldValue::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            (FieldValue::Object(a), FieldValue::Object(b)) => a == b,
            (FieldValue::Computed(a), FieldValue::Computed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(dt: DateTime<Utc>) -> Self {
        FieldValue::DateTime(dt)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// The flat document sent to the remote engine: every value is a string,
/// except the numeric `id`, which always comes last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    pub id: RecordId,
}

impl IndexedDocument {
    pub fn new(id: RecordId) -> Self {
        Self {
            fields: IndexMap::new(),
            id,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Boolean connective between filter clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::And => f.write_str("AND"),
            Operator::Or => f.write_str("OR"),
        }
    }
}

impl FromStr for Operator {
    type Err = crate::error::BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            other => Err(crate::error::BridgeError::InvalidFilter(format!(
                "Unknown operator '{}'",
                other
            ))),
        }
    }
}

/// The user query as handed over by the content framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerms {
    Plain(String),
    Phrase(String),
    Fuzzy(String),
    MatchAll,
}

impl SearchTerms {
    /// The term string sent as `q`, or `None` for queries without one.
    pub fn query_string(&self) -> Option<&str> {
        match self {
            SearchTerms::Plain(s) | SearchTerms::Phrase(s) | SearchTerms::Fuzzy(s) => Some(s),
            SearchTerms::MatchAll => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.query_string(), Some(""))
    }
}

impl From<&str> for SearchTerms {
    fn from(s: &str) -> Self {
        SearchTerms::Plain(s.to_string())
    }
}

impl From<String> for SearchTerms {
    fn from(s: String) -> Self {
        SearchTerms::Plain(s)
    }
}

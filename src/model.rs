//! Content-model metadata and the record access the indexer relies on.
//!
//! The content framework owns models, their field declarations, and live
//! records. This module defines the typed view of those collaborators:
//! [`SearchField`] for declarations, [`ModelDescriptor`] per model,
//! [`ContentTypes`] for enumerating models, and [`SearchRecord`] for reading
//! values off a record.

use crate::types::{FieldValue, RecordId};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Suffix marking a field as filterable/facetable in the remote index.
pub const FILTER_SUFFIX: &str = "_filter";
/// Suffix marking a field for prefix (ngram) matching.
pub const AUTOCOMPLETE_SUFFIX: &str = "_ngrams";
/// Filter field every index exposes so results can be narrowed by content type.
pub const CONTENT_TYPE_FILTER: &str = "content_type_id_filter";
/// Record attributes consulted by the `delta` update strategy.
pub const TEMPORAL_FIELDS: [&str; 4] = [
    "created_at",
    "updated_at",
    "first_published_at",
    "last_published_at",
];

/// One search declaration on a model.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchField {
    Searchable { name: String, boost: Option<f64> },
    Filterable { name: String },
    Autocomplete { name: String, boost: Option<f64> },
    Related { name: String, fields: Vec<SearchField> },
}

impl SearchField {
    pub fn searchable(name: &str) -> Self {
        SearchField::Searchable {
            name: name.to_string(),
            boost: None,
        }
    }

    pub fn boosted(name: &str, boost: f64) -> Self {
        SearchField::Searchable {
            name: name.to_string(),
            boost: Some(boost),
        }
    }

    pub fn filterable(name: &str) -> Self {
        SearchField::Filterable {
            name: name.to_string(),
        }
    }

    pub fn autocomplete(name: &str) -> Self {
        SearchField::Autocomplete {
            name: name.to_string(),
            boost: None,
        }
    }

    pub fn related(name: &str, fields: Vec<SearchField>) -> Self {
        SearchField::Related {
            name: name.to_string(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SearchField::Searchable { name, .. }
            | SearchField::Filterable { name }
            | SearchField::Autocomplete { name, .. }
            | SearchField::Related { name, .. } => name,
        }
    }

    /// Key under which the field's value is stored in the indexed document.
    pub fn mapped_name(&self) -> String {
        match self {
            SearchField::Filterable { name } => format!("{}{}", name, FILTER_SUFFIX),
            SearchField::Autocomplete { name, .. } => format!("{}{}", name, AUTOCOMPLETE_SUFFIX),
            SearchField::Searchable { name, .. } | SearchField::Related { name, .. } => {
                name.clone()
            }
        }
    }

    /// Declared boost; missing or zero boosts weigh 1.
    pub fn boost(&self) -> Option<f64> {
        match self {
            SearchField::Searchable { boost, .. } | SearchField::Autocomplete { boost, .. } => {
                match boost {
                    Some(b) if *b != 0.0 && b.is_finite() => Some(*b),
                    _ => Some(1.0),
                }
            }
            SearchField::Filterable { .. } | SearchField::Related { .. } => None,
        }
    }
}

/// Boost weights for one model, keyed by mapped attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBoostMap {
    weights: IndexMap<String, f64>,
}

impl FieldBoostMap {
    pub fn from_fields(fields: &[SearchField]) -> Self {
        let mut weights = IndexMap::new();
        for field in fields {
            if let Some(boost) = field.boost() {
                weights.insert(field.mapped_name(), boost);
            }
        }
        Self { weights }
    }

    /// Weight of a matched attribute. Mapped names (`title_ngrams`) fall back
    /// to their base field; unknown attributes weigh 1.
    pub fn weight(&self, attribute: &str) -> f64 {
        if let Some(w) = self.weights.get(attribute) {
            return *w;
        }
        let base = attribute
            .strip_suffix(AUTOCOMPLETE_SUFFIX)
            .or_else(|| attribute.strip_suffix(FILTER_SUFFIX));
        base.and_then(|b| self.weights.get(b))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Search metadata for one content model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// Fully-qualified name, `app_label.ModelName`.
    pub name: String,
    /// Ancestors, nearest first. A model is a descendant of each entry.
    pub parents: Vec<String>,
    /// Concrete columns of the model, used to detect temporal fields.
    pub columns: Vec<String>,
    pub search_fields: Vec<SearchField>,
    /// Abstract bases are never indexed or searched directly.
    pub is_abstract: bool,
}

impl ModelDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parents: Vec::new(),
            columns: Vec::new(),
            search_fields: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn with_fields(mut self, fields: Vec<SearchField>) -> Self {
        self.search_fields.extend(fields);
        self
    }

    pub fn abstract_base(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Remote index label: the qualified name with `.` replaced by `-`.
    pub fn label(&self) -> String {
        index_label(&self.name)
    }

    pub fn autocomplete_fields(&self) -> impl Iterator<Item = &SearchField> {
        self.search_fields
            .iter()
            .filter(|f| matches!(f, SearchField::Autocomplete { .. }))
    }

    pub fn filterable_fields(&self) -> impl Iterator<Item = &SearchField> {
        self.search_fields
            .iter()
            .filter(|f| matches!(f, SearchField::Filterable { .. }))
    }

    pub fn field_boosts(&self) -> FieldBoostMap {
        FieldBoostMap::from_fields(&self.search_fields)
    }

    pub fn has_temporal_fields(&self) -> bool {
        self.columns
            .iter()
            .any(|c| TEMPORAL_FIELDS.contains(&c.as_str()))
    }

    pub fn is_descendant_of(&self, ancestor: &str) -> bool {
        self.name == ancestor || self.parents.iter().any(|p| p == ancestor)
    }
}

/// Index label for a fully-qualified model name.
pub fn index_label(model_name: &str) -> String {
    model_name.replace('.', "-")
}

/// Inverse of [`index_label`] for display.
pub fn model_name_from_label(label: &str) -> String {
    label.replace('-', ".")
}

/// The content framework's model registry.
pub trait ContentTypes: Send + Sync {
    fn model(&self, name: &str) -> Option<Arc<ModelDescriptor>>;

    /// Every registered model that is `name` or inherits from it.
    fn descendants(&self, name: &str) -> Vec<Arc<ModelDescriptor>>;

    fn indexed_models(&self) -> Vec<Arc<ModelDescriptor>>;

    fn is_indexed(&self, name: &str) -> bool {
        self.model(name).is_some_and(|m| !m.search_fields.is_empty())
    }
}

/// In-memory [`ContentTypes`] built from descriptors, preserving
/// registration order.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    models: IndexMap<String, Arc<ModelDescriptor>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: ModelDescriptor) -> Arc<ModelDescriptor> {
        let arc = Arc::new(model);
        self.models.insert(arc.name.clone(), Arc::clone(&arc));
        arc
    }

    pub fn with(mut self, model: ModelDescriptor) -> Self {
        self.register(model);
        self
    }
}

impl ContentTypes for ModelCatalog {
    fn model(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.models.get(name).map(Arc::clone)
    }

    fn descendants(&self, name: &str) -> Vec<Arc<ModelDescriptor>> {
        self.models
            .values()
            .filter(|m| m.is_descendant_of(name))
            .map(Arc::clone)
            .collect()
    }

    fn indexed_models(&self) -> Vec<Arc<ModelDescriptor>> {
        self.models
            .values()
            .filter(|m| !m.is_abstract && !m.search_fields.is_empty())
            .map(Arc::clone)
            .collect()
    }
}

/// Why a single field could not be read off a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractError(pub String);

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The value behind a related-field declaration.
#[derive(Clone)]
pub enum Related {
    Many(Vec<Arc<dyn SearchRecord>>),
    One(Arc<dyn SearchRecord>),
    Empty,
}

/// A live record of some content model.
pub trait SearchRecord: Send + Sync {
    fn pk(&self) -> RecordId;

    fn value(&self, field: &str) -> std::result::Result<FieldValue, ExtractError>;

    fn related(&self, field: &str) -> std::result::Result<Related, ExtractError> {
        Err(ExtractError(format!("'{}' is not a relation", field)))
    }
}

/// A plain record backed by a map of values, with named relations.
#[derive(Clone, Default)]
pub struct StaticRecord {
    pub id: RecordId,
    pub values: HashMap<String, FieldValue>,
    pub relations: HashMap<String, Related>,
}

impl StaticRecord {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    pub fn relate(mut self, field: &str, related: Related) -> Self {
        self.relations.insert(field.to_string(), related);
        self
    }
}

impl SearchRecord for StaticRecord {
    fn pk(&self) -> RecordId {
        self.id
    }

    fn value(&self, field: &str) -> std::result::Result<FieldValue, ExtractError> {
        if field == "id" {
            return Ok(FieldValue::Integer(self.id as i64));
        }
        self.values
            .get(field)
            .cloned()
            .ok_or_else(|| ExtractError(format!("no attribute '{}'", field)))
    }

    fn related(&self, field: &str) -> std::result::Result<Related, ExtractError> {
        self.relations
            .get(field)
            .cloned()
            .ok_or_else(|| ExtractError(format!("no relation '{}'", field)))
    }
}

use crate::model::{ModelDescriptor, Related, SearchField, SearchRecord};
use crate::types::IndexedDocument;

/// Result of reading one declared field off a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Value(String),
    /// The field could not be read; its key is left out of the document.
    Omit,
}

impl Extraction {
    fn into_value(self) -> Option<String> {
        match self {
            Extraction::Value(v) => Some(v),
            Extraction::Omit => None,
        }
    }
}

/// Read `field` off `record` and coerce it to its indexed string form.
pub fn extract_field(record: &dyn SearchRecord, field: &str) -> Extraction {
    match record.value(field) {
        Ok(value) => Extraction::Value(value.to_index_string()),
        Err(e) => {
            tracing::debug!(
                "Omitting field '{}' of record {}: {}",
                field,
                record.pk(),
                e
            );
            Extraction::Omit
        }
    }
}

fn related_key(parent: &str, sub: &SearchField) -> String {
    format!("{}__{}", parent, sub.mapped_name())
}

/// Flatten a related-field group into `parent__sub` entries. To-many
/// relations join every row's value into one string; a row that fails to
/// yield the sub-field omits the whole key.
fn extract_related(
    record: &dyn SearchRecord,
    name: &str,
    fields: &[SearchField],
) -> Vec<(String, Extraction)> {
    let related = match record.related(name) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(
                "Omitting related '{}' of record {}: {}",
                name,
                record.pk(),
                e
            );
            return Vec::new();
        }
    };

    let subs = fields
        .iter()
        .filter(|f| !matches!(f, SearchField::Related { .. }));

    match related {
        Related::Empty => Vec::new(),
        Related::One(row) => subs
            .map(|sub| (related_key(name, sub), extract_field(row.as_ref(), sub.name())))
            .collect(),
        Related::Many(rows) => subs
            .map(|sub| {
                let values: Option<Vec<String>> = rows
                    .iter()
                    .map(|row| extract_field(row.as_ref(), sub.name()).into_value())
                    .collect();
                let extraction = match values {
                    Some(values) => Extraction::Value(values.join(", ")),
                    None => Extraction::Omit,
                };
                (related_key(name, sub), extraction)
            })
            .collect(),
    }
}

/// Build the flat document for `record` from the model's search declarations.
///
/// Pure: the same record always maps to the same document. `id` is written
/// last, overriding any declared field of that name.
pub fn build_document(model: &ModelDescriptor, record: &dyn SearchRecord) -> IndexedDocument {
    let mut doc = IndexedDocument::new(record.pk());

    for field in &model.search_fields {
        let entries = match field {
            SearchField::Related { name, fields } => extract_related(record, name, fields),
            _ => vec![(field.mapped_name(), extract_field(record, field.name()))],
        };
        for (key, extraction) in entries {
            if let Extraction::Value(v) = extraction {
                doc.fields.insert(key, v);
            }
        }
    }

    doc.fields.shift_remove("id");
    doc.id = record.pk();
    doc
}

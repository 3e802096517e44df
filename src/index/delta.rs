//! Recency filtering for the delta update strategy.

use crate::config::DeltaWindow;
use crate::model::{ModelDescriptor, SearchRecord, TEMPORAL_FIELDS};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Whether `record` has any populated temporal field later than `since`.
///
/// Values that cannot be compared with a timestamp (text, bare dates, numbers)
/// are skipped field by field.
pub fn is_recent(model: &ModelDescriptor, record: &dyn SearchRecord, since: DateTime<Utc>) -> bool {
    if !model.has_temporal_fields() {
        return false;
    }
    TEMPORAL_FIELDS.iter().any(|field| {
        let Ok(value) = record.value(field) else {
            return false;
        };
        if value.is_falsy() {
            return false;
        }
        match value.as_datetime() {
            Some(ts) => ts > since,
            None => {
                tracing::trace!(
                    "Skipping {} on record {}: not a timestamp",
                    field,
                    record.pk()
                );
                false
            }
        }
    })
}

/// Keep the records modified after `now + window`. Models without any of the
/// temporal fields yield nothing.
pub fn filter_by_recency(
    model: &ModelDescriptor,
    records: &[Arc<dyn SearchRecord>],
    window: &DeltaWindow,
    now: DateTime<Utc>,
) -> Vec<Arc<dyn SearchRecord>> {
    if !model.has_temporal_fields() {
        return Vec::new();
    }
    let since = now + window.duration();
    records
        .iter()
        .filter(|r| is_recent(model, r.as_ref(), since))
        .cloned()
        .collect()
}

use crate::config::BridgeConfig;
use crate::engine::{SearchEngine, SettingsUpdate};
use crate::model::{ModelDescriptor, SearchField, CONTENT_TYPE_FILTER};

/// Engine settings derived for one model's index.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPlan {
    pub max_total_hits: usize,
    pub searchable_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub ranking_rules: Vec<String>,
    pub stop_words: Vec<String>,
}

impl SettingsPlan {
    pub fn for_model(model: &ModelDescriptor, config: &BridgeConfig) -> Self {
        Self {
            max_total_hits: config.query_limit,
            searchable_attributes: ordered_searchable_attributes(model),
            filterable_attributes: filterable_attributes(model),
            ranking_rules: config.ranking_rules.clone(),
            stop_words: config.stop_words.clone(),
        }
    }
}

/// Searchable and autocomplete attributes, highest boost first. The sort is
/// stable so equal boosts keep declaration order; repeated names keep their
/// first position.
///
/// Related fields are left out. Their flattened `parent__child` entries are
/// stored on the document but, with an explicit list in place, the engine
/// does not search them.
pub fn ordered_searchable_attributes(model: &ModelDescriptor) -> Vec<String> {
    let mut fields: Vec<(String, f64)> = model
        .search_fields
        .iter()
        .filter(|f| {
            matches!(
                f,
                SearchField::Searchable { .. } | SearchField::Autocomplete { .. }
            )
        })
        .map(|f| (f.mapped_name(), f.boost().unwrap_or(1.0)))
        .collect();

    fields.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut ordered: Vec<String> = Vec::with_capacity(fields.len());
    for (name, _) in fields {
        if !ordered.contains(&name) {
            ordered.push(name);
        }
    }
    ordered
}

/// The content-type discriminator followed by every declared filter field.
pub fn filterable_attributes(model: &ModelDescriptor) -> Vec<String> {
    let mut attributes = vec![CONTENT_TYPE_FILTER.to_string()];
    for field in model.filterable_fields() {
        let mapped = field.mapped_name();
        if !attributes.contains(&mapped) {
            attributes.push(mapped);
        }
    }
    attributes
}

/// One settings step that the engine rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsFailure {
    pub step: &'static str,
    pub reason: String,
}

/// Outcome of [`apply_settings`]. Failed steps never stop later ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsReport {
    pub applied: Vec<&'static str>,
    pub failed: Vec<SettingsFailure>,
}

impl SettingsReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, label: &str, step: &'static str, result: crate::error::Result<()>) {
        match result {
            Ok(()) => self.applied.push(step),
            Err(e) => {
                tracing::warn!("[SETTINGS {}] Failed to update {}: {}", label, step, e);
                self.failed.push(SettingsFailure {
                    step,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Push `plan` to index `label` in a fixed order: pagination, searchable
/// attributes, filterable attributes, ranking rules, stop words.
pub async fn apply_settings(
    engine: &dyn SearchEngine,
    label: &str,
    model_name: &str,
    plan: &SettingsPlan,
) -> SettingsReport {
    let mut report = SettingsReport::default();

    let result = engine
        .update_settings(label, &SettingsUpdate::pagination(plan.max_total_hits))
        .await;
    report.record(label, "pagination", result);

    if !plan.searchable_attributes.is_empty() {
        let result = engine
            .update_settings(
                label,
                &SettingsUpdate::searchable(plan.searchable_attributes.clone()),
            )
            .await;
        report.record(label, "searchable attributes", result);
    }

    let result = engine
        .update_filterable_attributes(label, &plan.filterable_attributes)
        .await;
    report.record(label, "filterable attributes", result);

    let result = engine
        .update_settings(label, &SettingsUpdate::ranking_rules(plan.ranking_rules.clone()))
        .await;
    report.record(label, "ranking rules", result);

    let result = engine
        .update_settings(label, &SettingsUpdate::stop_words(plan.stop_words.clone()))
        .await;
    report.record(label, "stop words", result);

    tracing::info!("[SETTINGS {}] Settings applied for {}", label, model_name);
    report
}

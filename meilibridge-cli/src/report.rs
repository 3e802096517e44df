//! Plain-text rendering of engine stats and index settings.

use meilibridge::engine::{EngineStats, IndexSettings, IndexStats};
use meilibridge::model::model_name_from_label;
use std::fmt::Write;

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
const RULE_WIDTH: usize = 80;

pub fn rule() -> String {
    "*".repeat(RULE_WIDTH)
}

/// `447819776` → `427.074 MB`.
pub fn human_readable_file_size(size_in_bytes: u64) -> String {
    let mut size = size_in_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 {
        size /= 1024.0;
        unit += 1;
    }
    match SIZE_UNITS.get(unit) {
        Some(suffix) => format!("{:.3} {}", size, suffix),
        None => "Index too large".to_string(),
    }
}

pub fn format_last_update(last_update: Option<&str>) -> String {
    match last_update {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => "never".to_string(),
    }
}

/// Which indexes `status` prints.
#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    pub models: Vec<String>,
    pub indexing_only: bool,
}

impl StatusFilter {
    pub fn new(models: Option<&str>, indexing_only: bool) -> Self {
        let models = models
            .map(|m| {
                m.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            models,
            indexing_only,
        }
    }

    pub fn matches(&self, model: &str, stats: &IndexStats) -> bool {
        if !self.models.is_empty() && !self.models.iter().any(|m| m == model) {
            return false;
        }
        !self.indexing_only || stats.is_indexing
    }
}

pub fn status_report(stats: &EngineStats, filter: &StatusFilter) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "Index DB size: {}",
        human_readable_file_size(stats.database_size)
    );
    let _ = writeln!(
        out,
        "Last updated: {}",
        format_last_update(stats.last_update.as_deref())
    );

    if stats.indexes.is_empty() {
        let _ = writeln!(out, "No indexes created yet");
    } else {
        let _ = writeln!(out, "Indexes:");
        for (label, index) in &stats.indexes {
            let model = model_name_from_label(label);
            if !filter.matches(&model, index) {
                continue;
            }
            let _ = writeln!(out, "{}", model);
            let _ = writeln!(out, "  Documents: {}", index.number_of_documents);
            if index.is_indexing {
                let _ = writeln!(out, "  INDEXING");
            }
            let _ = writeln!(out);
        }
    }
    let _ = writeln!(out, "{}", rule());
    out
}

fn json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "?".to_string())
}

/// One index's settings, stop words left out.
pub fn settings_block(label: &str, is_indexing: bool, settings: &IndexSettings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} - indexing: {}", label, is_indexing);
    let rows: [(&str, String); 10] = [
        ("displayedAttributes", json(&settings.displayed_attributes)),
        ("searchableAttributes", json(&settings.searchable_attributes)),
        ("filterableAttributes", json(&settings.filterable_attributes)),
        ("sortableAttributes", json(&settings.sortable_attributes)),
        ("rankingRules", json(&settings.ranking_rules)),
        ("synonyms", json(&settings.synonyms)),
        ("distinctAttribute", json(&settings.distinct_attribute)),
        ("typoTolerance", json(&settings.typo_tolerance)),
        ("faceting", json(&settings.faceting)),
        ("pagination", json(&settings.pagination)),
    ];
    for (name, value) in rows {
        let _ = writeln!(out, "\t {}: {}", name, value);
    }
    out
}

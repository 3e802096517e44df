use super::registry::IndexRegistry;
use super::settings::SettingsReport;
use super::{BulkReport, ModelIndex};
use crate::config::UpdateStrategy;
use crate::error::Result;
use crate::model::{ModelDescriptor, SearchRecord, TEMPORAL_FIELDS};
use std::sync::Arc;

/// Where an indexing run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPhase {
    Idle,
    SelectingStrategy,
    HardClearing,
    SoftUpserting,
    DeltaFiltering,
    SettingsApplied,
    /// A remote step errored; the run is over.
    Failed,
}

/// Destination of an indexing run's records.
#[derive(Debug)]
pub enum IndexSink {
    Live(Arc<ModelIndex>),
    /// Model is on the skip list: writes are accepted and dropped.
    Skipped { model: String },
}

impl IndexSink {
    pub fn is_skipped(&self) -> bool {
        matches!(self, IndexSink::Skipped { .. })
    }

    pub fn handle(&self) -> Option<&Arc<ModelIndex>> {
        match self {
            IndexSink::Live(handle) => Some(handle),
            IndexSink::Skipped { .. } => None,
        }
    }

    /// Registration hook; the handle is resolved when the sink is built.
    pub fn add_model(&self, _model: &ModelDescriptor) {}

    pub async fn add_item(&self, record: &dyn SearchRecord) -> Result<bool> {
        match self {
            IndexSink::Live(handle) => handle.add_item(record).await,
            IndexSink::Skipped { .. } => Ok(false),
        }
    }

    pub async fn add_items(&self, records: &[Arc<dyn SearchRecord>]) -> BulkReport {
        match self {
            IndexSink::Live(handle) => handle.add_items(records).await,
            IndexSink::Skipped { .. } => BulkReport::default(),
        }
    }
}

/// Drives one indexing run for one model:
/// `idle → selecting-strategy → {hard-clearing | soft-upserting |
/// delta-filtering} → settings-applied → idle`. A remote error on the way
/// goes through `failed` back to `idle`.
pub struct Rebuilder {
    registry: Arc<IndexRegistry>,
    model: Arc<ModelDescriptor>,
    phase: RebuildPhase,
    history: Vec<RebuildPhase>,
    settings: Option<SettingsReport>,
}

impl Rebuilder {
    pub fn new(registry: Arc<IndexRegistry>, model: Arc<ModelDescriptor>) -> Self {
        Self {
            registry,
            model,
            phase: RebuildPhase::Idle,
            history: vec![RebuildPhase::Idle],
            settings: None,
        }
    }

    pub fn phase(&self) -> RebuildPhase {
        self.phase
    }

    /// Every phase entered since construction, in order.
    pub fn history(&self) -> &[RebuildPhase] {
        &self.history
    }

    /// Settings outcome of the last run, if it got that far.
    pub fn settings_report(&self) -> Option<&SettingsReport> {
        self.settings.as_ref()
    }

    fn enter(&mut self, phase: RebuildPhase) {
        tracing::trace!(
            "[REBUILD {}] {:?} -> {:?}",
            self.model.label(),
            self.phase,
            phase
        );
        self.phase = phase;
        self.history.push(phase);
    }

    /// Prepare the model's index for a run and return the sink to write to.
    /// Skip-listed models return a no-op sink before any remote call.
    pub async fn start(&mut self) -> Result<IndexSink> {
        let label = self.model.label();
        let config = self.registry.config();

        if config.is_skipped(&self.model.name) {
            tracing::info!("[REBUILD {}] SKIPPING: {}", label, self.model.name);
            return Ok(IndexSink::Skipped {
                model: self.model.name.clone(),
            });
        }
        let strategy = config.update_strategy;

        self.enter(RebuildPhase::SelectingStrategy);
        match self.prepare(strategy).await {
            Ok(handle) => {
                let report = self.registry.apply_settings(&handle).await;
                self.settings = Some(report);
                self.enter(RebuildPhase::SettingsApplied);
                Ok(IndexSink::Live(handle))
            }
            Err(e) => {
                tracing::warn!("[REBUILD {}] Run aborted: {}", label, e);
                self.enter(RebuildPhase::Failed);
                self.enter(RebuildPhase::Idle);
                Err(e)
            }
        }
    }

    async fn prepare(&mut self, strategy: UpdateStrategy) -> Result<Arc<ModelIndex>> {
        let label = self.model.label();
        let handle = match strategy {
            UpdateStrategy::Hard => {
                self.enter(RebuildPhase::HardClearing);
                let old = self.registry.get_or_create(&self.model).await?;
                old.delete_all_documents().await?;
                tracing::info!("[REBUILD {}] Documents cleared", label);
                self.registry.get_or_create(&self.model).await?
            }
            UpdateStrategy::Soft => {
                self.enter(RebuildPhase::SoftUpserting);
                self.registry.get_or_create(&self.model).await?
            }
            UpdateStrategy::Delta => {
                self.enter(RebuildPhase::DeltaFiltering);
                if !self.model.has_temporal_fields() {
                    tracing::warn!(
                        "[REBUILD {}] {} has no temporal field ({}); delta runs index none of its records",
                        label,
                        self.model.name,
                        TEMPORAL_FIELDS.join(", ")
                    );
                }
                self.registry.get_or_create(&self.model).await?
            }
        };
        Ok(handle)
    }

    /// Signal the end of the run.
    pub fn finish(&mut self) {
        self.enter(RebuildPhase::Idle);
    }
}

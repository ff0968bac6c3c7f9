//! Model lifecycle and the end-to-end selection pipeline.
//!
//! The orchestrator owns the history store, the coupling index and the model
//! slot. A selection request is never answered without a ready model: in
//! `NO_MODEL` the orchestrator first loads a persisted artifact, or trains
//! one from history (synthesizing history when configured and empty). An
//! unusable artifact or a schema mismatch triggers exactly one retrain.

mod slot;

pub use slot::{ModelSlot, ModelState, TrainingGuard};

use crate::config::SelectorConfig;
use crate::core::{ChangeSet, HistoryEntry, TestId};
use crate::coupling::CouplingIndex;
use crate::errors::{Error, Result};
use crate::features::{FeatureBuilder, FeatureVector};
use crate::history::{HistoryAggregates, HistorySnapshot, HistoryStore};
use crate::model::{train, ModelStore, RiskModel, TrainingBudget};
use crate::priority::{select, Candidate, Constraints, Prioritizer, SelectionResult};
use crate::synthetic::HistoryGenerator;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Inputs behind one test's score
#[derive(Debug, Clone, Serialize)]
pub struct TestEvidence {
    pub test_id: TestId,
    pub probability: f64,
    pub impact: f64,
    pub features: FeatureVector,
    pub aggregates: HistoryAggregates,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionOutcome {
    pub result: SelectionResult,
    pub model_version: u64,
    /// Rank order, matching `result.trace`
    pub evidence: Vec<TestEvidence>,
}

pub struct Orchestrator {
    config: SelectorConfig,
    history: HistoryStore,
    coupling: RwLock<CouplingIndex>,
    models: Option<ModelStore>,
    slot: ModelSlot,
    prioritizer: Prioritizer,
}

impl Orchestrator {
    /// Orchestrator whose models live only in memory.
    pub fn new(config: SelectorConfig, history: HistoryStore, coupling: CouplingIndex) -> Self {
        let prioritizer = Prioritizer::new(config.scoring)
            .with_failure_rate_prior(config.features.failure_rate_prior);
        let coupling = coupling.with_file_level_impact(config.coupling.file_level_impact);
        Self {
            config,
            history,
            coupling: RwLock::new(coupling),
            models: None,
            slot: ModelSlot::new(),
            prioritizer,
        }
    }

    pub fn with_model_store(mut self, store: ModelStore) -> Self {
        self.models = Some(store);
        self
    }

    /// Durable orchestrator rooted at `root`, using the `[data]` paths.
    pub fn open(config: SelectorConfig, root: &Path) -> Result<Self> {
        let history = HistoryStore::open(&root.join(&config.data.history_file))?;
        let coupling_path = root.join(&config.data.coupling_file);
        let coupling = if coupling_path.exists() {
            CouplingIndex::load(&coupling_path)?
        } else {
            CouplingIndex::new()
        };
        let models = ModelStore::new(root.join(&config.data.model_dir));
        Ok(Self::new(config, history, coupling).with_model_store(models))
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn coupling(&self) -> CouplingIndex {
        self.coupling.read().clone()
    }

    pub fn set_coupling(&self, coupling: CouplingIndex) {
        *self.coupling.write() =
            coupling.with_file_level_impact(self.config.coupling.file_level_impact);
    }

    pub fn state(&self) -> ModelState {
        self.slot.state()
    }

    pub fn model(&self) -> Option<Arc<RiskModel>> {
        self.slot.current()
    }

    /// Return the served model, loading or training one first if needed.
    pub fn ensure_ready(&self) -> Result<Arc<RiskModel>> {
        if let Some(model) = self.slot.current() {
            return Ok(model);
        }
        let guard = self.slot.begin_training();
        if let Some(model) = self.slot.current() {
            return Ok(model);
        }

        match self.load_persisted() {
            Ok(Some(model)) => {
                info!(version = model.version(), family = %model.family(), "loaded risk model");
                return Ok(guard.install(model));
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable_by_retrain() => {
                warn!(error = %e, "persisted risk model unusable, retraining");
                guard.clear();
            }
            Err(e) => return Err(e),
        }
        self.train_and_install(&guard, TrainingBudget::from_config(&self.config.model), None)
    }

    /// Train a replacement model and swap it in.
    ///
    /// The served model stays in place, and keeps serving, until the new one
    /// has been trained, validated and persisted. On any failure it remains
    /// the served model.
    pub fn retrain(&self, budget: TrainingBudget) -> Result<Arc<RiskModel>> {
        let guard = self.slot.begin_training();
        let previous = match self.slot.current() {
            Some(model) => Some(model),
            // Versions continue from a persisted model even when none is loaded
            None => self.load_persisted().ok().flatten().map(Arc::new),
        };
        self.train_and_install(&guard, budget, previous.as_deref())
    }

    pub fn select(&self, change_set: &ChangeSet) -> Result<SelectionOutcome> {
        self.select_with(change_set, &Constraints::from_config(&self.config.selection))
    }

    pub fn select_with(&self, change_set: &ChangeSet, constraints: &Constraints) -> Result<SelectionOutcome> {
        constraints.validate()?;
        let model = self.ensure_ready()?;
        match self.select_using(&model, change_set, constraints) {
            Err(e) if e.is_recoverable_by_retrain() => {
                warn!(error = %e, version = model.version(), "served model rejected features, retraining");
                let model = self.retrain(TrainingBudget::from_config(&self.config.model))?;
                self.select_using(&model, change_set, constraints)
            }
            other => other,
        }
    }

    /// Record one real execution. The only path that advances history.
    pub fn record_outcome(&self, test_id: impl Into<TestId>, entry: HistoryEntry) -> Result<()> {
        self.history.append(test_id, entry)
    }

    /// Every test known to history or to the coupling index.
    pub fn known_tests(&self) -> Vec<TestId> {
        candidate_tests(&self.history.snapshot(), &self.coupling.read())
    }

    fn load_persisted(&self) -> Result<Option<RiskModel>> {
        match &self.models {
            Some(store) => store.load(crate::features::FeatureSchema::current()),
            None => Ok(None),
        }
    }

    fn train_and_install(
        &self,
        guard: &TrainingGuard<'_>,
        budget: TrainingBudget,
        previous: Option<&RiskModel>,
    ) -> Result<Arc<RiskModel>> {
        let _span = info_span!("retrain", previous = previous.map(RiskModel::version)).entered();
        self.prepare_history()?;

        let snapshot = self.history.snapshot();
        let samples = {
            let coupling = self.coupling.read();
            FeatureBuilder::new(&snapshot, &coupling, &self.config.features).training_samples()
        };
        let model = train(&samples, &self.config.model, budget)?;

        let accuracy = model.metadata().validation.accuracy;
        let required = self.config.model.min_validation_accuracy;
        if accuracy < required {
            warn!(accuracy, required, "trained model failed validation gate");
            return Err(Error::ValidationGate { accuracy, required });
        }

        let model = model.with_version(previous.map_or(1, |m| m.version() + 1));
        if let Some(store) = &self.models {
            store.save(&model)?;
        }
        info!(version = model.version(), accuracy, "risk model ready");
        Ok(guard.install(model))
    }

    /// Make sure there is history to train on.
    fn prepare_history(&self) -> Result<()> {
        if !self.history.is_empty() {
            return Ok(());
        }
        if !self.config.model.synthesize_when_empty {
            return Err(Error::insufficient_data(
                "history is empty and synthesis is disabled",
                0,
                self.config.model.min_training_samples,
            ));
        }

        let generated = HistoryGenerator::new(self.config.model.seed)
            .generate(self.config.model.synthetic_runs, self.history.next_run_index());
        let appended = generated.load_into(&self.history)?;
        if self.coupling.read().is_empty() {
            self.set_coupling(generated.coupling);
        }
        info!(entries = appended, "synthesized history for empty store");
        Ok(())
    }

    fn select_using(
        &self,
        model: &RiskModel,
        change_set: &ChangeSet,
        constraints: &Constraints,
    ) -> Result<SelectionOutcome> {
        let _span = info_span!("select", files = change_set.len(), model = model.version()).entered();
        let snapshot = self.history.snapshot();
        let coupling = self.coupling.read();
        let tests = candidate_tests(&snapshot, &coupling);
        let features = FeatureBuilder::new(&snapshot, &coupling, &self.config.features)
            .build_all(&tests, change_set);
        drop(coupling);

        let probabilities = features
            .par_iter()
            .map(|f| model.predict(&f.features))
            .collect::<Result<Vec<f64>>>()?;

        let defaults = &self.config.features;
        let candidates: Vec<Candidate> = features
            .iter()
            .zip(&probabilities)
            .map(|(f, &probability)| Candidate {
                test_id: f.test_id.clone(),
                score: self.prioritizer.score(probability, f.impact, &f.aggregates),
                mean_duration: f.aggregates.mean_duration.unwrap_or(defaults.duration_secs),
                mean_coverage: f.aggregates.mean_coverage.unwrap_or(defaults.coverage),
            })
            .collect();

        let result = select(candidates, constraints)?;

        let mut evidence: Vec<TestEvidence> = features
            .into_iter()
            .zip(probabilities)
            .map(|(f, probability)| TestEvidence {
                test_id: f.test_id,
                probability,
                impact: f.impact,
                features: f.features,
                aggregates: f.aggregates,
            })
            .collect();
        let rank: std::collections::HashMap<&str, usize> = result
            .trace
            .iter()
            .map(|d| (d.test_id.as_str(), d.rank))
            .collect();
        evidence.sort_by_key(|e| rank.get(e.test_id.as_str()).copied().unwrap_or(usize::MAX));

        info!(
            selected = result.len(),
            candidates = tests.len(),
            reduction = result.summary.reduction_percentage,
            "selection complete"
        );
        Ok(SelectionOutcome {
            result,
            model_version: model.version(),
            evidence,
        })
    }
}

fn candidate_tests(history: &HistorySnapshot, coupling: &CouplingIndex) -> Vec<TestId> {
    history
        .tests()
        .chain(coupling.tests())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelFamily;
    use crate::core::Outcome;

    fn fast_config() -> SelectorConfig {
        let mut config = SelectorConfig::default();
        config.model.family = ModelFamily::LogisticRegression;
        config.model.synthetic_runs = 30;
        config.model.min_validation_accuracy = 0.0;
        config
    }

    #[test]
    fn test_no_model_trains_before_first_selection() {
        let orchestrator = Orchestrator::new(fast_config(), HistoryStore::in_memory(), CouplingIndex::new());
        assert_eq!(orchestrator.state(), ModelState::NoModel);

        let outcome = orchestrator.select(&ChangeSet::empty()).unwrap();
        assert_eq!(orchestrator.state(), ModelState::Ready);
        assert_eq!(outcome.model_version, 1);
        assert_eq!(outcome.evidence.len(), 43);
        assert!(outcome.result.len() >= 5);
    }

    #[test]
    fn test_empty_history_without_synthesis_is_insufficient() {
        let mut config = fast_config();
        config.model.synthesize_when_empty = false;
        let orchestrator = Orchestrator::new(config, HistoryStore::in_memory(), CouplingIndex::new());
        let err = orchestrator.select(&ChangeSet::empty()).unwrap_err();
        assert!(err.is_insufficient_data());
        assert_eq!(orchestrator.state(), ModelState::NoModel);
    }

    #[test]
    fn test_retrain_bumps_version() {
        let orchestrator = Orchestrator::new(fast_config(), HistoryStore::in_memory(), CouplingIndex::new());
        let first = orchestrator.ensure_ready().unwrap();
        let second = orchestrator.retrain(TrainingBudget::unbounded()).unwrap();
        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 2);
        assert_eq!(orchestrator.model().unwrap().version(), 2);
    }

    #[test]
    fn test_record_outcome_rejects_out_of_order_run() {
        let orchestrator = Orchestrator::new(fast_config(), HistoryStore::in_memory(), CouplingIndex::new());
        orchestrator
            .record_outcome("t::a", HistoryEntry::new(5, Outcome::Pass, 0.1, 0.8))
            .unwrap();
        let err = orchestrator
            .record_outcome("t::a", HistoryEntry::new(5, Outcome::Fail, 0.1, 0.8))
            .unwrap_err();
        assert_eq!(err.code(), "E050");
    }

    #[test]
    fn test_invalid_constraints_fail_before_training() {
        let orchestrator = Orchestrator::new(fast_config(), HistoryStore::in_memory(), CouplingIndex::new());
        let constraints = Constraints {
            min_tests: 10,
            max_tests: 3,
            ..Constraints::default()
        };
        let err = orchestrator.select_with(&ChangeSet::empty(), &constraints).unwrap_err();
        assert_eq!(err.code(), "E040");
        assert_eq!(orchestrator.state(), ModelState::NoModel);
    }
}

mod common;

use common::{fixture_config, fixture_coupling, fixture_history};
use pretty_assertions::assert_eq;
use testimpact::config::{FeatureDefaults, ModelFamily};
use testimpact::features::{FeatureBuilder, FeatureSchema, FeatureVector, FEATURE_COUNT};
use testimpact::model::{train, ModelStore, TrainingBudget};
use testimpact::{ChangeSet, HistoryStore, ModelState, Orchestrator};

fn samples() -> Vec<testimpact::features::TrainingSample> {
    let history = fixture_history(30).snapshot();
    let coupling = fixture_coupling();
    FeatureBuilder::new(&history, &coupling, &FeatureDefaults::default()).training_samples()
}

#[test]
fn test_saved_model_predicts_identically_after_reload() {
    let samples = samples();
    let batch: Vec<FeatureVector> = samples.iter().take(60).map(|s| s.features).collect();
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());

    for family in [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::LogisticRegression,
    ] {
        let mut config = fixture_config().model;
        config.family = family;
        config.n_estimators = 15;
        let model = train(&samples, &config, TrainingBudget::unbounded()).unwrap();
        store.save(&model).unwrap();

        let reloaded = store.load(FeatureSchema::current()).unwrap().unwrap();
        assert_eq!(reloaded.family(), family);
        assert_eq!(model.predict_batch(&batch).unwrap(), reloaded.predict_batch(&batch).unwrap());
    }
}

#[test]
fn test_training_below_minimum_keeps_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());

    let rich = Orchestrator::new(fixture_config(), fixture_history(30), fixture_coupling())
        .with_model_store(store.clone());
    assert_eq!(rich.retrain(TrainingBudget::unbounded()).unwrap().version(), 1);

    // One test, twenty runs: below the 50-sample minimum
    let sparse_history = HistoryStore::in_memory();
    for run in 1..=20u64 {
        let outcome = if run % 4 == 0 {
            testimpact::Outcome::Fail
        } else {
            testimpact::Outcome::Pass
        };
        sparse_history
            .append("pkg/test_auth.py::test_case_00", testimpact::HistoryEntry::new(run, outcome, 0.1, 0.5))
            .unwrap();
    }
    let sparse = Orchestrator::new(fixture_config(), sparse_history, fixture_coupling())
        .with_model_store(store.clone());
    let err = sparse.retrain(TrainingBudget::unbounded()).unwrap_err();
    assert!(err.is_insufficient_data());

    let persisted = store.load(FeatureSchema::current()).unwrap().unwrap();
    assert_eq!(persisted.version(), 1);
    assert_eq!(sparse.ensure_ready().unwrap().version(), 1);
}

#[test]
fn test_failed_retrain_leaves_served_model_in_place() {
    let orchestrator = Orchestrator::new(fixture_config(), fixture_history(30), fixture_coupling());
    let served = orchestrator.ensure_ready().unwrap();

    let mut strict = fixture_config();
    strict.model.min_training_samples = 1_000_000;
    let strict_orchestrator = Orchestrator::new(strict, fixture_history(30), fixture_coupling());
    assert!(strict_orchestrator.retrain(TrainingBudget::unbounded()).is_err());
    assert_eq!(strict_orchestrator.state(), ModelState::NoModel);

    assert_eq!(orchestrator.model().unwrap().version(), served.version());
    assert_eq!(orchestrator.state(), ModelState::Ready);
}

#[test]
fn test_corrupt_artifact_triggers_retrain() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    std::fs::write(store.path_for(FeatureSchema::current()), b"\x00\x01garbage").unwrap();

    let orchestrator = Orchestrator::new(fixture_config(), fixture_history(30), fixture_coupling())
        .with_model_store(store.clone());
    let outcome = orchestrator.select(&ChangeSet::empty()).unwrap();
    assert_eq!(outcome.model_version, 1);

    // The retrained artifact replaced the corrupt one
    assert!(store.load(FeatureSchema::current()).unwrap().is_some());
}

#[test]
fn test_foreign_schema_vector_is_rejected() {
    let model = train(&samples(), &fixture_config().model, TrainingBudget::unbounded()).unwrap();
    let foreign = FeatureSchema {
        version: FeatureSchema::current().version + 1,
        layout: 7,
    };
    let err = model
        .predict(&FeatureVector::with_schema(foreign, [0.0; FEATURE_COUNT]))
        .unwrap_err();
    assert_eq!(err.code(), "E031");
    assert!(err.is_recoverable_by_retrain());
}

#[test]
fn test_training_budget_limits_ensemble_size() {
    let mut config = fixture_config().model;
    config.n_estimators = 40;
    let budget = TrainingBudget {
        max_iterations: Some(4),
        max_duration: None,
    };
    let model = train(&samples(), &config, budget).unwrap();
    assert_eq!(model.metadata().iterations, 4);
    assert_eq!(model.metadata().sample_count, 30 * 43);
    assert!(model.metadata().validation.accuracy > 0.5);
}

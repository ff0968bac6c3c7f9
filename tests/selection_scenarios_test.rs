mod common;

use common::{auth_tests, fixture_config, fixture_orchestrator, AUTH};
use pretty_assertions::assert_eq;
use testimpact::priority::{BindingConstraint, Constraints};
use testimpact::{ChangeSet, ModelState};

#[test]
fn test_change_to_one_module_ranks_its_coupled_tests() {
    let orchestrator = fixture_orchestrator();
    let outcome = orchestrator.select(&ChangeSet::from_changed_paths(&[AUTH])).unwrap();
    let coupled = auth_tests();

    assert_eq!(outcome.evidence.len(), 43);
    for evidence in &outcome.evidence {
        if coupled.contains(&evidence.test_id) {
            assert!(evidence.impact > 0.0, "{} should be impacted", evidence.test_id);
        } else {
            assert_eq!(evidence.impact, 0.0, "{} should not be impacted", evidence.test_id);
        }
    }

    let risky: Vec<_> = outcome
        .evidence
        .iter()
        .filter(|e| coupled.contains(&e.test_id) && e.probability > 0.7)
        .collect();
    assert!(!risky.is_empty());
    for evidence in risky {
        assert!(outcome.result.contains(&evidence.test_id));
    }
    for test in &coupled {
        assert!(outcome.result.contains(test), "{} missing from selection", test);
    }
}

#[test]
fn test_empty_change_still_meets_minimum() {
    let orchestrator = fixture_orchestrator();
    let outcome = orchestrator.select(&ChangeSet::empty()).unwrap();

    assert!(outcome.evidence.iter().all(|e| e.impact == 0.0));
    assert!(outcome.result.len() >= fixture_config().selection.min_tests);
    assert_eq!(orchestrator.state(), ModelState::Ready);
}

#[test]
fn test_reselecting_unchanged_input_is_identical() {
    let orchestrator = fixture_orchestrator();
    let change = ChangeSet::from_changed_paths(&["pkg/db.py"]);
    let first = orchestrator.select(&change).unwrap();
    let second = orchestrator.select(&change).unwrap();

    assert_eq!(first.result, second.result);
    assert_eq!(first.model_version, second.model_version);
}

#[test]
fn test_selection_respects_max_tests() {
    let orchestrator = fixture_orchestrator();
    let constraints = Constraints {
        min_tests: 2,
        max_tests: 3,
        ..Constraints::from_config(&fixture_config().selection)
    };
    let outcome = orchestrator
        .select_with(&ChangeSet::from_changed_paths(&[AUTH]), &constraints)
        .unwrap();

    assert_eq!(outcome.result.len(), 3);
    assert_eq!(outcome.result.binding_constraint, Some(BindingConstraint::MaxTests));
    assert_eq!(outcome.result.trace.len(), 43);
}

#[test]
fn test_unsatisfiable_constraints_surface_to_caller() {
    let orchestrator = fixture_orchestrator();
    let constraints = Constraints {
        min_tests: 50,
        max_tests: 10,
        ..Constraints::default()
    };
    let err = orchestrator
        .select_with(&ChangeSet::empty(), &constraints)
        .unwrap_err();
    assert_eq!(err.code(), "E040");
}

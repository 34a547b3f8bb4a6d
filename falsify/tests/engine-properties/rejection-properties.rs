//! Rejection properties
//!
//! `assume` and `filter` are two spellings of the same thing: rejected
//! trials are torn down, never reported as failures, and a predicate that
//! can never hold ends the run as unsatisfiable.

use crate::{seeded, Recorder};
use falsify::*;

fn assuming_positive() -> TestCase<Recorder> {
    TestCase::new("assuming_positive", |_: &mut Recorder, trial: &Trial| {
        let x = *trial.arg::<i64>("x");
        trial.assume(x > 0);
        x < 50
    })
    .param("x", Strategy::int_range(-100, 100))
    .with_config(seeded(21))
}

fn filtering_positive() -> TestCase<Recorder> {
    TestCase::new("filtering_positive", |_: &mut Recorder, trial: &Trial| {
        *trial.arg::<i64>("x") < 50
    })
    .param("x", Strategy::int_range(-100, 100).filter(|x| *x > 0))
    .with_config(seeded(21))
}

/// Property: both spellings find the same minimal counterexample
pub fn test_filter_and_assume_agree() {
    let mut assumed = Recorder::default();
    let mut filtered = Recorder::default();
    let by_assume = assuming_positive().run(&mut assumed);
    let by_filter = filtering_positive().run(&mut filtered);

    for result in [&by_assume, &by_filter] {
        assert_eq!(
            result.counterexample().and_then(|e| e.get::<i64>("x")),
            Some(&50),
            "{result}"
        );
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Assertion));
    }
    assert!(assumed.balanced());
    assert!(filtered.balanced());

    // A filtered parameter never reaches the body with a rejected value.
    assert!(filtered
        .teardowns
        .iter()
        .filter_map(|e| e.get::<i64>("x"))
        .all(|x| *x > 0));
}

/// Property: an assumption that never holds gives up after the discard limit
pub fn test_impossible_assume_is_unsatisfiable() {
    let mut host = Recorder::default();
    let test = TestCase::new("never", |_: &mut Recorder, trial: &Trial| trial.assume(false))
        .param("x", Strategy::integers())
        .with_config(seeded(1).with_discards(50));

    match test.run(&mut host) {
        TestResult::Unsatisfiable {
            tests_run,
            discards,
            ..
        } => {
            assert_eq!(tests_run, 0);
            assert_eq!(discards, 51);
        }
        other => panic!("expected unsatisfiable, got {other}"),
    }
    assert_eq!(host.setups, 51);
    assert!(host.balanced());
}

/// Property: a filter that never holds exhausts within a single trial
pub fn test_impossible_filter_is_unsatisfiable() {
    let mut host = Recorder::default();
    let test = TestCase::new("never", |_: &mut Recorder, _trial: &Trial| ())
        .param("x", Strategy::integers().filter(|_| false))
        .with_config(seeded(1).with_filter_limit(20));

    match test.run(&mut host) {
        TestResult::Unsatisfiable { reason, .. } => {
            assert!(reason.contains("more than 20"), "{reason}");
        }
        other => panic!("expected unsatisfiable, got {other}"),
    }
    assert_eq!(host.setups, 1);
    assert!(host.balanced());
    assert_eq!(host.teardowns[0].to_string(), "(no arguments)");
}

/// Property: shrink candidates rejected by `assume` are skipped, not adopted
pub fn test_rejected_shrinks_are_not_failures() {
    let test = TestCase::hostless("even_and_small", |trial: &Trial| {
        let x = *trial.arg::<i64>("x");
        trial.assume(x % 2 == 0);
        x < 10
    })
    .param("x", Strategy::int_range(0, 1000))
    .with_config(seeded(8));

    let result = test.check();
    let x = match result.counterexample().and_then(|e| e.get::<i64>("x")) {
        Some(x) => *x,
        None => panic!("expected a failure, got {result}"),
    };
    assert_eq!(x % 2, 0);
    assert!(x >= 10);
    assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Assertion));
}

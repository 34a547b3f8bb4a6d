//! Example store properties
//!
//! A stored failure is replayed before anything new is generated, survives
//! changes to the strategies, and is forgotten once the test passes.

use crate::{seeded, Recorder};
use falsify::*;
use std::sync::Arc;
use tempfile::TempDir;

fn non_negative(store: Arc<dyn ExampleStore>, seed: u64) -> TestCase<Recorder> {
    TestCase::new("non_negative", |_: &mut Recorder, trial: &Trial| {
        *trial.arg::<i64>("x") >= 0
    })
    .param("x", Strategy::integers())
    .with_config(seeded(seed))
    .with_store(store)
}

fn run_fresh(test: &TestCase<Recorder>) -> TestResult {
    test.run(&mut Recorder::default())
}

/// Property: the first trial of a rerun is the stored minimal example
pub fn test_replays_minimal_example_first() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(DirectoryStore::new(dir.path()));

    let mut host = Recorder::default();
    let test = non_negative(store.clone(), 4);
    assert!(test.run(&mut host).is_fail());
    assert!(store.path_for(&test.identity()).exists());

    let entry = match store.load(&test.identity()) {
        Ok(Some(entry)) => entry,
        other => panic!("expected a stored example, got {other:?}"),
    };
    assert_eq!(entry.arguments.get("x").map(String::as_str), Some("-1"));
    assert_eq!(entry.test, "non_negative(x)");

    // A different seed would generate different values; replay comes first.
    let mut host = Recorder::default();
    let result = non_negative(store.clone(), 5).run(&mut host);
    let first = &host.teardowns[0];
    assert_eq!(first.origin(), Origin::Replayed);
    assert_eq!(first.get::<i64>("x"), Some(&-1));
    assert!(matches!(result, TestResult::Fail { tests_run: 1, .. }));
    assert!(host.balanced());
}

/// Property: a passing rerun clears the stored example
pub fn test_clears_when_fixed() {
    let store = Arc::new(InMemoryStore::new());
    assert!(run_fresh(&non_negative(store.clone(), 4)).is_fail());
    assert_eq!(store.len(), 1);

    let mut host = Recorder::default();
    let fixed = TestCase::new("non_negative", |_: &mut Recorder, _trial: &Trial| true)
        .param("x", Strategy::integers())
        .with_config(seeded(4).with_tests(10))
        .with_store(store.clone());
    assert!(fixed.run(&mut host).is_pass());
    assert!(store.is_empty());
    assert_eq!(host.teardowns[0].origin(), Origin::Replayed);
    // The replayed trial does not count toward the passing budget.
    assert_eq!(host.setups, 11);
}

/// Property: a stored path that no longer fits the strategies is tolerated
pub fn test_survives_strategy_changes() {
    let store = Arc::new(InMemoryStore::new());
    assert!(run_fresh(&non_negative(store.clone(), 6)).is_fail());

    let mut host = Recorder::default();
    let narrowed = TestCase::new("non_negative", |_: &mut Recorder, trial: &Trial| {
        *trial.arg::<i64>("x") >= 0
    })
    .param("x", Strategy::int_range(-3, 3))
    .with_config(seeded(6))
    .with_store(store.clone());

    let result = narrowed.run(&mut host);
    assert_eq!(
        result.counterexample().and_then(|e| e.get::<i64>("x")),
        Some(&-1)
    );
    assert!(host.balanced());
    assert_eq!(store.len(), 1);
}

/// Property: explicit runs neither read nor write the store
pub fn test_explicit_runs_skip_store() {
    let store = Arc::new(InMemoryStore::new());
    let mut host = Recorder::default();
    let result = non_negative(store.clone(), 1).run_with(&mut host, Explicit::new().arg("x", -7i64));

    assert_eq!(
        result.counterexample().and_then(|e| e.get::<i64>("x")),
        Some(&-7)
    );
    assert!(store.is_empty());
    assert_eq!(host.setups, 1);
}

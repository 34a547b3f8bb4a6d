//! Shrinking properties
//!
//! A falsified test must report a minimal counterexample: shrinking reaches
//! the boundary of the failing region and stops at a fixed point.

use crate::{seeded, Recorder};
use falsify::*;

fn fail_of(result: &TestResult) -> &Example {
    match result.counterexample() {
        Some(example) => example,
        None => panic!("expected a falsified test, got {result}"),
    }
}

/// Property: `x >= 0` over all integers shrinks to exactly -1
pub fn test_integers_shrink_to_boundary() {
    for seed in 0..5 {
        let mut host = Recorder::default();
        let test = TestCase::new("non_negative", |_: &mut Recorder, trial: &Trial| {
            *trial.arg::<i64>("x") >= 0
        })
        .param("x", Strategy::integers())
        .with_config(seeded(seed));

        let result = test.run(&mut host);
        assert_eq!(fail_of(&result).get::<i64>("x"), Some(&-1));
        assert_eq!(
            result.failure().map(|f| f.message.as_str()),
            Some("property returned false")
        );
        assert!(host.balanced());
        assert_eq!(
            host.last_teardown().map(|e| e.to_string()),
            Some("x = -1".to_string())
        );
    }
}

/// Property: several parameters each shrink to their own boundary
pub fn test_multi_parameter_fixed_point() {
    let mut host = Recorder::default();
    let test = TestCase::new("small_pair", |_: &mut Recorder, trial: &Trial| {
        !(*trial.arg::<i64>("x") >= 3 && *trial.arg::<i64>("y") >= 5)
    })
    .param("x", Strategy::int_range(0, 1000))
    .param("y", Strategy::int_range(0, 1000))
    .with_config(seeded(7));

    let result = test.run(&mut host);
    let example = fail_of(&result);
    assert_eq!(example.get::<i64>("x"), Some(&3));
    assert_eq!(example.get::<i64>("y"), Some(&5));
    assert_eq!(example.to_string(), "x = 3, y = 5");
    assert!(host.balanced());
    assert!(host
        .last_teardown()
        .map_or(false, |last| last.same_arguments(example)));
}

/// Property: vectors lose elements before their elements shrink
pub fn test_vectors_shrink_by_removal_then_elements() {
    let test = TestCase::hostless("short_vectors", |trial: &Trial| {
        trial.arg::<Vec<i64>>("xs").len() < 3
    })
    .param("xs", Strategy::vec_of(Strategy::int_range(0, 100)))
    .with_config(seeded(3));

    let result = test.check();
    assert_eq!(
        fail_of(&result).get::<Vec<i64>>("xs"),
        Some(&vec![0, 0, 0])
    );
}

/// Property: strings shrink like vectors of characters
pub fn test_strings_shrink_to_spaces() {
    let test = TestCase::hostless("short_strings", |trial: &Trial| {
        trial.arg::<String>("s").len() < 2
    })
    .param("s", Strategy::ascii_string())
    .with_config(seeded(11));

    let result = test.check();
    assert_eq!(
        fail_of(&result).get::<String>("s").map(String::as_str),
        Some("  ")
    );
}

/// Property: a dependent value stays consistent with what it depends on
pub fn test_flat_map_shrinks_dependent_values() {
    let bounded = Strategy::int_range(1, 20)
        .flat_map(|n| Strategy::int_range(0, n).map(move |k| (n, k)));

    let mut host = Recorder::default();
    let test = TestCase::new("bounded_pairs", |_: &mut Recorder, trial: &Trial| {
        trial.arg::<(i64, i64)>("pair").1 < 5
    })
    .param("pair", bounded)
    .with_config(seeded(5));

    let result = test.run(&mut host);
    let (n, k) = match fail_of(&result).get::<(i64, i64)>("pair") {
        Some(pair) => *pair,
        None => panic!("pair missing from {result}"),
    };
    assert_eq!(k, 5);
    assert!(k <= n);
    for example in &host.teardowns {
        if let Some((n, k)) = example.get::<(i64, i64)>("pair") {
            assert!(k <= n, "inconsistent pair in {example}");
        }
    }
}

/// Property: no more than `shrink_limit` candidates are tried
pub fn test_shrink_limit_is_respected() {
    let mut host = Recorder::default();
    let test = TestCase::new("non_negative", |_: &mut Recorder, trial: &Trial| {
        *trial.arg::<i64>("x") >= 0
    })
    .param("x", Strategy::integers())
    .with_config(seeded(2).with_shrinks(0));

    match test.run(&mut host) {
        TestResult::Fail {
            tests_run,
            shrinks_performed,
            shrink_steps,
            ..
        } => {
            assert_eq!(shrinks_performed, 0);
            assert_eq!(shrink_steps.len(), 1);
            // Every generated trial, then the re-execution of the result.
            assert_eq!(host.setups, tests_run + 1);
        }
        other => panic!("expected a failure, got {other}"),
    }
}

/// Property: a fixed seed reproduces the whole run
pub fn test_seeded_runs_are_deterministic() {
    let test = TestCase::hostless("not_too_negative", |trial: &Trial| *trial.arg::<i64>("x") >= -10)
        .param("x", Strategy::int_range(-500, 500))
        .with_config(seeded(99));

    let first = test.check();
    let second = test.check();
    assert_eq!(first.to_string(), second.to_string());
    assert!(first.to_string().contains("Seed: 99"));
    assert_eq!(fail_of(&first).get::<i64>("x"), Some(&-11));
}

/// Property: characters across the surrogate block are always valid and
/// shrink to the first character past it
pub fn test_chars_across_surrogates_shrink_past_gap() {
    let test = TestCase::hostless("below_gap", |trial: &Trial| {
        *trial.arg::<char>("c") < '\u{E000}'
    })
    .param("c", Strategy::char_range('\u{D000}', '\u{E7FF}'))
    .with_config(seeded(13));

    let result = test.check();
    assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Assertion));
    assert_eq!(fail_of(&result).get::<char>("c"), Some(&'\u{E000}'));

    let anything = TestCase::hostless("any_text", |trial: &Trial| {
        trial.arg::<String>("s").chars().count() <= 100
    })
    .param("s", Strategy::string_of(Strategy::char_range('\0', char::MAX)))
    .with_config(seeded(13));
    assert!(anything.check().is_pass(), "{}", anything.check());
}

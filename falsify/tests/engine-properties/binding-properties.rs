//! Binding properties
//!
//! Every way of running a test brackets each trial with exactly one setup
//! and one teardown, and misuse is reported before any hook runs.

use crate::{seeded, Recorder};
use falsify::*;
use std::panic::{catch_unwind, AssertUnwindSafe};

fn passing() -> TestCase<Recorder> {
    TestCase::new("passing", |_: &mut Recorder, trial: &Trial| {
        trial.example().len() == 2
    })
    .param("x", Strategy::integers())
    .param("flag", Strategy::<bool>::bool())
    .with_config(seeded(12).with_tests(20))
}

/// Property: all binding modes follow the same accounting
pub fn test_binding_modes_share_accounting() {
    let test = passing();

    let mut host = Recorder::default();
    assert!(test.bind(&mut host).run().is_pass());
    assert_eq!(host.setups, 20);
    assert!(host.balanced());

    let mut host = Recorder::default();
    assert!(test.run(&mut host).is_pass());
    assert_eq!(host.setups, 20);
    assert!(host.balanced());

    let mut host = Recorder::default();
    let pinned = Explicit::new().arg("x", 3i64);
    assert!(test.run_with(&mut host, pinned.clone()).is_pass());
    assert!(test.bind(&mut host).run_with(pinned).is_pass());
    assert_eq!(host.setups, 2);
    assert!(host.balanced());
    for example in &host.teardowns {
        assert_eq!(example.get::<i64>("x"), Some(&3));
        assert!(example.get::<bool>("flag").is_some());
        assert_eq!(example.origin(), Origin::Explicit);
    }

    let hostless = TestCase::hostless("hostless", |trial: &Trial| {
        trial.arg::<String>("s").is_ascii()
    })
    .param("s", Strategy::ascii_string())
    .with_config(seeded(12));
    assert!(hostless.check().is_pass());
    assert!(hostless
        .check_with(Explicit::new().arg("s", String::from("ok")))
        .is_pass());
}

struct FailingSetup {
    calls: usize,
    teardowns: usize,
}

impl Host for FailingSetup {
    fn setup_example(&mut self) {
        self.calls += 1;
        if self.calls == 3 {
            panic!("database unavailable");
        }
    }

    fn teardown_example(&mut self, _example: &Example) {
        self.teardowns += 1;
    }
}

/// Property: a panicking setup ends the run without a teardown for it
pub fn test_setup_failure_aborts_run() {
    let mut host = FailingSetup {
        calls: 0,
        teardowns: 0,
    };
    let test = TestCase::new("needs_db", |_: &mut FailingSetup, _trial: &Trial| ())
        .param("x", Strategy::integers())
        .with_config(seeded(1));

    match test.run(&mut host) {
        TestResult::Error {
            error: FalsifyError::Setup { message },
            property_name,
        } => {
            assert_eq!(message, "database unavailable");
            assert_eq!(property_name.as_deref(), Some("needs_db"));
        }
        other => panic!("expected a setup error, got {other}"),
    }
    assert_eq!(host.calls, 3);
    assert_eq!(host.teardowns, 2);
}

#[derive(Default)]
struct FragileTeardown {
    always: bool,
    setups: usize,
    teardowns: usize,
}

impl Host for FragileTeardown {
    fn setup_example(&mut self) {
        self.setups += 1;
    }

    fn teardown_example(&mut self, example: &Example) {
        self.teardowns += 1;
        let negative = example.get::<i64>("x").map_or(false, |x| *x < 0);
        if self.always || negative {
            panic!("could not roll back");
        }
    }
}

/// Property: a teardown panic never hides the failure it followed
pub fn test_teardown_failure_keeps_original() {
    let test = TestCase::new("non_negative", |_: &mut FragileTeardown, trial: &Trial| {
        *trial.arg::<i64>("x") >= 0
    })
    .param("x", Strategy::integers())
    .with_config(seeded(9));

    let mut host = FragileTeardown::default();
    let result = test.run(&mut host);
    match result.failure() {
        Some(failure) => {
            assert_eq!(failure.kind, FailureKind::Assertion);
            assert_eq!(failure.message, "property returned false");
            assert_eq!(failure.teardown.as_deref(), Some("could not roll back"));
        }
        None => panic!("expected a failure, got {result}"),
    }
    assert_eq!(
        result.counterexample().and_then(|e| e.get::<i64>("x")),
        Some(&-1)
    );
    assert_eq!(host.setups, host.teardowns);

    let mut host = FragileTeardown {
        always: true,
        ..FragileTeardown::default()
    };
    let result = TestCase::new("passing_body", |_: &mut FragileTeardown, _trial: &Trial| ())
        .param("x", Strategy::int_range(0, 10))
        .with_config(seeded(9))
        .run(&mut host);
    assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Teardown));
}

#[derive(Default)]
struct ReleasesAllButZero {
    setups: usize,
    teardowns: usize,
}

impl Host for ReleasesAllButZero {
    fn setup_example(&mut self) {
        self.setups += 1;
    }

    fn teardown_example(&mut self, example: &Example) {
        self.teardowns += 1;
        if example.get::<i64>("x") == Some(&0) {
            panic!("could not release x = 0");
        }
    }
}

/// Property: a teardown panic on a passing value is never taken for a
/// smaller assertion failure
pub fn test_teardown_panic_does_not_replace_assertion() {
    let mut host = ReleasesAllButZero::default();
    let test = TestCase::new(
        "non_negative",
        |_: &mut ReleasesAllButZero, trial: &Trial| *trial.arg::<i64>("x") >= 0,
    )
    .param("x", Strategy::int_range(-1000, 1000))
    .with_config(seeded(3));

    let result = test.run(&mut host);
    match result.failure() {
        Some(failure) => {
            assert_eq!(failure.kind, FailureKind::Assertion, "{result}");
            assert_eq!(failure.teardown, None);
        }
        None => panic!("expected an assertion failure, got {result}"),
    }
    assert_eq!(
        result.counterexample().and_then(|e| e.get::<i64>("x")),
        Some(&-1)
    );
    assert!(!result.to_string().contains("x = 0"), "{result}");
    assert_eq!(host.setups, host.teardowns);
}

/// Property: misuse is reported before any hook runs
pub fn test_misuse_is_reported() {
    let mut host = Recorder::default();
    let duplicated = TestCase::new("duplicated", |_: &mut Recorder, _trial: &Trial| ())
        .param("x", Strategy::integers())
        .param("x", Strategy::<bool>::bool());
    assert!(matches!(
        duplicated.run(&mut host),
        TestResult::Error {
            error: FalsifyError::DuplicateParameter { .. },
            ..
        }
    ));

    let test = passing();
    assert!(matches!(
        test.run_with(&mut host, Explicit::new().arg("y", 1i64)),
        TestResult::Error {
            error: FalsifyError::UnknownParameter { .. },
            ..
        }
    ));
    assert!(matches!(
        test.run_with(&mut host, Explicit::new().arg("x", 1u8)),
        TestResult::Error {
            error: FalsifyError::ExplicitType { .. },
            ..
        }
    ));
    assert_eq!(host.setups, 0);
    assert!(host.teardowns.is_empty());
}

/// Property: the report names the test, the progression and the seed
pub fn test_report_renders_progression() {
    let test = TestCase::hostless("non_negative", |trial: &Trial| *trial.arg::<i64>("x") >= 0)
        .param("x", Strategy::integers())
        .with_config(seeded(31));

    let result = test.check();
    let report = result.to_string();
    assert!(report.contains("✗ non_negative failed after"), "{report}");
    assert!(report.contains("Minimal counterexample: x = -1"), "{report}");
    assert!(report.contains("Seed: 31"), "{report}");

    let panicked = catch_unwind(AssertUnwindSafe(|| test.check().assert()));
    assert!(panicked.is_err());

    match result.into_result() {
        Err(FalsifyError::Falsified { example, .. }) => {
            assert_eq!(example.get::<i64>("x"), Some(&-1));
        }
        other => panic!("expected a falsification, got {other:?}"),
    }
}

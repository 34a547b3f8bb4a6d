//! Error types and run results.

use crate::example::{Example, Value};
use std::fmt;
use thiserror::Error;

/// What went wrong while turning a strategy into a concrete value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReifyErrorKind {
    /// A transform or generator failed.
    #[error("{message}")]
    Failed { message: String },

    /// A shrink candidate did not satisfy a filter.
    #[error("candidate rejected by filter")]
    Rejected,

    /// A filter rejected too many consecutive candidates.
    #[error("filter rejected more than {limit} consecutive candidates")]
    Exhausted { limit: usize },
}

/// Error raised while generating or transforming a value.
///
/// Reification errors never come from the test body. When the failing value
/// belongs to a named parameter, `parameter` names it and `bound` holds the
/// arguments that were already reified.
#[derive(Error, Debug, Clone)]
#[error("{kind}")]
pub struct ReifyError {
    pub kind: ReifyErrorKind,
    pub parameter: Option<String>,
    pub bound: Vec<(String, Value)>,
}

impl ReifyError {
    pub fn failed(message: impl Into<String>) -> Self {
        ReifyError::from_kind(ReifyErrorKind::Failed {
            message: message.into(),
        })
    }

    pub fn rejected() -> Self {
        ReifyError::from_kind(ReifyErrorKind::Rejected)
    }

    pub fn exhausted(limit: usize) -> Self {
        ReifyError::from_kind(ReifyErrorKind::Exhausted { limit })
    }

    fn from_kind(kind: ReifyErrorKind) -> Self {
        ReifyError {
            kind,
            parameter: None,
            bound: Vec::new(),
        }
    }

    /// Attribute the error to a parameter, keeping the innermost attribution.
    pub fn in_parameter(mut self, name: &str, bound: Vec<(String, Value)>) -> Self {
        if self.parameter.is_none() {
            self.parameter = Some(name.to_string());
            self.bound = bound;
        }
        self
    }

    /// Message including the parameter being reified, if known.
    pub fn describe(&self) -> String {
        match &self.parameter {
            Some(name) => format!("while reifying `{name}`: {}", self.kind),
            None => format!("while reifying arguments: {}", self.kind),
        }
    }
}

/// Why a trial was discarded without counting as a pass or a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `assume` was called with `false`.
    #[error("an assumption did not hold")]
    Assumption,
    /// A shrink candidate failed a filter predicate.
    #[error("a filter rejected the candidate")]
    Filter,
    /// A filter gave up during generation.
    #[error("a filter rejected more than {limit} consecutive candidates")]
    FilterExhausted { limit: usize },
}

/// Classification of a captured failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The test body panicked, returned `false` or returned an error.
    Assertion,
    /// Generating or transforming an argument failed.
    Reify,
    /// Only `teardown_example` failed.
    Teardown,
}

/// A captured failure from one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Set when `teardown_example` also failed after this failure.
    pub teardown: Option<String>,
}

impl Failure {
    pub fn assertion(message: impl Into<String>) -> Self {
        Failure::new(FailureKind::Assertion, message)
    }

    pub fn reify(message: impl Into<String>) -> Self {
        Failure::new(FailureKind::Reify, message)
    }

    pub fn teardown(message: impl Into<String>) -> Self {
        Failure::new(FailureKind::Teardown, message)
    }

    /// Whether the failure came from the test body rather than its inputs.
    pub fn is_assertion(&self) -> bool {
        self.kind == FailureKind::Assertion
    }

    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Failure {
            kind,
            message: message.into(),
            teardown: None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Assertion | FailureKind::Reify => write!(f, "{}", self.message)?,
            FailureKind::Teardown => write!(f, "teardown_example panicked: {}", self.message)?,
        }
        if let Some(teardown) = &self.teardown {
            write!(f, " (teardown_example also panicked: {teardown})")?;
        }
        Ok(())
    }
}

/// Main error type for falsification runs.
#[derive(Error, Debug, Clone)]
pub enum FalsifyError {
    /// The property was falsified.
    #[error("Falsified after {tests_run} tests and {shrinks_performed} shrinks: {failure} [{example}]")]
    Falsified {
        failure: Failure,
        example: Example,
        tests_run: usize,
        shrinks_performed: usize,
    },

    /// Too many trials were rejected to find enough valid examples.
    #[error("Unable to satisfy assumptions after {discards} discards: {reason}")]
    Unsatisfiable {
        tests_run: usize,
        discards: usize,
        reason: String,
    },

    /// The minimal example stopped failing when it was re-executed.
    #[error("Flaky: [{example}] failed with `{failure}` but passed when re-executed")]
    Flaky { failure: Failure, example: Example },

    /// `setup_example` panicked.
    #[error("setup_example panicked: {message}")]
    Setup { message: String },

    /// Two parameters were declared with the same name.
    #[error("Parameter `{name}` is declared more than once")]
    DuplicateParameter { name: String },

    /// An explicit argument names no declared parameter.
    #[error("No parameter named `{name}`")]
    UnknownParameter { name: String },

    /// A state machine was declared without any rules.
    #[error("State machine `{name}` defines no rules")]
    EmptyMachine { name: String },

    /// An explicit argument has a different type than its parameter.
    #[error("Explicit argument `{name}` is a {found}, but the parameter generates {expected}")]
    ExplicitType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type for falsify operations.
pub type Result<T> = std::result::Result<T, FalsifyError>;

/// A shrinking step in the failure progression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkStep {
    /// The rendered counterexample at this step.
    pub counterexample: String,
    /// The step number (0 = original, 1+ = adopted shrinks).
    pub step: usize,
}

/// Outcome of a falsification run.
#[derive(Debug, Clone)]
pub enum TestResult {
    /// Every trial passed.
    Pass {
        tests_run: usize,
        discards: usize,
        seed: u64,
        property_name: Option<String>,
    },

    /// A minimal counterexample was found.
    Fail {
        failure: Failure,
        example: Example,
        tests_run: usize,
        shrinks_performed: usize,
        /// The shrinking progression showing how we reached the minimal counterexample.
        shrink_steps: Vec<ShrinkStep>,
        seed: u64,
        property_name: Option<String>,
    },

    /// Too many trials were rejected.
    Unsatisfiable {
        tests_run: usize,
        discards: usize,
        reason: String,
        property_name: Option<String>,
    },

    /// The run could not complete.
    Error {
        error: FalsifyError,
        property_name: Option<String>,
    },
}

impl TestResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestResult::Pass { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, TestResult::Fail { .. })
    }

    /// The minimal counterexample, if the run failed.
    pub fn counterexample(&self) -> Option<&Example> {
        match self {
            TestResult::Fail { example, .. } => Some(example),
            _ => None,
        }
    }

    /// The captured failure, if the run failed.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            TestResult::Fail { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        let slot = match &mut self {
            TestResult::Pass { property_name, .. }
            | TestResult::Fail { property_name, .. }
            | TestResult::Unsatisfiable { property_name, .. }
            | TestResult::Error { property_name, .. } => property_name,
        };
        *slot = Some(name.to_string());
        self
    }

    /// Convert into a `Result`, yielding the number of passing tests.
    pub fn into_result(self) -> Result<usize> {
        match self {
            TestResult::Pass { tests_run, .. } => Ok(tests_run),
            TestResult::Fail {
                failure,
                example,
                tests_run,
                shrinks_performed,
                ..
            } => Err(FalsifyError::Falsified {
                failure,
                example,
                tests_run,
                shrinks_performed,
            }),
            TestResult::Unsatisfiable {
                tests_run,
                discards,
                reason,
                ..
            } => Err(FalsifyError::Unsatisfiable {
                tests_run,
                discards,
                reason,
            }),
            TestResult::Error { error, .. } => Err(error),
        }
    }

    /// Panic with the rendered report unless the run passed.
    pub fn assert(self) {
        if !self.is_pass() {
            panic!("\n{self}");
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Pass {
                tests_run,
                discards,
                property_name,
                ..
            } => {
                let prop_name = property_name.as_deref().unwrap_or("property");
                write!(f, "  ✓ {prop_name} passed {tests_run} tests")?;
                if *discards > 0 {
                    write!(f, " ({discards} discarded)")?;
                }
                write!(f, ".")
            }
            TestResult::Fail {
                failure,
                example,
                tests_run,
                shrinks_performed,
                shrink_steps,
                seed,
                property_name,
            } => {
                let prop_name = property_name.as_deref().unwrap_or("property");
                writeln!(
                    f,
                    "  ✗ {prop_name} failed after {tests_run} tests and {shrinks_performed} shrinks."
                )?;

                if shrink_steps.len() > 1 {
                    writeln!(f)?;
                    writeln!(f, "    Shrinking progression:")?;
                    for step in shrink_steps {
                        if step.step == 0 {
                            writeln!(f, "      │ Original: {}", step.counterexample)?;
                        } else {
                            writeln!(f, "      │ Step {}: {}", step.step, step.counterexample)?;
                        }
                    }
                    writeln!(f)?;
                }

                writeln!(f, "    {failure}")?;
                writeln!(f, "    Minimal counterexample: {example}")?;
                write!(f, "    Seed: {seed} (rerun with `Config::with_seed({seed})`)")
            }
            TestResult::Unsatisfiable {
                discards,
                reason,
                property_name,
                ..
            } => {
                let prop_name = property_name.as_deref().unwrap_or("property");
                write!(
                    f,
                    "  ⚐ {prop_name} gave up after {discards} discards: {reason}"
                )
            }
            TestResult::Error {
                error,
                property_name,
            } => {
                let prop_name = property_name.as_deref().unwrap_or("property");
                write!(f, "  ! {prop_name} aborted: {error}")
            }
        }
    }
}

impl From<FalsifyError> for TestResult {
    fn from(error: FalsifyError) -> Self {
        match error {
            FalsifyError::Falsified {
                failure,
                example,
                tests_run,
                shrinks_performed,
            } => TestResult::Fail {
                shrink_steps: vec![ShrinkStep {
                    counterexample: example.to_string(),
                    step: 0,
                }],
                failure,
                example,
                tests_run,
                shrinks_performed,
                seed: 0,
                property_name: None,
            },
            FalsifyError::Unsatisfiable {
                tests_run,
                discards,
                reason,
            } => TestResult::Unsatisfiable {
                tests_run,
                discards,
                reason,
                property_name: None,
            },
            error => TestResult::Error {
                error,
                property_name: None,
            },
        }
    }
}

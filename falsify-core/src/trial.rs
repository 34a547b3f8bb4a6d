//! Running one trial: host lifecycle, argument binding and outcome capture.

use crate::error::{Failure, FalsifyError, ReifyError, ReifyErrorKind, Rejection};
use crate::example::{Example, Origin, Value};
use crate::tree::{Reify, Tree};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::Rc;
use tracing::trace;

/// Per-example lifecycle hooks of the object a test is bound to.
///
/// `setup_example` runs before every trial and `teardown_example` after it,
/// on every exit path. Teardown receives the example the trial attempted.
pub trait Host {
    fn setup_example(&mut self) {}

    fn teardown_example(&mut self, _example: &Example) {}
}

impl Host for () {}

/// Unwind payload used by [`Trial::assume`].
struct AssumptionRejected;

/// The context a test body runs in.
pub struct Trial {
    example: Example,
}

impl Trial {
    pub(crate) fn new(example: Example) -> Self {
        Trial { example }
    }

    /// The example being tried.
    pub fn example(&self) -> &Example {
        &self.example
    }

    /// The argument bound to `name`.
    ///
    /// # Panics
    ///
    /// Panics if no parameter is called `name` or it holds another type.
    /// Inside a test body that panic is a failure of the trial.
    pub fn arg<T: Any>(&self, name: &str) -> &T {
        match self.example.value(name) {
            Some(value) => match value.downcast_ref() {
                Some(arg) => arg,
                None => panic!(
                    "argument `{name}` is a {}, not a {}",
                    value.type_name(),
                    std::any::type_name::<T>()
                ),
            },
            None => panic!("no argument named `{name}`"),
        }
    }

    /// The argument bound to `name`, if it exists and has type `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.example.get(name)
    }

    /// Reject this trial unless `condition` holds.
    ///
    /// A rejected trial stops immediately, is torn down as usual and counts
    /// as neither a pass nor a failure.
    pub fn assume(&self, condition: bool) {
        if !condition {
            resume_unwind(Box::new(AssumptionRejected));
        }
    }
}

/// Values a test body may return.
pub trait IntoVerdict {
    /// `Err` carries the failure message.
    fn into_verdict(self) -> Result<(), String>;
}

impl IntoVerdict for () {
    fn into_verdict(self) -> Result<(), String> {
        Ok(())
    }
}

impl IntoVerdict for bool {
    fn into_verdict(self) -> Result<(), String> {
        if self {
            Ok(())
        } else {
            Err("property returned false".to_string())
        }
    }
}

impl<E: fmt::Display> IntoVerdict for Result<(), E> {
    fn into_verdict(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// The classified result of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialOutcome {
    Pass,
    Invalid(Rejection),
    Fail(Failure),
    ReifyError(Failure),
}

impl TrialOutcome {
    /// Whether this outcome falsifies the property.
    pub fn is_falsifying(&self) -> bool {
        matches!(self, TrialOutcome::Fail(_) | TrialOutcome::ReifyError(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            TrialOutcome::Fail(failure) | TrialOutcome::ReifyError(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether both outcomes are the same kind of falsification.
    ///
    /// Failures must also agree on [`crate::error::FailureKind`], so a teardown panic never
    /// stands in for an assertion failure or the other way round.
    pub fn same_kind(&self, other: &TrialOutcome) -> bool {
        match (self, other) {
            (TrialOutcome::Fail(a), TrialOutcome::Fail(b))
            | (TrialOutcome::ReifyError(a), TrialOutcome::ReifyError(b)) => a.kind == b.kind,
            _ => false,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TrialOutcome::Pass => "pass",
            TrialOutcome::Invalid(_) => "invalid",
            TrialOutcome::Fail(_) => "fail",
            TrialOutcome::ReifyError(_) => "reify-error",
        }
    }
}

/// Render a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// A test body with its return value already converted.
pub(crate) type Body<H> = Rc<dyn Fn(&mut H, &Trial) -> Result<(), String>>;

/// Everything one trial produced.
pub(crate) struct TrialRecord {
    pub outcome: TrialOutcome,
    pub example: Example,
    /// The reified arguments with their shrinks; absent when reification failed.
    pub tree: Option<Tree<Vec<Value>>>,
}

/// Runs trials against one host, one at a time.
pub(crate) struct Executor<'h, H> {
    host: &'h mut H,
    body: Body<H>,
    names: Vec<String>,
    trials: usize,
}

impl<'h, H: Host> Executor<'h, H> {
    pub fn new(host: &'h mut H, body: Body<H>, names: Vec<String>) -> Self {
        Executor {
            host,
            body,
            names,
            trials: 0,
        }
    }

    /// Number of trials started so far.
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Run one trial.
    ///
    /// `produce` reifies the arguments. It is called after `setup_example`,
    /// and `teardown_example` runs afterwards whatever happened in between.
    /// Only a panicking `setup_example` is an error.
    pub fn run<P>(&mut self, origin: Origin, produce: P) -> Result<TrialRecord, FalsifyError>
    where
        P: FnOnce() -> Reify<Tree<Vec<Value>>>,
    {
        let host = &mut *self.host;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| host.setup_example())) {
            return Err(FalsifyError::Setup {
                message: panic_message(&*payload),
            });
        }

        let index = self.trials;
        self.trials += 1;

        let produced = match catch_unwind(AssertUnwindSafe(produce)) {
            Ok(produced) => produced,
            Err(payload) => Err(ReifyError::failed(panic_message(&*payload))),
        };

        let (example, mut outcome, tree) = match produced {
            Ok(tree) => {
                let example = Example::from_values(&self.names, tree.value.clone(), origin, index);
                let outcome = self.call_body(&example);
                (example, outcome, Some(tree))
            }
            Err(error) => {
                let example = Example::new(error.bound.clone(), origin, index);
                let outcome = match error.kind {
                    ReifyErrorKind::Failed { .. } => {
                        TrialOutcome::ReifyError(Failure::reify(error.describe()))
                    }
                    ReifyErrorKind::Rejected => TrialOutcome::Invalid(Rejection::Filter),
                    ReifyErrorKind::Exhausted { limit } => {
                        TrialOutcome::Invalid(Rejection::FilterExhausted { limit })
                    }
                };
                (example, outcome, None)
            }
        };

        let host = &mut *self.host;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| host.teardown_example(&example))) {
            let message = panic_message(&*payload);
            outcome = match outcome {
                TrialOutcome::Fail(mut failure) => {
                    failure.teardown = Some(message);
                    TrialOutcome::Fail(failure)
                }
                TrialOutcome::ReifyError(mut failure) => {
                    failure.teardown = Some(message);
                    TrialOutcome::ReifyError(failure)
                }
                TrialOutcome::Pass | TrialOutcome::Invalid(_) => {
                    TrialOutcome::Fail(Failure::teardown(message))
                }
            };
        }

        trace!(trial = index, %origin, outcome = outcome.label(), example = %example, "trial finished");
        Ok(TrialRecord {
            outcome,
            example,
            tree,
        })
    }

    fn call_body(&mut self, example: &Example) -> TrialOutcome {
        let trial = Trial::new(example.clone());
        let body = self.body.clone();
        let host = &mut *self.host;
        match catch_unwind(AssertUnwindSafe(|| body(host, &trial))) {
            Ok(Ok(())) => TrialOutcome::Pass,
            Ok(Err(message)) => TrialOutcome::Fail(Failure::assertion(message)),
            Err(payload) if payload.is::<AssumptionRejected>() => {
                TrialOutcome::Invalid(Rejection::Assumption)
            }
            Err(payload) => TrialOutcome::Fail(Failure::assertion(panic_message(&*payload))),
        }
    }
}

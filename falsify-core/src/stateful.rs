//! Rule-based state machine testing.
//!
//! A [`StateMachine`] is an initial state, a set of [`Rule`]s that change it
//! and invariants that must hold after every step. The falsifier generates a
//! [`Program`] of steps and runs the whole program inside one trial, so a
//! failing program shrinks like any other argument: steps are dropped, rules
//! are swapped for earlier ones and rule arguments are simplified.

use crate::data::Config;
use crate::error::{FalsifyError, TestResult};
use crate::example::Value;
use crate::property::TestCase;
use crate::store::ExampleStore;
use crate::strategy::Strategy;
use crate::trial::{IntoVerdict, Trial};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

/// Longest program generated when no limit is set.
pub const DEFAULT_MAX_STEPS: usize = 50;

/// Parameter name the program is bound to.
pub const STEPS: &str = "steps";

type Action<M> = Rc<dyn Fn(&mut M, &Value) -> Result<(), String>>;
type Check<M> = Rc<dyn Fn(&M) -> Result<(), String>>;

/// One way of changing the machine's state.
pub struct Rule<M> {
    name: Rc<str>,
    arguments: Strategy<Value>,
    precondition: Option<Rc<dyn Fn(&M) -> bool>>,
    action: Action<M>,
}

impl<M: 'static> Rule<M> {
    /// A rule applying `action` to an argument drawn from `arguments`.
    pub fn new<T, F, R>(name: impl Into<String>, arguments: Strategy<T>, action: F) -> Self
    where
        T: Any + fmt::Debug + Clone,
        F: Fn(&mut M, &T) -> R + 'static,
        R: IntoVerdict,
    {
        let name: Rc<str> = Rc::from(name.into());
        let rule = name.clone();
        Rule {
            name,
            arguments: arguments.map(Value::new),
            precondition: None,
            action: Rc::new(move |machine: &mut M, argument: &Value| {
                match argument.downcast_ref::<T>() {
                    Some(argument) => action(machine, argument).into_verdict(),
                    None => Err(format!(
                        "rule `{rule}` expects a {}, got a {}",
                        std::any::type_name::<T>(),
                        argument.type_name()
                    )),
                }
            }),
        }
    }

    /// A rule without arguments.
    pub fn unit<F, R>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut M) -> R + 'static,
        R: IntoVerdict,
    {
        Rule::new(name, Strategy::constant(()), move |machine: &mut M, _: &()| {
            action(machine)
        })
    }

    /// Only apply the rule in states satisfying `precondition`.
    ///
    /// A step whose precondition does not hold is skipped.
    pub fn with_precondition<F>(mut self, precondition: F) -> Self
    where
        F: Fn(&M) -> bool + 'static,
    {
        self.precondition = Some(Rc::new(precondition));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self, machine: &M) -> bool {
        self.precondition
            .as_ref()
            .map_or(true, |precondition| precondition(machine))
    }
}

/// A rule applied to a concrete argument.
#[derive(Clone)]
pub struct Step {
    rule: usize,
    name: Rc<str>,
    argument: Value,
}

impl Step {
    pub fn rule_name(&self) -> &str {
        &self.name
    }

    pub fn argument(&self) -> &Value {
        &self.argument
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.argument.type_name() == "()" {
            write!(f, "{}()", self.name)
        } else {
            write!(f, "{}({:?})", self.name, self.argument)
        }
    }
}

/// A generated sequence of steps, rendered as `[push(3), pop()]`.
#[derive(Clone)]
pub struct Program {
    steps: Vec<Step>,
}

impl Program {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.steps).finish()
    }
}

/// A state machine under test.
///
/// ```
/// use falsify_core::{Rule, StateMachine, Strategy};
///
/// let result = StateMachine::new("stack", Vec::<i64>::new)
///     .rule(Rule::new("push", Strategy::int_range(0, 9), |stack: &mut Vec<i64>, x: &i64| {
///         stack.push(*x)
///     }))
///     .rule(
///         Rule::unit("pop", |stack: &mut Vec<i64>| stack.pop().is_some())
///             .with_precondition(|stack: &Vec<i64>| !stack.is_empty()),
///     )
///     .check();
/// assert!(result.is_pass());
/// ```
pub struct StateMachine<M> {
    name: String,
    init: Rc<dyn Fn() -> M>,
    rules: Vec<Rule<M>>,
    invariants: Vec<(String, Check<M>)>,
    teardown: Option<Rc<dyn Fn(&mut M)>>,
    max_steps: usize,
    config: Config,
    store: Option<Arc<dyn ExampleStore>>,
}

impl<M: 'static> StateMachine<M> {
    /// Declare a machine whose every run starts from `init()`.
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> M + 'static,
    {
        StateMachine {
            name: name.into(),
            init: Rc::new(init),
            rules: Vec::new(),
            invariants: Vec::new(),
            teardown: None,
            max_steps: DEFAULT_MAX_STEPS,
            config: Config::default(),
            store: None,
        }
    }

    pub fn rule(mut self, rule: Rule<M>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Check `invariant` on the initial state and after every step.
    pub fn invariant<F, R>(mut self, name: impl Into<String>, invariant: F) -> Self
    where
        F: Fn(&M) -> R + 'static,
        R: IntoVerdict,
    {
        let check: Check<M> = Rc::new(move |machine: &M| invariant(machine).into_verdict());
        self.invariants.push((name.into(), check));
        self
    }

    /// Run `teardown` after every program, whether it failed or not.
    pub fn with_teardown<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&mut M) + 'static,
    {
        self.teardown = Some(Rc::new(teardown));
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ExampleStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Turn the machine into a test with a single `steps` parameter.
    pub fn into_test(self) -> Result<TestCase, FalsifyError> {
        if self.rules.is_empty() {
            return Err(FalsifyError::EmptyMachine { name: self.name });
        }
        let rules: Rc<[Rule<M>]> = Rc::from(self.rules);
        let invariants: Rc<[(String, Check<M>)]> = Rc::from(self.invariants);
        let programs = program_of(rules.clone(), self.max_steps);
        let (init, teardown) = (self.init, self.teardown);

        let test = TestCase::hostless(self.name, move |trial: &Trial| {
            let program = trial.arg::<Program>(STEPS);
            let mut machine = init();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                execute(&rules, &invariants, program, &mut machine)
            }));
            if let Some(teardown) = &teardown {
                teardown(&mut machine);
            }
            match outcome {
                Ok(verdict) => verdict,
                Err(payload) => resume_unwind(payload),
            }
        })
        .param(STEPS, programs)
        .with_config(self.config);

        Ok(match self.store {
            Some(store) => test.with_store(store),
            None => test,
        })
    }

    /// Search for a failing program.
    pub fn check(self) -> TestResult {
        let name = self.name.clone();
        match self.into_test() {
            Ok(test) => test.check(),
            Err(error) => TestResult::from(error).named(&name),
        }
    }
}

/// Programs of up to `max_steps` steps over `rules`.
fn program_of<M: 'static>(rules: Rc<[Rule<M>]>, max_steps: usize) -> Strategy<Program> {
    let last = rules.len() as i64 - 1;
    let step = Strategy::int_range(0, last).flat_map(move |index| {
        let rule = index as usize;
        let name = rules[rule].name.clone();
        rules[rule].arguments.clone().map(move |argument| Step {
            rule,
            name: name.clone(),
            argument,
        })
    });
    Strategy::vec_of(step).map(move |mut steps| {
        steps.truncate(max_steps);
        Program { steps }
    })
}

fn execute<M: 'static>(
    rules: &[Rule<M>],
    invariants: &[(String, Check<M>)],
    program: &Program,
    machine: &mut M,
) -> Result<(), String> {
    check_invariants(invariants, machine, "in the initial state")?;
    for (position, step) in program.steps.iter().enumerate() {
        let Some(rule) = rules.get(step.rule) else {
            return Err(format!("step {position} names no rule: {step:?}"));
        };
        if !rule.enabled(machine) {
            trace!(step = position, rule = %step.name, "precondition does not hold, skipping");
            continue;
        }
        (rule.action)(machine, &step.argument)
            .map_err(|message| format!("step {position} {step:?} failed: {message}"))?;
        check_invariants(invariants, machine, &format!("after step {position} {step:?}"))?;
    }
    Ok(())
}

fn check_invariants<M>(
    invariants: &[(String, Check<M>)],
    machine: &M,
    when: &str,
) -> Result<(), String> {
    for (name, check) in invariants {
        check(machine).map_err(|message| format!("invariant `{name}` broken {when}: {message}"))?;
    }
    Ok(())
}

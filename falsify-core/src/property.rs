//! Test declarations: a body bound to named strategies, a host and settings.

use crate::data::Config;
use crate::error::{FalsifyError, TestResult};
use crate::example::Value;
use crate::falsifier::Falsifier;
use crate::store::{ExampleStore, TestIdentity};
use crate::strategy::{GenContext, Strategy};
use crate::trial::{Body, Host, IntoVerdict, Trial};
use crate::tree::{Candidate, Reify, Tree};
use std::any::Any;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Arc;

/// One named parameter of a test.
#[derive(Clone)]
pub(crate) struct Param {
    pub name: String,
    pub type_name: &'static str,
    pub strategy: Strategy<Value>,
}

/// Generate every parameter from its own split of `ctx`.
///
/// A failure names the parameter being generated and carries the ones
/// generated before it.
pub(crate) fn generate_all(params: &[Param], ctx: GenContext) -> Reify<Tree<Vec<Value>>> {
    let mut trees = Vec::with_capacity(params.len());
    let mut bound: Vec<(String, Value)> = Vec::with_capacity(params.len());
    let mut remaining = ctx;
    for param in params {
        let (this, rest) = remaining.split();
        remaining = rest;
        let tree = param
            .strategy
            .generate(this)
            .map_err(|error| error.in_parameter(&param.name, bound.clone()))?;
        bound.push((param.name.clone(), tree.value.clone()));
        trees.push(tree);
    }
    let names: Rc<[String]> = params.iter().map(|param| param.name.clone()).collect();
    Ok(product(names, trees))
}

/// The product of per-parameter trees.
///
/// Candidates shrink one parameter at a time, in declaration order, holding
/// the others fixed.
fn product(names: Rc<[String]>, trees: Vec<Tree<Value>>) -> Tree<Vec<Value>> {
    let values = trees.iter().map(|tree| tree.value.clone()).collect();
    let trees = Rc::new(trees);
    Tree::with_candidates(values, move || {
        let (names, trees) = (names.clone(), trees.clone());
        Box::new((0..trees.len()).flat_map(move |index| {
            let (names, trees) = (names.clone(), trees.clone());
            let candidates = trees[index].candidates();
            candidates.map(move |candidate| {
                let (names, trees) = (names.clone(), trees.clone());
                Candidate::new(move || {
                    let smaller = candidate.reify().map_err(|error| {
                        let bound = names
                            .iter()
                            .cloned()
                            .zip(trees[..index].iter().map(|tree| tree.value.clone()))
                            .collect();
                        error.in_parameter(&names[index], bound)
                    })?;
                    let mut next: Vec<Tree<Value>> = trees.as_ref().clone();
                    next[index] = smaller;
                    Ok(product(names.clone(), next))
                })
            })
        }))
    })
}

/// Values for a single explicit trial: pinned arguments as given, the rest
/// generated once from `ctx`.
pub(crate) fn generate_pinned(
    params: &[Param],
    explicit: &Explicit,
    ctx: GenContext,
) -> Reify<Tree<Vec<Value>>> {
    let mut values: Vec<Value> = Vec::with_capacity(params.len());
    let mut bound: Vec<(String, Value)> = Vec::with_capacity(params.len());
    let mut remaining = ctx;
    for param in params {
        let (this, rest) = remaining.split();
        remaining = rest;
        let value = match explicit.get(&param.name) {
            Some(value) => value.clone(),
            None => {
                param
                    .strategy
                    .generate(this)
                    .map_err(|error| error.in_parameter(&param.name, bound.clone()))?
                    .value
            }
        };
        bound.push((param.name.clone(), value.clone()));
        values.push(value);
    }
    Ok(Tree::singleton(values))
}

/// Arguments pinned by name for a single explicit trial.
///
/// Parameters that are not pinned are generated once.
#[derive(Debug, Clone, Default)]
pub struct Explicit {
    args: Vec<(String, Value)>,
}

impl Explicit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `name` to `value`.
    pub fn arg<T: Any + Debug>(mut self, name: impl Into<String>, value: T) -> Self {
        let name = name.into();
        self.args.retain(|(existing, _)| *existing != name);
        self.args.push((name, Value::new(value)));
        self
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.args
            .iter()
            .find(|(pinned, _)| pinned == name)
            .map(|(_, value)| value)
    }

    /// Check every pinned name against the declared parameters.
    pub(crate) fn validate(&self, params: &[Param]) -> Result<(), FalsifyError> {
        for (name, value) in &self.args {
            match params.iter().find(|param| param.name == *name) {
                None => return Err(FalsifyError::UnknownParameter { name: name.clone() }),
                Some(param) if param.type_name != value.type_name() => {
                    return Err(FalsifyError::ExplicitType {
                        name: name.clone(),
                        expected: param.type_name,
                        found: value.type_name(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// A property test: a body run against named, generated arguments.
///
/// `H` is the type the test is bound to; its [`Host`] hooks bracket every
/// trial. Hostless tests use `()`.
///
/// ```
/// use falsify_core::{Strategy, TestCase};
///
/// let test = TestCase::hostless("non_negative", |trial| *trial.arg::<i64>("x") >= -10)
///     .param("x", Strategy::int_range(-10, 10));
/// assert!(test.check().is_pass());
/// ```
pub struct TestCase<H = ()> {
    name: String,
    params: Vec<Param>,
    duplicate: Option<String>,
    body: Body<H>,
    config: Config,
    store: Option<Arc<dyn ExampleStore>>,
}

impl<H: Host> TestCase<H> {
    /// Declare a test whose body receives the host and the trial.
    pub fn new<F, R>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut H, &Trial) -> R + 'static,
        R: IntoVerdict,
    {
        TestCase {
            name: name.into(),
            params: Vec::new(),
            duplicate: None,
            body: Rc::new(move |host: &mut H, trial: &Trial| body(host, trial).into_verdict()),
            config: Config::default(),
            store: None,
        }
    }

    /// Bind parameter `name` to `strategy`. Parameters are generated and
    /// shrunk in declaration order.
    pub fn param<T>(mut self, name: impl Into<String>, strategy: Strategy<T>) -> Self
    where
        T: Any + Debug + Clone,
    {
        let name = name.into();
        if self.duplicate.is_none() && self.params.iter().any(|param| param.name == name) {
            self.duplicate = Some(name.clone());
        }
        self.params.push(Param {
            name,
            type_name: std::any::type_name::<T>(),
            strategy: strategy.map(Value::new),
        });
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Remember falsifying examples in `store` and replay them first.
    pub fn with_store(mut self, store: Arc<dyn ExampleStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parameter names in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| param.name.as_str())
    }

    /// The key this test is stored under.
    pub fn identity(&self) -> TestIdentity {
        TestIdentity::new(self.name.clone(), self.parameters().map(String::from).collect())
    }

    /// Falsify the test against `host`.
    pub fn run(&self, host: &mut H) -> TestResult {
        let result = match self.falsifier(host) {
            Ok(falsifier) => falsifier.run(),
            Err(error) => error.into(),
        };
        result.named(&self.name)
    }

    /// Run exactly one trial with the arguments pinned in `explicit`.
    ///
    /// There is no shrinking and the example store is not consulted.
    pub fn run_with(&self, host: &mut H, explicit: Explicit) -> TestResult {
        let result = match self.falsifier(host) {
            Ok(falsifier) => falsifier.run_explicit(&explicit),
            Err(error) => error.into(),
        };
        result.named(&self.name)
    }

    /// Bind the test to `host`.
    pub fn bind<'a>(&'a self, host: &'a mut H) -> Bound<'a, H> {
        Bound { test: self, host }
    }

    fn falsifier<'a>(&'a self, host: &'a mut H) -> Result<Falsifier<'a, H>, FalsifyError> {
        if let Some(name) = &self.duplicate {
            return Err(FalsifyError::DuplicateParameter { name: name.clone() });
        }
        Ok(Falsifier::new(
            host,
            self.body.clone(),
            &self.params,
            self.config.clone(),
            self.identity(),
            self.store.clone(),
        ))
    }
}

impl TestCase<()> {
    /// Declare a test with no host.
    pub fn hostless<F, R>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Trial) -> R + 'static,
        R: IntoVerdict,
    {
        TestCase::new(name, move |_: &mut (), trial: &Trial| body(trial))
    }

    /// Falsify a hostless test.
    pub fn check(&self) -> TestResult {
        self.run(&mut ())
    }

    /// Run a hostless test once with pinned arguments.
    pub fn check_with(&self, explicit: Explicit) -> TestResult {
        self.run_with(&mut (), explicit)
    }
}

/// A test bound to a host.
pub struct Bound<'a, H> {
    test: &'a TestCase<H>,
    host: &'a mut H,
}

impl<'a, H: Host> Bound<'a, H> {
    pub fn run(self) -> TestResult {
        self.test.run(self.host)
    }

    pub fn run_with(self, explicit: Explicit) -> TestResult {
        self.test.run_with(self.host, explicit)
    }
}

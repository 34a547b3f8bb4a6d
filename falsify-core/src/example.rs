//! Concrete examples: argument values bound by parameter name.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A type-erased argument value.
///
/// The rendered `Debug` form is captured once at construction so examples can
/// be reported and persisted without knowing the concrete type.
#[derive(Clone)]
pub struct Value {
    inner: Rc<dyn Any>,
    type_name: &'static str,
    repr: Rc<str>,
}

impl Value {
    /// Wrap a concrete value.
    pub fn new<T: Any + fmt::Debug>(value: T) -> Self {
        let repr: Rc<str> = Rc::from(format!("{value:?}"));
        Value {
            inner: Rc::new(value),
            type_name: std::any::type_name::<T>(),
            repr,
        }
    }

    /// Borrow the value as `T` if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// The rendered `Debug` form of the value.
    pub fn repr(&self) -> &str {
        &self.repr
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.repr == other.repr
    }
}

/// Where an example came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Freshly drawn from the strategies.
    Generated,
    /// Supplied by the caller for a single explicit trial.
    Explicit,
    /// A shrink candidate derived from an earlier failure.
    Shrunk,
    /// Rebuilt from an example store entry.
    Replayed,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Origin::Generated => "generated",
            Origin::Explicit => "explicit",
            Origin::Shrunk => "shrunk",
            Origin::Replayed => "replayed",
        };
        f.write_str(label)
    }
}

/// The arguments of one trial together with their provenance.
///
/// Arguments keep the declaration order of the test's parameters. An example
/// built after a reification failure only holds the parameters that were
/// bound before the failure.
#[derive(Debug, Clone)]
pub struct Example {
    args: Vec<(String, Value)>,
    origin: Origin,
    trial: usize,
}

impl Example {
    pub(crate) fn new(args: Vec<(String, Value)>, origin: Origin, trial: usize) -> Self {
        Example {
            args,
            origin,
            trial,
        }
    }

    /// Pair declared parameter names with positional values.
    pub(crate) fn from_values(
        names: &[String],
        values: Vec<Value>,
        origin: Origin,
        trial: usize,
    ) -> Self {
        let args = names.iter().cloned().zip(values).collect();
        Example::new(args, origin, trial)
    }

    /// Look up an argument by name and downcast it to `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.value(name)?.downcast_ref()
    }

    /// Look up the type-erased argument bound to `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.args
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }

    /// Whether `name` is bound in this example.
    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Index of the trial that attempted this example within its run.
    pub fn trial(&self) -> usize {
        self.trial
    }

    /// Rendered arguments keyed by parameter name.
    pub fn arguments(&self) -> BTreeMap<String, String> {
        self.args
            .iter()
            .map(|(name, value)| (name.clone(), value.repr().to_string()))
            .collect()
    }

    /// Whether both examples bind the same names to the same rendered values.
    /// Provenance is ignored.
    pub fn same_arguments(&self, other: &Example) -> bool {
        self.args == other.args
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            return f.write_str("(no arguments)");
        }
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name} = {value:?}")?;
        }
        Ok(())
    }
}

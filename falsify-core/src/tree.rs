//! Lazy rose trees of generated values and their shrink candidates.

use crate::error::ReifyError;
use std::rc::Rc;

/// Result of reifying a value.
pub type Reify<T> = std::result::Result<T, ReifyError>;

/// Boxed iterator of shrink candidates.
pub type Candidates<T> = Box<dyn Iterator<Item = Candidate<T>>>;

/// A deferred shrink candidate.
///
/// Nothing is computed until [`Candidate::reify`] is called, so the
/// transforms a candidate depends on run inside the trial that tries it.
/// Reifying the same candidate twice recomputes it.
pub struct Candidate<T> {
    thunk: Rc<dyn Fn() -> Reify<Tree<T>>>,
}

impl<T> Clone for Candidate<T> {
    fn clone(&self) -> Self {
        Candidate {
            thunk: self.thunk.clone(),
        }
    }
}

impl<T: 'static> Candidate<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Reify<Tree<T>> + 'static,
    {
        Candidate { thunk: Rc::new(f) }
    }

    /// Compute the candidate's tree.
    pub fn reify(&self) -> Reify<Tree<T>> {
        (self.thunk)()
    }
}

impl<T: Clone + 'static> Candidate<T> {
    /// A candidate that is already computed.
    pub fn ready(tree: Tree<T>) -> Self {
        Candidate::new(move || Ok(tree.clone()))
    }
}

/// A value together with a restartable, lazy enumeration of simpler values.
///
/// Every call to [`Tree::candidates`] starts a fresh enumeration. Candidates
/// are ordered from the most to the least aggressive simplification.
pub struct Tree<T> {
    pub value: T,
    shrinks: Rc<dyn Fn() -> Candidates<T>>,
}

impl<T: Clone> Clone for Tree<T> {
    fn clone(&self) -> Self {
        Tree {
            value: self.value.clone(),
            shrinks: self.shrinks.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree").field("value", &self.value).finish()
    }
}

impl<T: 'static> Tree<T> {
    /// Create a tree with no shrinks.
    pub fn singleton(value: T) -> Self {
        Tree::with_candidates(value, || Box::new(std::iter::empty()))
    }

    /// Create a tree whose candidates are produced by `shrinks`.
    pub fn with_candidates<F>(value: T, shrinks: F) -> Self
    where
        F: Fn() -> Candidates<T> + 'static,
    {
        Tree {
            value,
            shrinks: Rc::new(shrinks),
        }
    }

    /// Start a new enumeration of shrink candidates.
    pub fn candidates(&self) -> Candidates<T> {
        (self.shrinks)()
    }

    /// Transform every value in the tree through a fallible function.
    ///
    /// The root is transformed now; candidates are transformed when they are
    /// reified.
    pub fn map<U: 'static>(self, f: Rc<dyn Fn(T) -> Reify<U>>) -> Reify<Tree<U>> {
        let Tree { value, shrinks } = self;
        let mapped = f(value)?;
        Ok(Tree::with_candidates(mapped, move || {
            let f = f.clone();
            Box::new(shrinks().map(move |candidate| {
                let f = f.clone();
                Candidate::new(move || candidate.reify()?.map(f.clone()))
            }))
        }))
    }

    /// Restrict candidates to values satisfying `predicate`.
    ///
    /// The root is assumed to satisfy the predicate already. A candidate that
    /// fails it reifies to a rejection.
    pub fn filter(self, predicate: Rc<dyn Fn(&T) -> bool>) -> Tree<T> {
        let Tree { value, shrinks } = self;
        Tree::with_candidates(value, move || {
            let predicate = predicate.clone();
            Box::new(shrinks().map(move |candidate| {
                let predicate = predicate.clone();
                Candidate::new(move || {
                    let tree = candidate.reify()?;
                    if predicate(&tree.value) {
                        Ok(tree.filter(predicate.clone()))
                    } else {
                        Err(ReifyError::rejected())
                    }
                })
            }))
        })
    }
}

impl<T: Clone + 'static> Tree<T> {
    /// Build a tree by repeatedly applying `shrink` to each value.
    pub fn unfold<F>(value: T, shrink: F) -> Self
    where
        F: Fn(&T) -> Box<dyn Iterator<Item = T>> + 'static,
    {
        Tree::unfold_with(value, Rc::new(shrink))
    }

    fn unfold_with(value: T, shrink: Rc<dyn Fn(&T) -> Box<dyn Iterator<Item = T>>>) -> Self {
        let origin = value.clone();
        Tree::with_candidates(value, move || {
            let next = shrink.clone();
            Box::new(shrink(&origin).map(move |smaller| {
                let next = next.clone();
                Candidate::new(move || Ok(Tree::unfold_with(smaller.clone(), next.clone())))
            }))
        })
    }

    /// Pair two trees. Candidates shrink the left value with the right held
    /// fixed, then the right value with the left held fixed.
    pub fn zip<U: Clone + 'static>(self, other: Tree<U>) -> Tree<(T, U)> {
        let value = (self.value.clone(), other.value.clone());
        let left = self;
        let right = other;
        Tree::with_candidates(value, move || {
            let fixed_right = right.clone();
            let fixed_left = left.clone();
            let lefts = left.candidates().map(move |candidate| {
                let fixed = fixed_right.clone();
                Candidate::new(move || Ok(candidate.reify()?.zip(fixed.clone())))
            });
            let rights = right.candidates().map(move |candidate| {
                let fixed = fixed_left.clone();
                Candidate::new(move || Ok(fixed.clone().zip(candidate.reify()?)))
            });
            Box::new(lefts.chain(rights))
        })
    }

    /// Follow a path of candidate indices from this tree.
    ///
    /// Returns the deepest tree reached and how many steps were followed; a
    /// path that runs past the available candidates stops early.
    pub fn follow(self, path: &[usize]) -> Reify<(Tree<T>, usize)> {
        let mut current = self;
        for (depth, &index) in path.iter().enumerate() {
            match current.candidates().nth(index) {
                Some(candidate) => current = candidate.reify()?,
                None => return Ok((current, depth)),
            }
        }
        Ok((current, path.len()))
    }
}

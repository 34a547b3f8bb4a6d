//! Strategies: composable value generation with integrated shrinking.

use crate::data::{Seed, Size, DEFAULT_FILTER_LIMIT};
use crate::error::ReifyError;
use crate::reject::{sample_until, SampleError};
use crate::trial::panic_message;
use crate::tree::{Candidate, Reify, Tree};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// Everything a strategy needs to draw one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenContext {
    pub size: Size,
    pub seed: Seed,
    /// Consecutive rejections a `filter` tolerates in one draw.
    pub filter_limit: usize,
}

impl GenContext {
    pub fn new(size: Size, seed: Seed) -> Self {
        GenContext {
            size,
            seed,
            filter_limit: DEFAULT_FILTER_LIMIT,
        }
    }

    pub fn with_filter_limit(mut self, limit: usize) -> Self {
        self.filter_limit = limit;
        self
    }

    /// Split into two contexts with independent seeds.
    pub fn split(self) -> (Self, Self) {
        let (left, right) = self.seed.split();
        (
            GenContext { seed: left, ..self },
            GenContext {
                seed: right,
                ..self
            },
        )
    }
}

/// A generator of values of type `T` together with their shrinks.
///
/// Strategies are explicit values composed with combinators. Generation is a
/// pure function of the [`GenContext`]: the same size and seed always give
/// the same tree. Cloning a strategy is cheap.
pub struct Strategy<T> {
    generator: Rc<dyn Fn(GenContext) -> Reify<Tree<T>>>,
}

impl<T> Clone for Strategy<T> {
    fn clone(&self) -> Self {
        Strategy {
            generator: self.generator.clone(),
        }
    }
}

impl<T: 'static> Strategy<T> {
    /// Create a new strategy from a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(GenContext) -> Reify<Tree<T>> + 'static,
    {
        Strategy {
            generator: Rc::new(f),
        }
    }

    /// Draw a value and its shrink tree.
    pub fn generate(&self, ctx: GenContext) -> Reify<Tree<T>> {
        (self.generator)(ctx)
    }

    /// Transform generated values. A panic in `f` is a reification error.
    pub fn map<U, F>(self, f: F) -> Strategy<U>
    where
        F: Fn(T) -> U + 'static,
        U: 'static,
    {
        self.try_map(move |value| catch_reify(|| f(value)))
    }

    /// Transform generated values through a fallible function.
    ///
    /// The shrinks of the result are the images of the original shrinks.
    pub fn try_map<U, E, F>(self, f: F) -> Strategy<U>
    where
        F: Fn(T) -> Result<U, E> + 'static,
        E: std::fmt::Display,
        U: 'static,
    {
        let f: Rc<dyn Fn(T) -> Reify<U>> =
            Rc::new(move |value| f(value).map_err(|e| ReifyError::failed(e.to_string())));
        Strategy::new(move |ctx| self.generate(ctx)?.map(f.clone()))
    }

    /// Keep only values satisfying `predicate`.
    ///
    /// Generation retries with fresh seeds and a growing size, and gives up
    /// once more than `ctx.filter_limit` consecutive draws were rejected. Shrink candidates
    /// that fail the predicate are rejected, never adopted.
    pub fn filter<F>(self, predicate: F) -> Strategy<T>
    where
        F: Fn(&T) -> bool + 'static,
    {
        let predicate: Rc<dyn Fn(&T) -> bool> = Rc::new(predicate);
        Strategy::new(move |ctx| {
            let mut remaining = ctx;
            let drawn = sample_until(ctx.filter_limit, |attempt| {
                let (mut this, rest) = remaining.split();
                remaining = rest;
                this.size = Size(ctx.size.get() + 2 * attempt);
                let tree = self.generate(this)?;
                if predicate(&tree.value) {
                    Ok(Some(tree.filter(predicate.clone())))
                } else {
                    Ok(None)
                }
            });
            drawn.map_err(|error| match error {
                SampleError::Exhausted(exhausted) => ReifyError::exhausted(exhausted.limit),
                SampleError::Failed(error) => error,
            })
        })
    }
}

impl<T: Clone + 'static> Strategy<T> {
    /// Create a strategy that always produces the same value.
    pub fn constant(value: T) -> Self {
        Strategy::new(move |_ctx| Ok(Tree::singleton(value.clone())))
    }

    /// Dependent generation: draw a value, then draw from the strategy it
    /// selects.
    ///
    /// Shrinks the first value before the second; when the first value
    /// shrinks, the second strategy is redrawn from the same seed.
    pub fn flat_map<U, F>(self, f: F) -> Strategy<U>
    where
        F: Fn(T) -> Strategy<U> + 'static,
        U: Clone + 'static,
    {
        let f: Rc<dyn Fn(T) -> Strategy<U>> = Rc::new(f);
        Strategy::new(move |ctx| {
            let (outer_ctx, inner_ctx) = ctx.split();
            let outer = self.generate(outer_ctx)?;
            let value = outer.value.clone();
            let inner = catch_reify(|| f(value))?.generate(inner_ctx)?;
            Ok(bind_tree(outer, inner, f.clone(), inner_ctx))
        })
    }

    /// Generate pairs from two strategies.
    pub fn zip<U: Clone + 'static>(self, other: Strategy<U>) -> Strategy<(T, U)> {
        Strategy::new(move |ctx| {
            let (left, right) = ctx.split();
            Ok(self.generate(left)?.zip(other.generate(right)?))
        })
    }
}

fn bind_tree<T, U>(
    outer: Tree<T>,
    inner: Tree<U>,
    f: Rc<dyn Fn(T) -> Strategy<U>>,
    ctx: GenContext,
) -> Tree<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
{
    let value = inner.value.clone();
    Tree::with_candidates(value, move || {
        let (f_outer, f_inner) = (f.clone(), f.clone());
        let fixed_outer = outer.clone();
        let outers = outer.candidates().map(move |candidate| {
            let f = f_outer.clone();
            Candidate::new(move || {
                let outer = candidate.reify()?;
                let value = outer.value.clone();
                let inner = catch_reify(|| f(value))?.generate(ctx)?;
                Ok(bind_tree(outer, inner, f.clone(), ctx))
            })
        });
        let inners = inner.candidates().map(move |candidate| {
            let f = f_inner.clone();
            let outer = fixed_outer.clone();
            Candidate::new(move || Ok(bind_tree(outer.clone(), candidate.reify()?, f.clone(), ctx)))
        });
        Box::new(outers.chain(inners))
    })
}

/// Run `f`, turning a panic into a reification error.
pub(crate) fn catch_reify<U>(f: impl FnOnce() -> U) -> Reify<U> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| ReifyError::failed(panic_message(&*payload)))
}

/// Candidates moving `x` toward `destination`: the destination itself first,
/// then points progressively closer to `x`.
pub fn towards(destination: i64, x: i64) -> Box<dyn Iterator<Item = i64>> {
    if destination == x {
        return Box::new(std::iter::empty());
    }
    let diff = x as i128 - destination as i128;
    let halves = std::iter::successors(Some(diff), |&h| {
        let next = h / 2;
        (next != 0).then_some(next)
    });
    Box::new(halves.map(move |h| (x as i128 - h) as i64))
}

/// Primitive strategies.
impl Strategy<bool> {
    /// Generate a random boolean; shrinks to `false`.
    pub fn bool() -> Self {
        Strategy::int_range(0, 1).map(|n| n == 1)
    }
}

impl Strategy<i64> {
    /// Generate an integer in `[min, max]`, shrinking toward the value in
    /// range closest to zero.
    pub fn int_range(min: i64, max: i64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let origin = 0i64.clamp(min, max);
        Strategy::new(move |ctx| {
            let (value, _next) = ctx.seed.next_in_range(min, max);
            Ok(Tree::unfold(value, move |&x| towards(origin, x)))
        })
    }

    /// Generate any `i64`, with magnitude growing with the size parameter.
    /// Shrinks toward zero.
    pub fn integers() -> Self {
        Strategy::new(|ctx| {
            let bits = (ctx.size.get().min(100) * 63) / 100;
            let bound = if bits == 0 {
                0
            } else {
                ((1u64 << bits) - 1) as i64
            };
            let (value, _next) = ctx.seed.next_in_range(-bound, bound);
            Ok(Tree::unfold(value, |&x| towards(0, x)))
        })
    }

    /// Generate a non-negative integer up to the size parameter.
    pub fn natural() -> Self {
        Strategy::new(|ctx| {
            let (value, _next) = ctx.seed.next_in_range(0, ctx.size.get() as i64);
            Ok(Tree::unfold(value, |&x| towards(0, x)))
        })
    }
}

impl<T: Clone + 'static> Strategy<T> {
    /// Pick one of `items`, shrinking toward earlier items.
    pub fn element_of(items: Vec<T>) -> Self {
        if items.is_empty() {
            return Strategy::new(|_ctx| {
                Err(ReifyError::failed("element_of requires at least one item"))
            });
        }
        let items = Rc::new(items);
        let last = (items.len() - 1) as i64;
        Strategy::int_range(0, last).map(move |index| items[index as usize].clone())
    }
}

impl<T: Clone + 'static> Strategy<Vec<T>> {
    /// Generate vectors of up to `size` elements.
    ///
    /// Shrinks by removing chunks of elements (largest first), then by
    /// shrinking individual elements.
    pub fn vec_of(element: Strategy<T>) -> Self {
        Strategy::new(move |ctx| {
            let (length, _next) = ctx.seed.next_bounded(ctx.size.get() as u64 + 1);
            let mut trees = Vec::with_capacity(length as usize);
            let mut remaining = ctx;
            for _ in 0..length {
                let (this, rest) = remaining.split();
                remaining = rest;
                trees.push(element.generate(this)?);
            }
            Ok(vec_tree(trees))
        })
    }
}

fn vec_tree<T: Clone + 'static>(trees: Vec<Tree<T>>) -> Tree<Vec<T>> {
    let value = trees.iter().map(|tree| tree.value.clone()).collect();
    let trees = Rc::new(trees);
    Tree::with_candidates(value, move || {
        let len = trees.len();
        let chunk_sizes = std::iter::successors((len > 0).then_some(len), |&k| {
            let next = k / 2;
            (next > 0).then_some(next)
        });

        let for_removal = trees.clone();
        let removals = chunk_sizes.flat_map(move |k| {
            let trees = for_removal.clone();
            (0..len).step_by(k).map(move |start| {
                let trees = trees.clone();
                Candidate::new(move || {
                    let end = (start + k).min(trees.len());
                    let kept = trees[..start]
                        .iter()
                        .chain(trees[end..].iter())
                        .cloned()
                        .collect();
                    Ok(vec_tree(kept))
                })
            })
        });

        let for_elements = trees.clone();
        let elements = (0..len).flat_map(move |index| {
            let trees = for_elements.clone();
            let candidates = trees[index].candidates();
            candidates.map(move |candidate| {
                let trees = trees.clone();
                Candidate::new(move || {
                    let smaller = candidate.reify()?;
                    let mut next: Vec<Tree<T>> = trees.as_ref().clone();
                    next[index] = smaller;
                    Ok(vec_tree(next))
                })
            })
        });

        Box::new(removals.chain(elements))
    })
}

/// First surrogate code point; `char` skips the whole block.
const SURROGATE_START: u32 = 0xD800;
const SURROGATE_COUNT: u32 = 0x800;

/// Position of `c` among the Unicode scalar values.
fn scalar_index(c: char) -> i64 {
    let code = c as u32;
    let index = if code < SURROGATE_START {
        code
    } else {
        code - SURROGATE_COUNT
    };
    index as i64
}

/// Inverse of [`scalar_index`].
fn scalar_at(index: i64) -> Reify<char> {
    let index = index as u32;
    let code = if index < SURROGATE_START {
        index
    } else {
        index + SURROGATE_COUNT
    };
    char::from_u32(code).ok_or_else(|| ReifyError::failed(format!("{code:#x} is not a character")))
}

impl Strategy<char> {
    /// Generate a character in `[lo, hi]`, shrinking toward `lo`.
    ///
    /// Characters are drawn by scalar index, so ranges spanning the
    /// surrogate block only ever produce valid characters.
    pub fn char_range(lo: char, hi: char) -> Self {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let (lo, hi) = (scalar_index(lo), scalar_index(hi));
        Strategy::new(move |ctx| {
            let (index, _next) = ctx.seed.next_in_range(lo, hi);
            Tree::unfold(index, move |&x| towards(lo, x)).map(Rc::new(scalar_at))
        })
    }

    /// Printable ASCII characters.
    pub fn ascii() -> Self {
        Strategy::char_range(' ', '~')
    }
}

impl Strategy<String> {
    /// Generate strings of characters drawn from `chars`.
    pub fn string_of(chars: Strategy<char>) -> Self {
        Strategy::vec_of(chars).map(|chars| chars.into_iter().collect())
    }

    /// Printable ASCII strings.
    pub fn ascii_string() -> Self {
        Strategy::string_of(Strategy::<char>::ascii())
    }
}

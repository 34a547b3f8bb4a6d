//! Bounded rejection sampling.
//!
//! `filter` retries generation until its predicate holds and the falsifier
//! keeps generating past `assume` rejections. Both are generate-and-test
//! loops with a cap, and both count rejections through [`Rejections`].

use thiserror::Error;

/// The rejection cap was exceeded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("gave up after more than {limit} rejections")]
pub struct Exhausted {
    pub limit: usize,
}

/// Counts rejections against a cap. `limit` rejections are tolerated, one
/// more exhausts the counter.
#[derive(Debug, Clone)]
pub struct Rejections {
    limit: usize,
    count: usize,
}

impl Rejections {
    pub fn new(limit: usize) -> Self {
        Rejections { limit, count: 0 }
    }

    /// Record one rejection.
    pub fn reject(&mut self) -> Result<(), Exhausted> {
        self.count += 1;
        if self.count > self.limit {
            Err(Exhausted { limit: self.limit })
        } else {
            Ok(())
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Why [`sample_until`] stopped without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError<E> {
    /// Every draw was rejected.
    Exhausted(Exhausted),
    /// A draw failed outright.
    Failed(E),
}

/// Draw until `draw` yields `Some`, giving up once more than `limit`
/// consecutive draws returned `None`. Errors from `draw` stop sampling
/// immediately.
pub fn sample_until<T, E, F>(limit: usize, mut draw: F) -> Result<T, SampleError<E>>
where
    F: FnMut(usize) -> Result<Option<T>, E>,
{
    let mut rejections = Rejections::new(limit);
    let mut attempt = 0;
    loop {
        match draw(attempt).map_err(SampleError::Failed)? {
            Some(value) => return Ok(value),
            None => rejections.reject().map_err(SampleError::Exhausted)?,
        }
        attempt += 1;
    }
}

//! Greedy shrinking of a falsifying example.

use crate::error::{FalsifyError, ShrinkStep};
use crate::example::{Origin, Value};
use crate::trial::{Executor, Host, TrialRecord};
use crate::tree::{Reify, Tree};
use std::cell::Cell;
use tracing::debug;

/// Where shrinking ended up.
pub(crate) struct Shrunk {
    /// The smallest record that still falsified the same way.
    pub record: TrialRecord,
    /// Candidate indices taken from the starting tree.
    pub path: Vec<usize>,
    /// Adopted examples, starting with the original.
    pub steps: Vec<ShrinkStep>,
    /// Candidate trials that were run.
    pub attempts: usize,
}

impl Shrunk {
    /// Number of adopted shrinks.
    pub fn adopted(&self) -> usize {
        self.path.len()
    }
}

/// Shrink `start` by greedy local search.
///
/// Candidates of the current best are tried in order. The first one that
/// falsifies the same way is adopted and enumeration restarts from it. The
/// search stops when a whole enumeration passes without adoption or after
/// `limit` candidate trials.
pub(crate) fn shrink<H: Host>(
    executor: &mut Executor<'_, H>,
    start: TrialRecord,
    limit: usize,
) -> Result<Shrunk, FalsifyError> {
    let mut steps = vec![ShrinkStep {
        counterexample: start.example.to_string(),
        step: 0,
    }];
    let mut path = Vec::new();
    let mut attempts = 0;
    let mut best = start;

    let Some(mut tree) = best.tree.clone() else {
        // Reification failed before any arguments had shrinks.
        return Ok(Shrunk {
            record: best,
            path,
            steps,
            attempts,
        });
    };

    'search: loop {
        for (index, candidate) in tree.candidates().enumerate() {
            if attempts >= limit {
                debug!(limit, "shrink limit reached");
                break 'search;
            }
            attempts += 1;

            let record = executor.run(Origin::Shrunk, || candidate.reify())?;
            if !record.outcome.same_kind(&best.outcome) {
                continue;
            }
            let Some(next) = record.tree.clone() else {
                continue;
            };

            path.push(index);
            steps.push(ShrinkStep {
                counterexample: record.example.to_string(),
                step: path.len(),
            });
            debug!(step = path.len(), attempts, example = %record.example, "adopted shrink");
            tree = next;
            best = record;
            continue 'search;
        }
        break;
    }

    Ok(Shrunk {
        record: best,
        path,
        steps,
        attempts,
    })
}

/// Follow `path` from `root`, recording how many steps could be taken.
pub(crate) fn follow_path(
    root: Tree<Vec<Value>>,
    path: &[usize],
    reached: &Cell<usize>,
) -> Reify<Tree<Vec<Value>>> {
    let (tree, depth) = root.follow(path)?;
    reached.set(depth);
    Ok(tree)
}

//! The falsifier: replays stored failures, generates trials, shrinks and
//! reports.

use crate::data::{Config, Seed, Size};
use crate::error::{Failure, FalsifyError, Rejection, ShrinkStep, TestResult};
use crate::example::{Example, Origin};
use crate::property::{generate_all, generate_pinned, Explicit, Param};
use crate::random::RandomSource;
use crate::reject::Rejections;
use crate::shrink::{follow_path, shrink};
use crate::store::{ExampleStore, StoredExample, TestIdentity};
use crate::strategy::GenContext;
use crate::trial::{Body, Executor, Host, TrialOutcome, TrialRecord};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Replaying,
    Generating,
    Shrinking,
    Exhausted,
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Replaying => "replaying",
            Phase::Generating => "generating",
            Phase::Shrinking => "shrinking",
            Phase::Exhausted => "exhausted",
            Phase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// A falsifying trial and what regenerates it.
struct Found {
    record: TrialRecord,
    failure: Failure,
    ctx: GenContext,
    /// Candidate indices from the generated root to `record`.
    path: Vec<usize>,
    tests_run: usize,
}

enum Search {
    Found(Found),
    Passed {
        tests_run: usize,
        discards: usize,
    },
    Unsatisfiable {
        tests_run: usize,
        discards: usize,
        reason: String,
    },
}

/// Runs one test to completion against one host.
pub(crate) struct Falsifier<'a, H> {
    executor: Executor<'a, H>,
    params: &'a [Param],
    config: Config,
    identity: TestIdentity,
    store: Option<Arc<dyn ExampleStore>>,
    random: RandomSource,
    phase: Phase,
}

impl<'a, H: Host> Falsifier<'a, H> {
    pub fn new(
        host: &'a mut H,
        body: Body<H>,
        params: &'a [Param],
        config: Config,
        identity: TestIdentity,
        store: Option<Arc<dyn ExampleStore>>,
    ) -> Self {
        let names = params.iter().map(|param| param.name.clone()).collect();
        let random = match config.seed {
            Some(seed) => RandomSource::seeded(seed),
            None => RandomSource::from_entropy(),
        };
        Falsifier {
            executor: Executor::new(host, body, names),
            params,
            config,
            identity,
            store,
            random,
            phase: Phase::Idle,
        }
    }

    /// Search for a falsifying example.
    pub fn run(mut self) -> TestResult {
        self.falsify().unwrap_or_else(TestResult::from)
    }

    /// Run exactly one trial with pinned arguments.
    pub fn run_explicit(mut self, explicit: &Explicit) -> TestResult {
        self.falsify_explicit(explicit)
            .unwrap_or_else(TestResult::from)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(test = %self.identity.name, from = %self.phase, to = %phase, "falsifier transition");
        self.phase = phase;
    }

    fn context(&self, size: Size, seed: Seed) -> GenContext {
        GenContext::new(size, seed).with_filter_limit(self.config.filter_limit)
    }

    fn falsify(&mut self) -> Result<TestResult, FalsifyError> {
        let seed = self.random.seed();
        let found = match self.replay()? {
            Some(found) => found,
            None => {
                self.enter(Phase::Generating);
                match self.generate()? {
                    Search::Found(found) => found,
                    Search::Passed {
                        tests_run,
                        discards,
                    } => {
                        self.enter(Phase::Exhausted);
                        return Ok(TestResult::Pass {
                            tests_run,
                            discards,
                            seed,
                            property_name: None,
                        });
                    }
                    Search::Unsatisfiable {
                        tests_run,
                        discards,
                        reason,
                    } => {
                        self.enter(Phase::Exhausted);
                        return Ok(TestResult::Unsatisfiable {
                            tests_run,
                            discards,
                            reason,
                            property_name: None,
                        });
                    }
                }
            }
        };
        self.report(found, seed)
    }

    /// Re-run the stored example for this test, if there is one.
    fn replay(&mut self) -> Result<Option<Found>, FalsifyError> {
        let Some(store) = self.store.clone() else {
            return Ok(None);
        };
        let entry = match store.load(&self.identity) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(error) => {
                warn!(test = %self.identity.key(), %error, "failed to load stored example");
                return Ok(None);
            }
        };

        self.enter(Phase::Replaying);
        let ctx = self.context(entry.size, entry.seed);
        let params = self.params;
        let reached = Cell::new(0);
        let record = self.executor.run(Origin::Replayed, || {
            follow_path(generate_all(params, ctx)?, &entry.path, &reached)
        })?;

        let mut path = entry.path;
        if reached.get() < path.len() {
            warn!(
                test = %self.identity.key(),
                stored = path.len(),
                followed = reached.get(),
                "stored shrink path no longer matches the strategies"
            );
            path.truncate(reached.get());
        }

        let outcome = record.outcome.clone();
        match outcome {
            TrialOutcome::Fail(failure) | TrialOutcome::ReifyError(failure) => {
                debug!(example = %record.example, "stored example still falsifies");
                Ok(Some(Found {
                    record,
                    failure,
                    ctx,
                    path,
                    tests_run: 1,
                }))
            }
            TrialOutcome::Pass | TrialOutcome::Invalid(_) => {
                debug!(test = %self.identity.key(), "stored example no longer falsifies");
                self.clear(&*store);
                Ok(None)
            }
        }
    }

    /// Generate fresh trials until one falsifies or the budget runs out.
    fn generate(&mut self) -> Result<Search, FalsifyError> {
        let mut rejections = Rejections::new(self.config.discard_limit);
        let mut passed = 0;
        while passed < self.config.test_limit {
            let step = passed + rejections.count();
            let size = Size::ramp(step, self.config.test_limit, self.config.size_limit);
            let seed = self.random.next_seed();
            let ctx = self.context(size, seed);
            let params = self.params;
            let record = self
                .executor
                .run(Origin::Generated, || generate_all(params, ctx))?;

            let outcome = record.outcome.clone();
            match outcome {
                TrialOutcome::Pass => passed += 1,
                TrialOutcome::Invalid(rejection @ Rejection::FilterExhausted { .. }) => {
                    return Ok(Search::Unsatisfiable {
                        tests_run: passed,
                        discards: rejections.count() + 1,
                        reason: rejection.to_string(),
                    });
                }
                TrialOutcome::Invalid(rejection) => {
                    if let Err(exhausted) = rejections.reject() {
                        return Ok(Search::Unsatisfiable {
                            tests_run: passed,
                            discards: rejections.count(),
                            reason: format!("{exhausted} (last: {rejection})"),
                        });
                    }
                }
                TrialOutcome::Fail(failure) | TrialOutcome::ReifyError(failure) => {
                    debug!(tests_run = passed + 1, example = %record.example, "found a falsifying example");
                    return Ok(Search::Found(Found {
                        record,
                        failure,
                        ctx,
                        path: Vec::new(),
                        tests_run: passed + 1,
                    }));
                }
            }
        }
        Ok(Search::Passed {
            tests_run: passed,
            discards: rejections.count(),
        })
    }

    /// Shrink `found`, re-execute the minimal example and report it.
    fn report(&mut self, found: Found, seed: u64) -> Result<TestResult, FalsifyError> {
        let Found {
            record,
            failure: original,
            ctx,
            path: prefix,
            tests_run,
        } = found;

        self.enter(Phase::Shrinking);
        let shrunk = shrink(&mut self.executor, record, self.config.shrink_limit)?;
        debug!(
            adopted = shrunk.adopted(),
            attempts = shrunk.attempts,
            trials = self.executor.trials(),
            example = %shrunk.record.example,
            "shrinking finished"
        );

        self.enter(Phase::Reporting);
        let mut path = prefix;
        path.extend_from_slice(&shrunk.path);
        let params = self.params;
        let reached = Cell::new(0);
        let rerun = self
            .executor
            .run(shrunk.record.example.origin(), || {
                follow_path(generate_all(params, ctx)?, &path, &reached)
            })?;

        let reproduced = rerun.outcome.same_kind(&shrunk.record.outcome);
        let failure = match rerun.outcome {
            TrialOutcome::Fail(failure) | TrialOutcome::ReifyError(failure) if reproduced => failure,
            _ => {
                warn!(example = %shrunk.record.example, "minimal example passed when re-executed");
                return Err(FalsifyError::Flaky {
                    failure: shrunk.record.outcome.failure().cloned().unwrap_or(original),
                    example: shrunk.record.example,
                });
            }
        };

        self.save(ctx, &path, &rerun.example);
        Ok(TestResult::Fail {
            failure,
            example: rerun.example,
            tests_run,
            shrinks_performed: shrunk.adopted(),
            shrink_steps: shrunk.steps,
            seed,
            property_name: None,
        })
    }

    fn falsify_explicit(&mut self, explicit: &Explicit) -> Result<TestResult, FalsifyError> {
        explicit.validate(self.params)?;
        let seed = self.random.seed();
        let trial_seed = self.random.next_seed();
        let ctx = self.context(Size(self.config.size_limit), trial_seed);
        let params = self.params;
        let record = self
            .executor
            .run(Origin::Explicit, || generate_pinned(params, explicit, ctx))?;

        Ok(match record.outcome {
            TrialOutcome::Pass => TestResult::Pass {
                tests_run: 1,
                discards: 0,
                seed,
                property_name: None,
            },
            TrialOutcome::Invalid(rejection) => TestResult::Unsatisfiable {
                tests_run: 0,
                discards: 1,
                reason: format!("the explicit example was rejected: {rejection}"),
                property_name: None,
            },
            TrialOutcome::Fail(failure) | TrialOutcome::ReifyError(failure) => TestResult::Fail {
                failure,
                shrink_steps: vec![ShrinkStep {
                    counterexample: record.example.to_string(),
                    step: 0,
                }],
                example: record.example,
                tests_run: 1,
                shrinks_performed: 0,
                seed,
                property_name: None,
            },
        })
    }

    fn save(&self, ctx: GenContext, path: &[usize], example: &Example) {
        let Some(store) = &self.store else {
            return;
        };
        let entry = StoredExample {
            test: self.identity.key(),
            seed: ctx.seed,
            size: ctx.size,
            path: path.to_vec(),
            arguments: example.arguments(),
        };
        match store.save(&self.identity, &entry) {
            Ok(()) => debug!(test = %entry.test, shrinks = path.len(), "saved falsifying example"),
            Err(error) => warn!(test = %entry.test, %error, "failed to save falsifying example"),
        }
    }

    fn clear(&self, store: &dyn ExampleStore) {
        if let Err(error) = store.clear(&self.identity) {
            warn!(test = %self.identity.key(), %error, "failed to clear stored example");
        }
    }
}

//! Setup and teardown demonstration
//!
//! A test bound to a host gets `setup_example` before and
//! `teardown_example` after every trial, including the shrink candidates and
//! the final re-execution of the minimal counterexample.

use falsify::*;
use std::collections::HashMap;
use std::sync::Arc;

/// A tiny key-value store that must be emptied between trials.
#[derive(Default)]
struct Scratch {
    entries: HashMap<String, i64>,
    setups: usize,
    teardowns: usize,
}

impl Host for Scratch {
    fn setup_example(&mut self) {
        self.setups += 1;
        assert!(self.entries.is_empty(), "previous trial leaked state");
    }

    fn teardown_example(&mut self, _example: &Example) {
        self.teardowns += 1;
        self.entries.clear();
    }
}

fn main() {
    println!("=== Setup and Teardown Demonstration ===\n");

    example_passing_run();
    example_failing_run();
    example_explicit_run();
    example_stored_examples();
}

fn put_then_get() -> TestCase<Scratch> {
    TestCase::new("put_then_get", |scratch: &mut Scratch, trial: &Trial| {
        let key = trial.arg::<String>("key");
        let value = *trial.arg::<i64>("value");
        scratch.entries.insert(key.clone(), value);
        scratch.entries.get(key) == Some(&value)
    })
    .param("key", Strategy::ascii_string())
    .param("value", Strategy::integers())
}

/// Buggy: refuses to store negative values.
fn put_rejects_negatives() -> TestCase<Scratch> {
    TestCase::new("put_rejects_negatives", |scratch: &mut Scratch, trial: &Trial| {
        let key = trial.arg::<String>("key");
        let value = *trial.arg::<i64>("value");
        if value >= 0 {
            scratch.entries.insert(key.clone(), value);
        }
        if scratch.entries.get(key) == Some(&value) {
            Ok(())
        } else {
            Err(format!("{key:?} was not stored"))
        }
    })
    .param("key", Strategy::ascii_string())
    .param("value", Strategy::integers())
}

fn example_passing_run() {
    println!("1. A passing run");

    let mut scratch = Scratch::default();
    let result = put_then_get().bind(&mut scratch).run();
    println!("{result}");
    println!(
        "   setups: {}, teardowns: {}\n",
        scratch.setups, scratch.teardowns
    );
}

fn example_failing_run() {
    println!("2. A failing run, shrunk to a minimal counterexample");

    let mut scratch = Scratch::default();
    let result = put_rejects_negatives()
        .with_config(Config::default().with_seed(7))
        .run(&mut scratch);
    println!("{result}");
    println!(
        "   setups: {}, teardowns: {}\n",
        scratch.setups, scratch.teardowns
    );
}

fn example_explicit_run() {
    println!("3. One trial with pinned arguments");

    let mut scratch = Scratch::default();
    let explicit = Explicit::new()
        .arg("key", String::from("answer"))
        .arg("value", 42i64);
    let result = put_then_get().run_with(&mut scratch, explicit);
    println!("{result}");
    println!(
        "   setups: {}, teardowns: {}\n",
        scratch.setups, scratch.teardowns
    );
}

fn example_stored_examples() {
    println!("4. Replaying a remembered counterexample");

    let store = Arc::new(InMemoryStore::new());
    let test = put_rejects_negatives().with_store(store.clone());

    let mut scratch = Scratch::default();
    let first = test.run(&mut scratch);
    println!("   first run:  {} trials", scratch.setups);

    let mut scratch = Scratch::default();
    let second = test.run(&mut scratch);
    println!("   second run: {} trials", scratch.setups);

    if let (Some(a), Some(b)) = (first.counterexample(), second.counterexample()) {
        println!("   same counterexample: {}", a.same_arguments(b));
    }
    println!("   stored entries: {}", store.len());
}

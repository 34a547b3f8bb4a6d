//! State machine properties
//!
//! Programs of rule applications are falsified and shrunk like any other
//! argument, and a stored failing program is replayed on the next run.

use crate::seeded;
use falsify::*;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Account {
    balance: i64,
}

fn overdraft(store: Arc<dyn ExampleStore>) -> StateMachine<Account> {
    StateMachine::new("account", Account::default)
        .rule(Rule::new(
            "deposit",
            Strategy::int_range(1, 100),
            |account: &mut Account, amount: &i64| account.balance += amount,
        ))
        .rule(
            // Missing the funds check.
            Rule::new(
                "withdraw",
                Strategy::int_range(1, 100),
                |account: &mut Account, amount: &i64| account.balance -= amount,
            )
            .with_precondition(|account: &Account| account.balance > 0),
        )
        .invariant("never_overdrawn", |account: &Account| account.balance >= 0)
        .with_store(store)
        .with_config(seeded(11))
}

fn program_of(result: &TestResult) -> String {
    result
        .counterexample()
        .and_then(|example| example.get::<Program>(STEPS))
        .map(|program| format!("{program:?}"))
        .unwrap_or_default()
}

/// Property: an overdraft shrinks to one deposit and one larger withdrawal
pub fn test_overdraft_shrinks_to_two_steps() {
    let store = Arc::new(InMemoryStore::new());
    let result = overdraft(store.clone()).check();

    assert!(result.is_fail(), "{result}");
    assert_eq!(program_of(&result), "[deposit(1), withdraw(2)]");
    assert_eq!(store.len(), 1);

    let message = result.failure().map(|f| f.message.as_str()).unwrap_or("");
    assert!(message.contains("never_overdrawn"), "{message}");
    assert!(message.contains("withdraw(2)"), "{message}");
}

/// Property: the stored program is the first trial of the next run
pub fn test_stored_program_is_replayed() {
    let store = Arc::new(InMemoryStore::new());
    let first = overdraft(store.clone()).check();

    let second = overdraft(store.clone()).check();
    assert!(second.is_fail(), "{second}");
    assert_eq!(program_of(&second), program_of(&first));
    assert!(matches!(second, TestResult::Fail { tests_run: 1, .. }));
}

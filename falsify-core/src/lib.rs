//! Core engine for falsify property-based testing.
//!
//! This crate provides strategies with integrated shrinking, the trial
//! lifecycle with host setup and teardown hooks, the greedy shrinker, the
//! falsifier that drives a run, rule-based state machines, and example
//! stores for replaying failures.

pub mod data;
pub mod error;
pub mod example;
mod falsifier;
pub mod property;
pub mod random;
pub mod reject;
mod shrink;
pub mod stateful;
pub mod store;
pub mod strategy;
pub mod trial;
pub mod tree;

// Re-export the main types
pub use data::*;
pub use error::*;
pub use example::*;
pub use property::*;
pub use random::*;
pub use reject::*;
pub use stateful::*;
pub use store::*;
pub use strategy::*;
pub use trial::*;
pub use tree::*;

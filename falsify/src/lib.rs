//! Falsify property-based testing library.
//!
//! This is the main entry point for falsify: declare a [`TestCase`] with
//! named strategies, bind it to a [`Host`] and run it.

pub use falsify_core::*;

//! Test infrastructure for the search core.
//!
//! Fixtures build realistic records; the harness wraps the in-memory backend
//! and invalidation store with call counting and fault injection.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;

pub use assertions::*;
pub use fixtures::*;
pub use harness::*;

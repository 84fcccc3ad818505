//! Testing utilities: fixtures and a store that fails on demand
//!
//! Compiled into the library so integration tests under `tests/` can share
//! the same fixtures as unit tests.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

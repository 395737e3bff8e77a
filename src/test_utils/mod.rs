//! Shared test utilities for hybrank.
//!
//! Compiled into the library so unit tests, the integration suites and the
//! benches all build engines from the same corpora and doubles.

pub mod doubles;
pub mod fixtures;
pub mod logging;

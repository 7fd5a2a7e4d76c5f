//! In-process stand-ins for the managed runtime and the native engine
//!
//! Both fakes keep enough bookkeeping for tests to assert on exact
//! attach/detach counts, local-reference balance, retain counts and slice
//! frees. Compiled for this crate's own tests and, with the `testing`
//! feature, for downstream test suites.

mod engine;
mod runtime;

pub use engine::{FakeEngine, StreamSnapshot};
pub use runtime::{FakeRuntime, Invocation, Observed, Thrown};

//! Cooperative, single-threaded polling scheduler with promise settlement.
//!
//! This crate provides a minimal cooperative concurrency model: tasks are
//! zero-argument predicates polled once per scheduler sweep, and promises are
//! settle-once state machines whose combinators are driven by those tasks.
//! Everything runs on the calling thread; there is no I/O, no preemption,
//! and no locking.
//!
//! # Architecture
//!
//! - **Context**: one run of the scheduler loop; owns an ordered task list
//!   and drives sweeps until it drains via [`Context::run`] / [`block_on`]
//! - **Task**: wraps a polled predicate with an optional completion callback
//! - **Promise**: settle-once machine with `then`/`catch`/`finally` queues
//!   and the `all`/`any` combinators plus a task bridge
//! - **ContextBuilder**: fluent builder for context instantiation
//!
//! # Example
//!
//! ```ignore
//! use sweep::{block_on, PollState, Promise};
//!
//! let value = block_on(|| {
//!     Promise::spawn(|| PollState::Ready("done")).unwrap()
//! })
//! .unwrap();
//! assert_eq!(value, "done");
//! ```

mod error;
mod promise;
mod scheduler;
mod task;

pub use error::Error;
pub use promise::{Outcome, Promise, Settler};
pub use scheduler::{Context, ContextBuilder, RunResult, block_on};
pub use task::{PollState, TaskId, cancel, detach, spawn};

//! Polled task wrapper and the task-creation entry points.
//!
//! A task pairs a zero-argument predicate with an optional completion
//! callback. The owning scheduler context polls the predicate once per sweep;
//! the first time the predicate reports a definite outcome the task is
//! removed from its context and the completion fires exactly once with that
//! outcome. Tasks are never re-added.
//!
//! # Spawning
//!
//! Tasks are registered with [`spawn`] (or [`detach`] when no completion is
//! needed) from within a running scheduler context:
//!
//! ```ignore
//! use sweep::{block_on, spawn, PollState};
//!
//! block_on(|| {
//!     spawn(
//!         || PollState::Ready(42),
//!         |outcome| {
//!             println!("task finished: {:?}", outcome);
//!             Ok(())
//!         },
//!     )
//!     .unwrap();
//! })
//! .unwrap();
//! ```
//!
//! # How tasks run
//!
//! 1. A predicate and completion are wrapped in a [`Task`]
//! 2. The task is appended to the active context's ordered list
//! 3. Each sweep, the context calls the predicate once
//! 4. [`PollState::Pending`] keeps the task registered for the next sweep
//! 5. [`PollState::Ready`] or [`PollState::Failed`] removes the task, then
//!    fires the completion with `Ok(value)` or `Err(error)`

use crate::error::Error;
use crate::scheduler::Context;

/// Result of polling a task's predicate once.
///
/// This is a deliberate tri-state: a predicate that is genuinely done with a
/// falsy-looking value (`0`, an empty string) returns `Ready` and settles
/// normally, and is never confused with "not yet ready".
#[derive(Debug)]
pub enum PollState<T> {
    /// No definite outcome yet; the predicate is tried again next sweep.
    Pending,
    /// The predicate finished with a value.
    Ready(T),
    /// The predicate failed; the error becomes the task's outcome.
    Failed(Error),
}

/// Identity of a registered task within its scheduler context.
///
/// Returned by [`spawn`] and accepted by [`cancel`]. Copyable and comparable
/// so multiple completion paths can race to remove the same task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

/// What a single poll of a task produced, as seen by the scheduler.
///
/// A settled step carries the completion thunk so the scheduler can remove
/// the task from its list *before* the completion runs, matching the
/// remove-then-notify lifecycle.
pub(crate) enum Step {
    /// Predicate had no definite outcome; poll again next sweep.
    Pending,
    /// Predicate reported an outcome; the thunk delivers it to the
    /// completion callback.
    Settled(Box<dyn FnOnce() -> Result<(), Error>>),
}

/// A registered unit of polled work.
///
/// The predicate and completion are type-erased behind a single step closure
/// so a context can hold tasks of different value types in one ordered list.
pub(crate) struct Task {
    step: Box<dyn FnMut() -> Step>,
}

impl Task {
    /// Wraps a typed predicate and completion into an erased task.
    pub(crate) fn new<T, P, C>(mut predicate: P, completion: C) -> Self
    where
        T: 'static,
        P: FnMut() -> PollState<T> + 'static,
        C: FnOnce(Result<T, Error>) -> Result<(), Error> + 'static,
    {
        let mut completion = Some(completion);

        let step = Box::new(move || {
            let outcome = match predicate() {
                PollState::Pending => return Step::Pending,
                PollState::Ready(value) => Ok(value),
                PollState::Failed(error) => Err(error),
            };

            // A task is removed after its first definite outcome, so the
            // completion can only ever be taken once.
            let completion = completion.take();

            Step::Settled(Box::new(move || match completion {
                Some(complete) => complete(outcome),
                None => Ok(()),
            }))
        });

        Self { step }
    }

    /// Runs the predicate once and reports what it produced.
    pub(crate) fn poll(&mut self) -> Step {
        (self.step)()
    }
}

/// Registers a task in the currently active scheduler context.
///
/// The predicate is polled once per sweep until it yields a definite
/// outcome; the completion then fires exactly once, on that same sweep, with
/// `Ok(value)` or `Err(error)`. A completion returning `Err` (an unhandled
/// promise rejection, typically) is logged by the scheduler and never aborts
/// the sweep.
///
/// # Errors
/// [`Error::Context`] if no scheduler context is active on this thread.
///
/// # Example
/// ```ignore
/// let id = spawn(
///     move || if ready() { PollState::Ready(1) } else { PollState::Pending },
///     |outcome| { println!("{outcome:?}"); Ok(()) },
/// )?;
/// ```
pub fn spawn<T, P, C>(predicate: P, completion: C) -> Result<TaskId, Error>
where
    T: 'static,
    P: FnMut() -> PollState<T> + 'static,
    C: FnOnce(Result<T, Error>) -> Result<(), Error> + 'static,
{
    let context = Context::current()?;
    Ok(context.add(Task::new(predicate, completion)))
}

/// Registers a task without a completion callback.
///
/// The value of a `Ready` outcome is dropped; a `Failed` outcome is logged
/// at error level, since there is no completion left to receive it.
///
/// # Errors
/// [`Error::Context`] if no scheduler context is active on this thread.
pub fn detach<T, P>(predicate: P) -> Result<TaskId, Error>
where
    T: 'static,
    P: FnMut() -> PollState<T> + 'static,
{
    spawn(predicate, |outcome: Result<T, Error>| {
        if let Err(error) = outcome {
            log::error!("task: detached task failed: {}", error);
        }
        Ok(())
    })
}

/// Removes a task from the currently active scheduler context.
///
/// Removing a task that is not present (already completed, or already
/// cancelled through another path) is a safe no-op; multiple completion
/// paths may race to remove the same task.
///
/// # Errors
/// [`Error::Context`] if no scheduler context is active on this thread.
pub fn cancel(id: TaskId) -> Result<(), Error> {
    let context = Context::current()?;
    context.remove(id);
    Ok(())
}

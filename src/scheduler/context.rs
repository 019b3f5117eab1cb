//! Scheduler context: the active cooperative loop driving task polling.
//!
//! A [`Context`] owns an ordered list of live tasks and drives sweeps over
//! that list until it drains. Exactly one context is *active* per thread at
//! any instant; the active context is tracked in thread-local storage with a
//! strict LIFO save/restore around every [`Context::run`], so distinct
//! contexts nest like a stack of independent event loops and tests on
//! separate threads never see each other's scheduler.
//!
//! # Purpose
//!
//! - Provides the thread-local slot that task registration and promise
//!   combinators resolve against ([`Context::current`]).
//! - Enforces the invariant that a context's task list is only mutated while
//!   that context is active: all public mutation goes through the
//!   active-context entry points (`spawn`, `detach`, `cancel`).
//! - Guards against double-driving: a context invoking `run` on itself while
//!   its own sweep is in progress executes the body only, leaving the outer
//!   sweep to drive whatever the body registered.
//!
//! # Sweep contract
//!
//! Within one sweep, tasks are polled in list order. A task removed mid-scan
//! shrinks the list under the cursor without skipping its successor; a task
//! appended mid-scan is visited in the *same* sweep. After a full scan with
//! tasks remaining, the context sleeps for its configured tick before
//! rescanning, so a waiting scheduler does not peg a core.

use crate::error::Error;
use crate::promise::Promise;
use crate::task::{Step, Task, TaskId};

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

thread_local! {
    /// The currently active scheduler context for this thread.
    ///
    /// Saved and restored around every non-reentrant [`Context::run`].
    static ACTIVE: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// A registered task together with its identity.
struct TaskEntry {
    id: TaskId,
    task: Rc<RefCell<Task>>,
}

struct ContextInner {
    /// Live tasks in insertion order. Mutable during iteration: predicates
    /// and completions may register or remove tasks while a sweep is
    /// scanning, so borrows of this list are never held across user code.
    tasks: RefCell<Vec<TaskEntry>>,
    next_id: Cell<u64>,
    tick: Duration,
}

/// One run of the cooperative scheduler loop.
///
/// Cloning a `Context` yields another handle to the *same* instance (two
/// handles compare as the same context for the reentrancy guard); use
/// [`Context::new`] for an independent instance.
///
/// # Example
/// ```ignore
/// let context = Context::new();
/// let result = context.run(|| {
///     Promise::spawn(|| PollState::Ready("done")).unwrap()
/// })?;
/// ```
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Context {
    /// Creates a new, independent scheduler context with default settings.
    pub fn new() -> Self {
        crate::scheduler::ContextBuilder::new().build()
    }

    pub(crate) fn with_tick(tick: Duration) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                tasks: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                tick,
            }),
        }
    }

    /// Returns a handle to the currently active context on this thread.
    ///
    /// # Errors
    /// [`Error::Context`] if no context is active.
    pub(crate) fn current() -> Result<Self, Error> {
        ACTIVE.with(|active| active.borrow().clone()).ok_or_else(|| {
            Error::Context("no scheduler context is active on this thread".into())
        })
    }

    /// Whether this instance is the one currently active on this thread.
    fn is_active(&self) -> bool {
        ACTIVE.with(|active| {
            matches!(&*active.borrow(), Some(current) if Rc::ptr_eq(&current.inner, &self.inner))
        })
    }

    /// Appends a task to this context's list and hands back its identity.
    ///
    /// Only reachable through the active-context entry points, so the list
    /// is never mutated while this context is inactive.
    pub(crate) fn add(&self, task: Task) -> TaskId {
        let id = TaskId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        self.inner.tasks.borrow_mut().push(TaskEntry {
            id,
            task: Rc::new(RefCell::new(task)),
        });

        log::trace!("scheduler: task {:?} registered", id);
        id
    }

    /// Removes a task by identity. Removing an absent task is a no-op.
    pub(crate) fn remove(&self, id: TaskId) {
        self.inner.tasks.borrow_mut().retain(|entry| entry.id != id);
    }

    /// Activates this context, runs `body`, and drives the task list to
    /// completion.
    ///
    /// The previously active context (if any) is saved on entry and restored
    /// on exit, so distinct contexts nest strictly LIFO: an inner `run`
    /// drains its own task list completely before the outer sweep resumes.
    ///
    /// If this instance is *already* the active one, the body is invoked
    /// without starting a nested sweep; the outer sweep, already in
    /// progress, drives any tasks the body registers. This guards against a
    /// double sweep of the same list.
    ///
    /// The body's return value is interpreted through [`RunResult`]: a
    /// returned [`Promise`] must be settled by the time the list drains, and
    /// its resolution becomes this call's `Ok` value while a rejection is
    /// re-raised as `Err`; a `()` body yields `Ok(())`.
    ///
    /// # Errors
    /// A rejection stored in a body-returned promise, or
    /// [`Error::Configuration`] if that promise is still pending once the
    /// list has drained.
    pub fn run<B, R>(&self, body: B) -> Result<R::Output, Error>
    where
        B: FnOnce() -> R,
        R: RunResult,
    {
        if self.is_active() {
            log::trace!("scheduler: reentrant run on the active context, body only");
            return body().finish();
        }

        let previous = ACTIVE.with(|active| active.borrow_mut().replace(self.clone()));
        log::trace!("scheduler: context activated");

        let returned = body();
        self.sweep();

        ACTIVE.with(|active| *active.borrow_mut() = previous);
        log::trace!("scheduler: context deactivated");

        returned.finish()
    }

    /// Drives the task list until it is empty.
    ///
    /// One sweep scans by index from 0 upward, re-checking at each position
    /// that an entry still exists: polled tasks may remove themselves or
    /// siblings (shrinking the list under the cursor) and may append new
    /// tasks (visited later in this same sweep). The cursor only advances
    /// past an entry that still occupies its slot, so an entry shifted down
    /// by a removal is not skipped.
    fn sweep(&self) {
        loop {
            let mut cursor = 0;

            loop {
                let (id, task) = {
                    let tasks = self.inner.tasks.borrow();
                    match tasks.get(cursor) {
                        Some(entry) => (entry.id, Rc::clone(&entry.task)),
                        None => break,
                    }
                };

                // The list borrow is released before polling: the predicate
                // may reentrantly spawn or cancel tasks in this context.
                let step = task.borrow_mut().poll();

                match step {
                    Step::Pending => {}
                    Step::Settled(complete) => {
                        self.remove(id);

                        // One failing task must never abort the sweep; a
                        // completion failure has nowhere left to go but the
                        // log.
                        if let Err(error) = complete() {
                            log::error!("scheduler: task {:?} completion failed: {}", id, error);
                        }
                    }
                }

                let occupied = self.inner.tasks.borrow().get(cursor).map(|entry| entry.id);
                if occupied == Some(id) {
                    cursor += 1;
                }
            }

            if self.inner.tasks.borrow().is_empty() {
                break;
            }

            // Scan finished with tasks still waiting: pause for one tick
            // instead of spinning.
            thread::sleep(self.inner.tick);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpretation of a scope body's return value.
///
/// Implemented for `()` (the body ran for its side effects) and for
/// [`Promise`] (the body's promise is unwrapped into the scope's result once
/// the task list has drained).
pub trait RunResult {
    /// The value [`Context::run`] produces for this body type.
    type Output;

    /// Extracts the final result after the owning context has drained.
    fn finish(self) -> Result<Self::Output, Error>;
}

impl RunResult for () {
    type Output = ();

    fn finish(self) -> Result<(), Error> {
        Ok(())
    }
}

impl<T: Clone + 'static> RunResult for Promise<T> {
    type Output = T;

    fn finish(self) -> Result<T, Error> {
        match self.settlement() {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(error),
            None => Err(Error::Configuration(
                "scope body returned a promise that never settled".into(),
            )),
        }
    }
}

/// Creates a scheduler context and runs `body` in it until every registered
/// task has drained.
///
/// This is the crate's front door. The body may register tasks directly
/// ([`crate::spawn`]) or indirectly through promise combinators; `block_on`
/// returns once all of them have reached a definite outcome.
///
/// If the body returns a [`Promise`], its settlement becomes the call's
/// result: resolution as `Ok`, rejection re-raised as `Err`. A `()` body
/// yields `Ok(())`.
///
/// # Example
/// ```ignore
/// use sweep::{block_on, Promise};
///
/// let values = block_on(|| {
///     Promise::all(vec![Promise::resolve(1), Promise::resolve(2)]).unwrap()
/// })?;
/// assert_eq!(values, vec![Ok(1), Ok(2)]);
/// ```
pub fn block_on<B, R>(body: B) -> Result<R::Output, Error>
where
    B: FnOnce() -> R,
    R: RunResult,
{
    Context::new().run(body)
}

//! Promise settlement machine with chaining and combinators.
//!
//! A [`Promise`] is a settle-once state machine: it starts `Pending` and
//! transitions exactly once to `Resolved` or `Rejected`; every later
//! settlement attempt is a no-op. Continuations registered before settlement
//! are queued in order; continuations registered after settlement run
//! immediately and synchronously, before the registering call returns.
//!
//! Chaining mutates in place: [`Promise::then`], [`Promise::catch`] and
//! [`Promise::finally`] return the *same* instance, not a derived promise.
//!
//! # Settlement
//!
//! A promise is settled through the [`Settler`] handed to its executor:
//!
//! ```ignore
//! use sweep::{Error, Promise};
//!
//! let greeting = Promise::new(|settler| settler.resolve("hello"));
//! greeting.then(|value| {
//!     println!("{value}");
//!     Ok(())
//! });
//! ```
//!
//! An executor that fails before settling funnels its error into the
//! rejection path automatically.
//!
//! # Combinators
//!
//! [`Promise::all`], [`Promise::any`] and the task bridge [`Promise::spawn`]
//! are built on internally created tasks, so they need an active scheduler
//! context and fail with [`Error::Context`] outside one. `all` waits for
//! *every* member to reach a terminal state and then always resolves with
//! the members' terminal values in input order; it never rejects on its own
//! and never short-circuits on the first rejection. `any` resolves with the
//! first member's terminal value, resolved or rejected alike.

use crate::error::Error;
use crate::task::PollState;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type ThenFn<T> = Box<dyn FnOnce(&T) -> Result<(), Error>>;
type CatchFn = Box<dyn FnOnce(&Error)>;
type FinallyFn<T> = Box<dyn for<'a> FnOnce(Outcome<'a, T>)>;

/// Borrowed view of a settled promise, handed to `finally` continuations.
pub enum Outcome<'a, T> {
    /// The promise resolved with this value.
    Resolved(&'a T),
    /// The promise rejected with this error.
    Rejected(&'a Error),
}

enum State<T> {
    Pending,
    Resolved(Rc<T>),
    Rejected(Error),
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Resolved(value) => Self::Resolved(Rc::clone(value)),
            Self::Rejected(error) => Self::Rejected(error.clone()),
        }
    }
}

struct Inner<T> {
    state: State<T>,
    then: VecDeque<ThenFn<T>>,
    catch: VecDeque<CatchFn>,
    finally: VecDeque<FinallyFn<T>>,
}

/// A settle-once value with queued continuations.
///
/// `Promise` is a cheap handle over shared interior state: cloning it yields
/// another handle to the same settlement machine, which is how combinators,
/// settlers, and callers all observe one settlement.
///
/// # Example
/// ```ignore
/// let total = block_on(|| {
///     Promise::all(vec![Promise::resolve(1), Promise::resolve(2)]).unwrap()
/// })?;
/// ```
pub struct Promise<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Settlement functions bound to one promise.
///
/// Handed to the executor by [`Promise::new`]; cloneable so it can be moved
/// into task completions or stored for later settlement. Both methods are
/// no-ops returning `Ok(())` once the promise is settled.
pub struct Settler<T> {
    promise: Promise<T>,
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T: 'static> Settler<T> {
    /// Resolves the bound promise, firing queued `then` then `finally`
    /// continuations in registration order.
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        self.promise.settle_ok(value)
    }

    /// Rejects the bound promise, firing queued `catch` then `finally`
    /// continuations in registration order.
    ///
    /// # Errors
    /// [`Error::UnhandledRejection`] wrapping the payload when no `catch`
    /// continuation is registered at the moment of rejection. The promise is
    /// rejected either way; a `catch` attached afterwards still intercepts
    /// the stored error.
    pub fn reject(&self, error: Error) -> Result<(), Error> {
        self.promise.settle_err(error)
    }
}

impl<T: 'static> Promise<T> {
    fn with_state(state: State<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state,
                then: VecDeque::new(),
                catch: VecDeque::new(),
                finally: VecDeque::new(),
            })),
        }
    }

    fn pending() -> Self {
        Self::with_state(State::Pending)
    }

    /// Creates a promise and immediately runs `executor` with its
    /// [`Settler`].
    ///
    /// If the executor returns `Err` before settling, the error funnels into
    /// the rejection path as if `reject` had been called with it. A
    /// rejection that nobody has caught yet is logged; the returned promise
    /// is `Rejected` and a later `catch` still receives the stored error.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Settler<T>) -> Result<(), Error>,
    {
        let promise = Self::pending();
        let settler = Settler {
            promise: promise.clone(),
        };

        if let Err(raised) = executor(settler) {
            if let Err(unhandled) = promise.settle_err(raised) {
                log::error!("promise: rejected during construction: {}", unhandled);
            }
        }

        promise
    }

    /// Returns a promise already resolved with `value`.
    pub fn resolve(value: T) -> Self {
        Self::with_state(State::Resolved(Rc::new(value)))
    }

    /// Returns a promise already rejected with `error`.
    ///
    /// No continuation can be registered yet, so nothing fires; the first
    /// `catch` attached to the returned promise runs immediately with the
    /// stored error.
    pub fn reject(error: Error) -> Self {
        Self::with_state(State::Rejected(error))
    }

    /// True once the promise has settled, in either direction.
    pub fn is_done(&self) -> bool {
        !matches!(self.inner.borrow().state, State::Pending)
    }

    /// Registers a resolution continuation, or runs it now if already
    /// resolved.
    ///
    /// A continuation returning `Err` funnels that error into the rejection
    /// path: every `catch` continuation registered so far fires with it.
    /// The settled state and stored value do not change; state transitions
    /// are terminal.
    ///
    /// Returns the same instance for chaining.
    pub fn then<F>(&self, continuation: F) -> &Self
    where
        F: FnOnce(&T) -> Result<(), Error> + 'static,
    {
        let resolved = match &self.inner.borrow().state {
            State::Resolved(value) => Some(Rc::clone(value)),
            State::Pending | State::Rejected(_) => None,
        };

        match resolved {
            Some(value) => {
                if let Err(raised) = continuation(&value) {
                    self.fire_catches(raised);
                }
            }
            None => self
                .inner
                .borrow_mut()
                .then
                .push_back(Box::new(continuation)),
        }

        self
    }

    /// Registers a rejection continuation, or runs it now if already
    /// rejected.
    ///
    /// Returns the same instance for chaining.
    pub fn catch<F>(&self, continuation: F) -> &Self
    where
        F: FnOnce(&Error) + 'static,
    {
        let rejected = match &self.inner.borrow().state {
            State::Rejected(error) => Some(error.clone()),
            State::Pending | State::Resolved(_) => None,
        };

        match rejected {
            Some(error) => continuation(&error),
            None => self
                .inner
                .borrow_mut()
                .catch
                .push_back(Box::new(continuation)),
        }

        self
    }

    /// Registers a continuation for either settlement, or runs it now if
    /// already settled.
    ///
    /// Queued `finally` continuations fire after the relevant resolution or
    /// rejection continuations, with a borrowed [`Outcome`] view of the
    /// terminal state.
    ///
    /// Returns the same instance for chaining.
    pub fn finally<F>(&self, continuation: F) -> &Self
    where
        F: for<'a> FnOnce(Outcome<'a, T>) + 'static,
    {
        if self.is_done() {
            self.deliver_finally(Box::new(continuation));
        } else {
            self.inner
                .borrow_mut()
                .finally
                .push_back(Box::new(continuation));
        }

        self
    }

    /// Bridges a polled predicate into a promise.
    ///
    /// Spawns a task in the active context; the predicate's eventual
    /// `Ready` resolves the promise and its eventual `Failed` rejects it.
    ///
    /// # Errors
    /// [`Error::Context`] if no scheduler context is active.
    pub fn spawn<P>(predicate: P) -> Result<Self, Error>
    where
        P: FnMut() -> PollState<T> + 'static,
    {
        let bridged = Self::pending();
        let settler = Settler {
            promise: bridged.clone(),
        };

        crate::task::spawn(predicate, move |outcome| match outcome {
            Ok(value) => settler.resolve(value),
            Err(error) => settler.reject(error),
        })?;

        Ok(bridged)
    }

    /// Transitions `Pending -> Resolved` and drains continuations.
    ///
    /// Continuation queues are popped one at a time with the interior
    /// borrow released, because a running continuation may reentrantly
    /// register further continuations on this same promise.
    fn settle_ok(&self, value: T) -> Result<(), Error> {
        let stored = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending) {
                return Ok(());
            }
            let stored = Rc::new(value);
            inner.state = State::Resolved(Rc::clone(&stored));
            stored
        };

        while let Some(continuation) = self.next_then() {
            if let Err(raised) = continuation(&stored) {
                // A failing `then` skips the rest of the resolution queue
                // and hands the error to the rejection continuations.
                self.fire_catches(raised);
                break;
            }
        }

        self.fire_finally();
        Ok(())
    }

    /// Transitions `Pending -> Rejected` and drains continuations.
    fn settle_err(&self, error: Error) -> Result<(), Error> {
        {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending) {
                return Ok(());
            }
            inner.state = State::Rejected(error.clone());
        }

        let has_catch = !self.inner.borrow().catch.is_empty();
        if !has_catch {
            return Err(Error::UnhandledRejection(Box::new(error)));
        }

        while let Some(continuation) = self.next_catch() {
            continuation(&error);
        }

        self.fire_finally();
        Ok(())
    }

    fn next_then(&self) -> Option<ThenFn<T>> {
        self.inner.borrow_mut().then.pop_front()
    }

    fn next_catch(&self) -> Option<CatchFn> {
        self.inner.borrow_mut().catch.pop_front()
    }

    fn next_finally(&self) -> Option<FinallyFn<T>> {
        self.inner.borrow_mut().finally.pop_front()
    }

    /// Delivers `error` to every registered rejection continuation without
    /// touching the settled state.
    fn fire_catches(&self, error: Error) {
        let mut delivered = false;

        while let Some(continuation) = self.next_catch() {
            delivered = true;
            continuation(&error);
        }

        if !delivered {
            log::error!("promise: unhandled continuation failure: {}", error);
        }
    }

    fn fire_finally(&self) {
        while let Some(continuation) = self.next_finally() {
            self.deliver_finally(continuation);
        }
    }

    fn deliver_finally(&self, continuation: FinallyFn<T>) {
        let snapshot = self.inner.borrow().state.clone();
        match snapshot {
            State::Resolved(value) => continuation(Outcome::Resolved(&value)),
            State::Rejected(error) => continuation(Outcome::Rejected(&error)),
            State::Pending => {}
        }
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// Snapshot of the terminal state: `None` while pending, otherwise the
    /// resolved value or the rejection error.
    pub fn settlement(&self) -> Option<Result<T, Error>> {
        match &self.inner.borrow().state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(T::clone(value))),
            State::Rejected(error) => Some(Err(error.clone())),
        }
    }

    /// Waits for every member to reach a terminal state, then resolves with
    /// all terminal values in input order.
    ///
    /// The internal task polls every member's `is_done` each sweep. A
    /// rejected member does not short-circuit the wait and does not reject
    /// the combined promise: its error simply appears in place in the
    /// resolved list. An empty input resolves with an empty list on the
    /// first sweep.
    ///
    /// # Errors
    /// [`Error::Context`] if no scheduler context is active.
    pub fn all(promises: Vec<Promise<T>>) -> Result<Promise<Vec<Result<T, Error>>>, Error> {
        let gathered = Promise::pending();
        let settler = Settler {
            promise: gathered.clone(),
        };

        crate::task::spawn(
            move || {
                let settlements: Option<Vec<Result<T, Error>>> =
                    promises.iter().map(Promise::settlement).collect();

                match settlements {
                    Some(values) => PollState::Ready(values),
                    None => PollState::Pending,
                }
            },
            move |outcome| match outcome {
                Ok(values) => settler.resolve(values),
                Err(error) => settler.reject(error),
            },
        )?;

        Ok(gathered)
    }

    /// Resolves with the first member's terminal value, resolved or
    /// rejected alike.
    ///
    /// The combined promise never rejects on its own; a fast rejection wins
    /// just like a fast resolution and is delivered as the resolved
    /// `Err(_)` settlement.
    ///
    /// # Errors
    /// [`Error::Configuration`] for an empty input (it could never settle),
    /// [`Error::Context`] if no scheduler context is active.
    pub fn any(promises: Vec<Promise<T>>) -> Result<Promise<Result<T, Error>>, Error> {
        if promises.is_empty() {
            return Err(Error::Configuration(
                "Promise::any needs at least one promise; an empty set can never settle".into(),
            ));
        }

        let first = Promise::pending();
        let settler = Settler {
            promise: first.clone(),
        };

        crate::task::spawn(
            move || match promises.iter().find_map(Promise::settlement) {
                Some(settlement) => PollState::Ready(settlement),
                None => PollState::Pending,
            },
            move |outcome| match outcome {
                Ok(settlement) => settler.resolve(settlement),
                Err(error) => settler.reject(error),
            },
        )?;

        Ok(first)
    }
}

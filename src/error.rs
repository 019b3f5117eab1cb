//! Error types raised by the scheduler and promise machinery.
//!
//! The whole crate reports failures through a single [`Error`] enum. Three of
//! the variants belong to the core: [`Error::Configuration`] for malformed
//! arguments, [`Error::Context`] for operations that need an active scheduler
//! context when none is active, and [`Error::UnhandledRejection`] for a
//! promise that rejects with nobody listening. The fourth variant,
//! [`Error::Failure`], is the carrier for user code: predicates, executors,
//! and `then` continuations report their own failures as `Failure` values
//! (or any other variant they already hold).

/// Crate-wide error type.
///
/// Cloneable and comparable so tests can assert on exact failure values, and
/// so a rejection payload can be both stored in a promise and handed to every
/// `catch` continuation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An argument had an invalid shape: an empty promise set given to
    /// `Promise::any`, or a scope body returning a promise that nothing can
    /// ever settle.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A task or promise combinator was registered while no scheduler
    /// context was active on this thread.
    #[error("context error: {0}")]
    Context(String),

    /// A promise rejected while it had no `catch` continuation registered.
    /// Wraps the rejection payload.
    #[error("unhandled promise rejection: {0}")]
    UnhandledRejection(Box<Error>),

    /// A failure raised by user code: a polled predicate, a promise
    /// executor, or a continuation.
    #[error("{0}")]
    Failure(String),
}

impl Error {
    /// Builds a [`Error::Failure`] from anything stringy.
    ///
    /// This is the conventional way for predicates and executors to raise:
    ///
    /// ```ignore
    /// PollState::Failed(Error::failure("disk on fire"))
    /// ```
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

//! Fluent builder for Context construction.
//!
//! Provides a builder pattern interface for creating and configuring
//! scheduler context instances.

use crate::scheduler::Context;

use std::time::Duration;

/// Pause between two sweeps of a non-empty task list when not configured.
pub(crate) const DEFAULT_TICK: Duration = Duration::from_micros(100);

/// Builder for constructing [`Context`] instances with a fluent API.
///
/// # Example
/// ```ignore
/// let context = ContextBuilder::new()
///     .tick(Duration::from_millis(1))
///     .build();
/// ```
pub struct ContextBuilder {
    tick: Duration,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    /// Creates a new context builder with the default tick.
    pub fn new() -> Self {
        Self { tick: DEFAULT_TICK }
    }

    /// Sets the pause inserted between two sweeps of a non-empty task list.
    ///
    /// A longer tick trades completion latency for idle CPU; zero restores
    /// a pure busy loop.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Builds and returns a configured [`Context`] instance.
    pub fn build(self) -> Context {
        Context::with_tick(self.tick)
    }
}

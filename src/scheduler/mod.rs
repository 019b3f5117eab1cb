//! Scheduler subsystem modules.

mod builder;
mod context;

pub use builder::ContextBuilder;
pub use context::{Context, RunResult, block_on};

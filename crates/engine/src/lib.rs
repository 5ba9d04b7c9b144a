//! Run orchestration: context assembly, evaluation, risk filtering, and
//! the persistence handoff.

pub mod context;
pub mod runner;

pub use context::ContextBuilder;
pub use runner::{RunOutcome, RunSummary, Runner, ValidationReport};

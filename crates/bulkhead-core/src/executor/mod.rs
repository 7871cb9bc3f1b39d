//! Bounded workflow execution
//!
//! [`WorkflowExecutor`] fans out independent asynchronous work items under a
//! concurrency cap, with per-item and overall timeouts, progress callbacks,
//! retry with exponential backoff, and batched execution for very large item
//! sets. Work items are arbitrary futures; in practice each one acquires a
//! rate-limit token and issues its network call through the connection pool,
//! but the executor depends on neither.

mod config;
mod outcome;
mod runner;

#[cfg(test)]
mod tests;

pub use config::{ExecutorConfig, ProgressCallback};
pub use outcome::{TaskOutcome, WorkflowResult, WorkflowSummary};
pub use runner::WorkflowExecutor;

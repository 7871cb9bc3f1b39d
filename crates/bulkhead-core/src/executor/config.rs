//! Executor configuration

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked as work items complete: message and percent complete
pub type ProgressCallback = Arc<dyn Fn(&str, f64) + Send + Sync>;

/// Configuration for [`crate::executor::WorkflowExecutor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Concurrency cap used by `run_parallel` when no explicit limit is given
    pub max_concurrent: usize,

    /// Timeout applied to every individual work item
    #[serde(default, with = "humantime_serde")]
    pub task_timeout: Option<Duration>,

    /// Abort the whole run on the first failed item instead of isolating it
    #[serde(default)]
    pub stop_on_error: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            task_timeout: None,
            stop_on_error: false,
        }
    }
}

impl ExecutorConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default concurrency cap
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the per-item timeout
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Enable fail-fast mode
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }
}

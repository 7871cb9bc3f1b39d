//! Work item outcomes and the aggregate run result

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// The result of one work item
///
/// Owned by the run that produced it and immutable once constructed. The
/// output is present iff the item succeeded; the error string iff it failed.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome<T> {
    pub id: String,
    pub success: bool,
    pub output: Option<T>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl<T> TaskOutcome<T> {
    /// Record a successful item
    pub fn ok(
        id: impl Into<String>,
        output: T,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            success: true,
            output: Some(output),
            error: None,
            started_at,
            finished_at: Utc::now(),
            duration,
        }
    }

    /// Record a failed item
    pub fn failed(
        id: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            started_at,
            finished_at: Utc::now(),
            duration,
        }
    }
}

/// Aggregate of one executor run
///
/// Outcomes are ordered by completion, not submission. `outcomes.len()` can
/// be less than `total_tasks` only when an overall timeout truncated the run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult<T> {
    pub total_tasks: usize,
    pub successful: usize,
    pub failed: usize,
    pub outcomes: Vec<TaskOutcome<T>>,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    /// Stringified errors of every failed outcome, in completion order
    pub errors: Vec<String>,
}

impl<T> WorkflowResult<T> {
    /// Build the aggregate from collected outcomes
    pub fn from_outcomes(
        total_tasks: usize,
        outcomes: Vec<TaskOutcome<T>>,
        total_duration: Duration,
    ) -> Self {
        let successful = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - successful;
        let errors = outcomes.iter().filter_map(|o| o.error.clone()).collect();
        Self {
            total_tasks,
            successful,
            failed,
            outcomes,
            total_duration,
            errors,
        }
    }

    /// Percentage of items that succeeded, 0 for an empty run
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_tasks as f64) * 100.0
        }
    }

    /// Whether every submitted item succeeded
    pub fn all_succeeded(&self) -> bool {
        self.successful == self.total_tasks
    }

    /// Whether any collected outcome failed
    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    /// The externally-visible summary form
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            total_tasks: self.total_tasks,
            successful: self.successful,
            failed: self.failed,
            success_rate: self.success_rate(),
            total_duration: self.total_duration,
            errors: self.errors.clone(),
        }
    }
}

/// Serializable summary of a run, without the per-item outcomes
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub total_tasks: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    pub errors: Vec<String>,
}

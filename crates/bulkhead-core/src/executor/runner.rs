//! The bounded workflow executor

use super::config::{ExecutorConfig, ProgressCallback};
use super::outcome::{TaskOutcome, WorkflowResult};
use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::error::{BulkheadError, BulkheadResult};
use chrono::Utc;
use futures::future::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at};
use tracing::{debug, warn};

/// Orchestrates N independent asynchronous work items under a concurrency cap
///
/// Items are fanned out concurrently, never sequentially; a counting
/// semaphore bounds how many run at once. Each item's failure is isolated
/// into its [`TaskOutcome`] unless fail-fast mode is configured.
pub struct WorkflowExecutor {
    config: ExecutorConfig,
    progress: Option<ProgressCallback>,
}

impl WorkflowExecutor {
    /// Create an executor with default configuration
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Create an executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Attach a progress callback
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Attach a progress callback from a plain closure
    pub fn on_progress<F>(self, f: F) -> Self
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.with_progress(Arc::new(f))
    }

    /// Get the configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run all items under a shared concurrency limit
    ///
    /// Every item is spawned up front (fan-out) and joined in completion
    /// order (fan-in). An elapsed `overall_timeout` cancels the items that
    /// have not reached a terminal state and builds the result from those
    /// that have; it is a truncation, never an error. With `stop_on_error`
    /// configured, the first failed item cancels all still-pending siblings,
    /// waits for their cancellation, and aborts the run with
    /// [`BulkheadError::Aborted`].
    pub async fn run_with_limit<T, Fut>(
        &self,
        tasks: Vec<Fut>,
        ids: Option<Vec<String>>,
        max_concurrent: usize,
        overall_timeout: Option<Duration>,
    ) -> BulkheadResult<WorkflowResult<T>>
    where
        T: Send + 'static,
        Fut: Future<Output = BulkheadResult<T>> + Send + 'static,
    {
        if max_concurrent == 0 {
            return Err(BulkheadError::config("max_concurrent must be at least 1"));
        }
        let total = tasks.len();
        let ids = match ids {
            Some(ids) if ids.len() != total => {
                return Err(BulkheadError::config(format!(
                    "got {} ids for {} tasks",
                    ids.len(),
                    total
                )));
            }
            Some(ids) => ids,
            None => (0..total).map(|i| format!("task-{}", i)).collect(),
        };

        debug!(
            "running {} task(s) with concurrency {} (overall timeout {:?})",
            total, max_concurrent, overall_timeout
        );

        let run_start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let completed = Arc::new(Mutex::new(0usize));
        let mut set: JoinSet<TaskOutcome<T>> = JoinSet::new();

        for (id, task) in ids.into_iter().zip(tasks) {
            let semaphore = semaphore.clone();
            let completed = completed.clone();
            let progress = self.progress.clone();
            let task_timeout = self.config.task_timeout;

            set.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                let started_at = Utc::now();
                let start = Instant::now();
                if permit.is_err() {
                    // Only possible while the run is being torn down
                    return TaskOutcome::failed(
                        id,
                        "concurrency limiter closed",
                        started_at,
                        start.elapsed(),
                    );
                }

                let result = AssertUnwindSafe(async {
                    match task_timeout {
                        Some(limit) => match timeout(limit, task).await {
                            Ok(result) => result,
                            Err(_) => Err(BulkheadError::timeout(format!(
                                "task timed out after {:.1}s",
                                limit.as_secs_f64()
                            ))),
                        },
                        None => task.await,
                    }
                })
                .catch_unwind()
                .await;

                let duration = start.elapsed();
                let outcome = match result {
                    Ok(Ok(output)) => TaskOutcome::ok(id, output, started_at, duration),
                    Ok(Err(err)) => TaskOutcome::failed(id, err.to_string(), started_at, duration),
                    Err(_) => TaskOutcome::failed(id, "task panicked", started_at, duration),
                };

                let done = {
                    let mut completed = completed.lock();
                    *completed += 1;
                    *completed
                };
                if let Some(callback) = progress {
                    callback(
                        &format!("completed {} of {}", done, total),
                        (done as f64 / total as f64) * 100.0,
                    );
                }

                outcome
            });
        }

        let deadline = overall_timeout.map(|t| tokio::time::Instant::now() + t);
        let mut outcomes: Vec<TaskOutcome<T>> = Vec::with_capacity(total);

        while !set.is_empty() {
            let joined = match deadline {
                Some(deadline) => match timeout_at(deadline, set.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            "overall timeout hit with {} of {} task(s) finished; cancelling the rest",
                            outcomes.len(),
                            total
                        );
                        set.abort_all();
                        while set.join_next().await.is_some() {}
                        break;
                    }
                },
                None => set.join_next().await,
            };

            let Some(joined) = joined else { break };
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    if !err.is_cancelled() {
                        warn!("joining a task failed: {}", err);
                    }
                    continue;
                }
            };

            if self.config.stop_on_error && !outcome.success {
                let abort = BulkheadError::Aborted {
                    id: outcome.id.clone(),
                    message: outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "task failed".to_string()),
                    completed: outcomes.len(),
                };
                warn!(
                    "task '{}' failed with stop_on_error set; cancelling {} in-flight sibling(s)",
                    outcome.id,
                    set.len()
                );
                set.abort_all();
                // Wait until every cancelled sibling has actually stopped
                while set.join_next().await.is_some() {}
                return Err(abort);
            }

            outcomes.push(outcome);
        }

        Ok(WorkflowResult::from_outcomes(
            total,
            outcomes,
            run_start.elapsed(),
        ))
    }

    /// Run all items under the configured concurrency cap
    pub async fn run_parallel<T, Fut>(
        &self,
        tasks: Vec<Fut>,
        ids: Option<Vec<String>>,
    ) -> BulkheadResult<WorkflowResult<T>>
    where
        T: Send + 'static,
        Fut: Future<Output = BulkheadResult<T>> + Send + 'static,
    {
        self.run_with_limit(tasks, ids, self.config.max_concurrent, None)
            .await
    }

    /// Run items one at a time
    pub async fn run_sequential<T, Fut>(
        &self,
        tasks: Vec<Fut>,
        ids: Option<Vec<String>>,
    ) -> BulkheadResult<WorkflowResult<T>>
    where
        T: Send + 'static,
        Fut: Future<Output = BulkheadResult<T>> + Send + 'static,
    {
        self.run_with_limit(tasks, ids, 1, None).await
    }

    /// Run a large item collection in fixed-size chunks
    ///
    /// Each chunk goes through [`WorkflowExecutor::run_with_limit`]; outcomes,
    /// errors, and durations are concatenated, and cumulative progress is
    /// reported after each chunk. Chunking caps peak pressure on the rate
    /// limiter and the connection pool.
    pub async fn run_batched<I, T, P, Fut>(
        &self,
        items: Vec<I>,
        processor: P,
        batch_size: usize,
        max_concurrent: usize,
    ) -> BulkheadResult<WorkflowResult<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        P: Fn(I) -> Fut,
        Fut: Future<Output = BulkheadResult<T>> + Send + 'static,
    {
        if batch_size == 0 {
            return Err(BulkheadError::config("batch_size must be at least 1"));
        }

        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut total_duration = Duration::ZERO;
        let mut processed = 0usize;
        let mut next_index = 0usize;
        let mut items = items.into_iter();

        loop {
            let chunk: Vec<I> = items.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }

            let ids: Vec<String> = (next_index..next_index + chunk.len())
                .map(|i| format!("item-{}", i))
                .collect();
            next_index += chunk.len();

            let tasks: Vec<Fut> = chunk.into_iter().map(&processor).collect();
            let result = self
                .run_with_limit(tasks, Some(ids), max_concurrent, None)
                .await?;

            processed += result.outcomes.len();
            total_duration += result.total_duration;
            outcomes.extend(result.outcomes);

            if let Some(callback) = &self.progress {
                callback(
                    &format!("processed {} of {} items", processed, total),
                    (processed as f64 / total as f64) * 100.0,
                );
            }
        }

        Ok(WorkflowResult::from_outcomes(total, outcomes, total_duration))
    }

    /// Drive one item through up to `max_retries` additional attempts
    ///
    /// Delay between attempts grows as `retry_delay * multiplier^attempt`,
    /// with no jitter so the schedule is exact. Succeeds as soon as any
    /// attempt succeeds; the returned outcome describes the final attempt.
    pub async fn run_with_retry<T, F, Fut>(
        &self,
        task_fn: F,
        id: &str,
        max_retries: u32,
        retry_delay: Duration,
        backoff_multiplier: f64,
    ) -> TaskOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BulkheadResult<T>>,
    {
        let backoff = ExponentialBackoff::with_config(BackoffConfig {
            initial_delay: retry_delay,
            max_delay: Duration::from_secs(3600),
            multiplier: backoff_multiplier,
            jitter: false,
            jitter_ratio: 0.0,
        });

        let mut attempt = 0u32;
        loop {
            let started_at = Utc::now();
            let start = Instant::now();

            let result = match self.config.task_timeout {
                Some(limit) => match timeout(limit, task_fn()).await {
                    Ok(result) => result,
                    Err(_) => Err(BulkheadError::timeout(format!(
                        "task timed out after {:.1}s",
                        limit.as_secs_f64()
                    ))),
                },
                None => task_fn().await,
            };

            match result {
                Ok(output) => {
                    if attempt > 0 {
                        debug!("task '{}' succeeded on attempt {}", id, attempt + 1);
                    }
                    return TaskOutcome::ok(id, output, started_at, start.elapsed());
                }
                Err(err) => {
                    if attempt >= max_retries {
                        warn!(
                            "task '{}' failed after {} attempt(s): {}",
                            id,
                            attempt + 1,
                            err
                        );
                        return TaskOutcome::failed(id, err.to_string(), started_at, start.elapsed());
                    }
                    let delay = backoff.delay_for_attempt(attempt);
                    warn!(
                        "task '{}' attempt {} failed: {}; retrying in {:.2}s",
                        id,
                        attempt + 1,
                        err,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self::new()
    }
}

use super::*;
use crate::error::{BulkheadError, BulkheadResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared counter probe observing how many tasks run at the same instant
#[derive(Default)]
struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

async fn tracked_task(probe: Arc<ConcurrencyProbe>, delay: Duration) -> BulkheadResult<()> {
    let now = probe.current.fetch_add(1, Ordering::SeqCst) + 1;
    probe.max.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(delay).await;
    probe.current.fetch_sub(1, Ordering::SeqCst);
    Ok(())
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let executor = WorkflowExecutor::new();
    let probe = Arc::new(ConcurrencyProbe::default());

    let tasks: Vec<_> = (0..5)
        .map(|_| tracked_task(probe.clone(), Duration::from_millis(100)))
        .collect();

    let start = Instant::now();
    let result = executor.run_with_limit(tasks, None, 2, None).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result.total_tasks, 5);
    assert_eq!(result.successful, 5);
    assert!(result.all_succeeded());
    assert!(probe.max.load(Ordering::SeqCst) <= 2);

    // ceil(5/2) waves of 100ms each
    assert!(elapsed >= Duration::from_millis(280), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_failures_are_isolated_per_item() {
    let executor = WorkflowExecutor::new();

    let tasks: Vec<_> = (0..6)
        .map(|i| async move {
            if i % 2 == 0 {
                Ok(i)
            } else {
                Err(BulkheadError::task(format!("task-{}", i), "upstream refused"))
            }
        })
        .collect();

    let result = executor.run_parallel(tasks, None).await.unwrap();

    assert_eq!(result.total_tasks, 6);
    assert_eq!(result.successful + result.failed, result.outcomes.len());
    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 3);
    assert_eq!(result.errors.len(), 3);
    assert!(result.any_failed());
    assert!(!result.all_succeeded());
    assert!((result.success_rate() - 50.0).abs() < 0.01);
}

#[tokio::test]
async fn test_default_and_custom_ids() {
    let executor = WorkflowExecutor::new();

    let tasks: Vec<_> = (0..3).map(|i| async move { Ok(i) }).collect();
    let result = executor.run_parallel(tasks, None).await.unwrap();
    let mut ids: Vec<_> = result.outcomes.iter().map(|o| o.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["task-0", "task-1", "task-2"]);

    let tasks: Vec<_> = (0..2).map(|i| async move { Ok(i) }).collect();
    let mismatched = executor
        .run_parallel(tasks, Some(vec!["only-one".to_string()]))
        .await;
    assert!(matches!(mismatched, Err(BulkheadError::Config { .. })));
}

#[tokio::test]
async fn test_zero_concurrency_rejected() {
    let executor = WorkflowExecutor::new();
    let tasks: Vec<_> = (0..2).map(|i| async move { Ok(i) }).collect();
    let result = executor.run_with_limit(tasks, None, 0, None).await;
    assert!(matches!(result, Err(BulkheadError::Config { .. })));
}

#[tokio::test]
async fn test_empty_run() {
    let executor = WorkflowExecutor::new();
    let tasks: Vec<futures::future::Ready<BulkheadResult<()>>> = Vec::new();
    let result = executor.run_parallel(tasks, None).await.unwrap();

    assert_eq!(result.total_tasks, 0);
    assert_eq!(result.success_rate(), 0.0);
    assert!(result.all_succeeded());
    assert!(!result.any_failed());
}

#[tokio::test]
async fn test_overall_timeout_truncates_instead_of_failing() {
    let executor = WorkflowExecutor::new();

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let delay = if i < 2 {
                Duration::from_millis(10)
            } else {
                Duration::from_secs(10)
            };
            async move {
                tokio::time::sleep(delay).await;
                Ok(i)
            }
        })
        .collect();

    let start = Instant::now();
    let result = executor
        .run_with_limit(tasks, None, 4, Some(Duration::from_millis(200)))
        .await
        .unwrap();

    // The run ends at the timeout, not after the slow tasks
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(result.total_tasks, 4);
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.successful, 2);
    assert!(result.successful + result.failed <= result.total_tasks);
}

#[tokio::test]
async fn test_per_item_timeout_becomes_failed_outcome() {
    let executor =
        WorkflowExecutor::with_config(ExecutorConfig::new().with_task_timeout(Duration::from_millis(50)));

    let tasks = vec![async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }];

    let result = executor.run_parallel(tasks, None).await.unwrap();

    assert_eq!(result.failed, 1);
    assert!(result.errors[0].contains("timed out"));
}

#[tokio::test]
async fn test_stop_on_error_cancels_pending_siblings() {
    let executor = WorkflowExecutor::with_config(ExecutorConfig::new().with_stop_on_error(true));
    let finished = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let finished = finished.clone();
            async move {
                if i == 0 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err(BulkheadError::task("task-0", "fatal"))
                } else {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                }
            }
        })
        .collect();

    let start = Instant::now();
    let result = executor.run_with_limit(tasks, None, 4, None).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(BulkheadError::Aborted { .. })));
    // Siblings were cancelled, not awaited to completion
    assert!(elapsed < Duration::from_secs(2), "elapsed {:?}", elapsed);
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sequential_runs_one_at_a_time() {
    let executor = WorkflowExecutor::new();
    let probe = Arc::new(ConcurrencyProbe::default());

    let tasks: Vec<_> = (0..3)
        .map(|_| tracked_task(probe.clone(), Duration::from_millis(50)))
        .collect();

    let start = Instant::now();
    let result = executor.run_sequential(tasks, None).await.unwrap();

    assert_eq!(result.successful, 3);
    assert_eq!(probe.max.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_progress_callback_reports_completion() {
    let reports: Arc<Mutex<Vec<(String, f64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();

    let executor = WorkflowExecutor::new()
        .on_progress(move |message, pct| sink.lock().push((message.to_string(), pct)));

    let tasks: Vec<_> = (0..3).map(|i| async move { Ok(i) }).collect();
    executor.run_parallel(tasks, None).await.unwrap();

    let reports = reports.lock();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].0, "completed 1 of 3");
    assert_eq!(reports[2].0, "completed 3 of 3");
    assert!((reports[2].1 - 100.0).abs() < 0.01);
}

#[tokio::test]
async fn test_panicking_task_is_recorded_not_fatal() {
    let executor = WorkflowExecutor::new();

    let tasks: Vec<_> = (0..3)
        .map(|i| async move {
            if i == 1 {
                panic!("boom");
            }
            Ok(i)
        })
        .collect();

    let result = executor.run_parallel(tasks, None).await.unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    let panicked = result.outcomes.iter().find(|o| !o.success).unwrap();
    assert_eq!(panicked.error.as_deref(), Some("task panicked"));
}

#[tokio::test]
async fn test_run_batched_covers_every_item() {
    let reports: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();

    let executor =
        WorkflowExecutor::new().on_progress(move |message, _| sink.lock().push(message.to_string()));

    let items: Vec<u32> = (0..10).collect();
    let result = executor
        .run_batched(items, |i| async move { Ok(i * 2) }, 3, 2)
        .await
        .unwrap();

    assert_eq!(result.total_tasks, 10);
    assert_eq!(result.outcomes.len(), 10);
    assert!(result.all_succeeded());

    let mut ids: Vec<_> = result.outcomes.iter().map(|o| o.id.clone()).collect();
    ids.sort();
    assert!(ids.contains(&"item-0".to_string()));
    assert!(ids.contains(&"item-9".to_string()));

    let reports = reports.lock();
    assert!(reports.iter().any(|m| m == "processed 10 of 10 items"));
}

#[tokio::test]
async fn test_run_batched_rejects_zero_batch_size() {
    let executor = WorkflowExecutor::new();
    let result = executor
        .run_batched(vec![1u32], |i| async move { Ok(i) }, 0, 2)
        .await;
    assert!(matches!(result, Err(BulkheadError::Config { .. })));
}

#[tokio::test]
async fn test_retry_succeeds_after_transient_failures() {
    let executor = WorkflowExecutor::new();
    let attempts = Arc::new(AtomicU32::new(0));

    let start = Instant::now();
    let outcome = executor
        .run_with_retry(
            || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(BulkheadError::other("transient glitch"))
                    } else {
                        Ok(n)
                    }
                }
            },
            "flaky",
            3,
            Duration::from_millis(50),
            2.0,
        )
        .await;
    let elapsed = start.elapsed();

    assert!(outcome.success);
    assert_eq!(outcome.output, Some(2));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // First retry after ~50ms, second after ~100ms
    assert!(elapsed >= Duration::from_millis(150), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(500), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_retry_exhausts_and_reports_last_error() {
    let executor = WorkflowExecutor::new();
    let attempts = Arc::new(AtomicU32::new(0));

    let outcome: TaskOutcome<()> = executor
        .run_with_retry(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(BulkheadError::other("still broken"))
                }
            },
            "doomed",
            2,
            Duration::from_millis(10),
            2.0,
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(outcome.error.as_deref().unwrap().contains("still broken"));
}

#[tokio::test]
async fn test_summary_shape() {
    let executor = WorkflowExecutor::new();
    let tasks: Vec<_> = (0..2)
        .map(|i| async move {
            if i == 0 {
                Ok(i)
            } else {
                Err(BulkheadError::other("nope"))
            }
        })
        .collect();

    let result = executor.run_parallel(tasks, None).await.unwrap();
    let summary = result.summary();

    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);
    assert!((summary.success_rate - 50.0).abs() < 0.01);
    assert_eq!(summary.errors.len(), 1);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["total_tasks"], 2);
}

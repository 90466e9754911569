//! Bounded-concurrency batch execution.
//!
//! Stage executors fan out per-entity work (one task per character image,
//! one per shot clip) through [`BatchExecutor`], which keeps at most `limit`
//! tasks in flight and reports one progress tick per settlement. A task's
//! failure never aborts the batch: callers get a per-task result list,
//! indexed by submission order, and decide their own all-or-nothing policy.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use fabula_core::PipelineError;

/// Runs independent deferred tasks under a concurrency ceiling.
#[derive(Debug, Clone, Copy)]
pub struct BatchExecutor {
    limit: usize,
}

impl BatchExecutor {
    /// Create an executor with the given ceiling. Fails fast on `0`.
    pub fn new(limit: usize) -> Result<Self, PipelineError> {
        if limit == 0 {
            return Err(PipelineError::Validation(
                "batch concurrency limit must be positive".to_string(),
            ));
        }
        Ok(Self { limit })
    }

    /// The configured concurrency ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every factory to settlement.
    ///
    /// Factories are not started until a slot is free; as soon as one task
    /// settles (success or failure) the next pending factory starts. The
    /// progress callback fires once per settlement with a monotonically
    /// increasing completed count and the total; settlement order is
    /// unconstrained, but the returned results are indexed by submission
    /// order. A panicking task settles as an `Internal` error entry.
    ///
    /// Empty input returns immediately without invoking the callback.
    pub async fn run<T, F, Fut>(
        &self,
        factories: Vec<F>,
        mut on_progress: Option<&mut (dyn FnMut(usize, usize))>,
    ) -> Vec<Result<T, PipelineError>>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, PipelineError>> + Send + 'static,
    {
        let total = factories.len();
        if total == 0 {
            return Vec::new();
        }

        let gate = Arc::new(Semaphore::new(self.limit));
        let mut tasks: JoinSet<Result<T, PipelineError>> = JoinSet::new();
        let mut submission_index: HashMap<tokio::task::Id, usize> = HashMap::with_capacity(total);

        for (index, factory) in factories.into_iter().enumerate() {
            let gate = Arc::clone(&gate);
            let handle = tasks.spawn(async move {
                // The semaphore is never closed while tasks hold a clone.
                let _permit = gate
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::Internal("batch gate closed".to_string()))?;
                factory().await
            });
            submission_index.insert(handle.id(), index);
        }

        let mut results: Vec<Option<Result<T, PipelineError>>> = Vec::with_capacity(total);
        results.resize_with(total, || None);
        let mut completed = 0usize;

        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Batch task panicked");
                    (
                        join_err.id(),
                        Err(PipelineError::Internal(format!(
                            "batch task panicked: {join_err}"
                        ))),
                    )
                }
            };

            completed += 1;
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(completed, total);
            }

            if let Some(index) = submission_index.get(&task_id) {
                results[*index] = Some(outcome);
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(PipelineError::Internal("batch task vanished".to_string()))
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_limit_is_rejected() {
        assert!(BatchExecutor::new(0).is_err());
        assert!(BatchExecutor::new(1).is_ok());
    }

    #[tokio::test]
    async fn empty_input_completes_immediately() {
        let executor = BatchExecutor::new(4).unwrap();
        let mut calls = 0usize;
        let factories: Vec<fn() -> std::future::Ready<Result<(), PipelineError>>> = Vec::new();

        let results = executor
            .run(factories, Some(&mut |_, _| calls += 1))
            .await;

        assert!(results.is_empty());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn results_are_indexed_by_submission_order() {
        let executor = BatchExecutor::new(3).unwrap();
        let factories: Vec<_> = (0..5usize)
            .map(|i| {
                move || async move {
                    // Later submissions finish first.
                    tokio::time::sleep(Duration::from_millis(10 * (5 - i) as u64)).await;
                    Ok::<_, PipelineError>(i * 10)
                }
            })
            .collect();

        let results = executor.run(factories, None).await;
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn progress_counts_are_strictly_increasing() {
        let executor = BatchExecutor::new(2).unwrap();
        let factories: Vec<_> = (0..6)
            .map(|i| move || async move { Ok::<_, PipelineError>(i) })
            .collect();

        let mut seen: Vec<(usize, usize)> = Vec::new();
        let results = executor
            .run(factories, Some(&mut |completed, total| {
                seen.push((completed, total))
            }))
            .await;

        assert_eq!(results.len(), 6);
        let counts: Vec<usize> = seen.iter().map(|(c, _)| *c).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 5, 6]);
        assert!(seen.iter().all(|(_, total)| *total == 6));
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let executor = BatchExecutor::new(2).unwrap();
        let factories: Vec<_> = (0..4)
            .map(|i| {
                move || async move {
                    if i % 2 == 0 {
                        Err(PipelineError::Execution(format!("task {i} failed")))
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();

        let mut settlements = 0usize;
        let results = executor
            .run(factories, Some(&mut |_, _| settlements += 1))
            .await;

        // All four settle, failures included.
        assert_eq!(settlements, 4);
        assert!(results[0].is_err());
        assert_eq!(*results[1].as_ref().unwrap(), 1);
        assert!(results[2].is_err());
        assert_eq!(*results[3].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn in_flight_tasks_never_exceed_the_limit() {
        const LIMIT: usize = 3;
        let executor = BatchExecutor::new(LIMIT).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let factories: Vec<_> = (0..12)
            .map(|_| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                move || async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, PipelineError>(())
                }
            })
            .collect();

        let results = executor.run(factories, None).await;
        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= LIMIT);
    }

    #[tokio::test]
    async fn limit_one_runs_tasks_serially() {
        let executor = BatchExecutor::new(1).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let factories: Vec<_> = (0..4)
            .map(|i| {
                let log = Arc::clone(&log);
                move || async move {
                    log.lock().unwrap().push(format!("start {i}"));
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    log.lock().unwrap().push(format!("end {i}"));
                    Ok::<_, PipelineError>(())
                }
            })
            .collect();

        executor.run(factories, None).await;

        // No task starts before the previous one settled.
        let log = log.lock().unwrap();
        for pair in log.chunks(2) {
            assert!(pair[0].starts_with("start"));
            assert!(pair[1].starts_with("end"));
            assert_eq!(pair[0][6..], pair[1][4..]);
        }
    }

    #[tokio::test]
    async fn a_panicking_task_settles_as_an_error() {
        let executor = BatchExecutor::new(2).unwrap();
        let factories: Vec<Box<dyn FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, PipelineError>> + Send>> + Send>> = vec![
            Box::new(|| Box::pin(async { Ok(1) })),
            Box::new(|| Box::pin(async { panic!("boom") })),
            Box::new(|| Box::pin(async { Ok(3) })),
        ];

        let mut settlements = 0usize;
        let results = executor
            .run(factories, Some(&mut |_, _| settlements += 1))
            .await;

        assert_eq!(settlements, 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(PipelineError::Internal(_))));
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }
}

//! Worker loop that drains the queue.
//!
//! The runner polls the queue on a fixed interval with a small pool of
//! identical workers. Workers share nothing but the queue and the
//! processor; concurrency control is the queue's claim semantics
//! (a claimed job is invisible to other workers).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use fabula_core::WorkQueue;

use crate::processor::JobProcessor;

const DEFAULT_WORKERS: usize = 2;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runner tuning, overridable from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub workers: usize,
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl RunnerConfig {
    /// Read `PIPELINE_WORKERS` and `PIPELINE_POLL_INTERVAL_MS`, falling back
    /// to the defaults. Panics on unparseable values, which is the right
    /// behavior at process startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let workers = std::env::var("PIPELINE_WORKERS")
            .map(|v| v.parse().expect("PIPELINE_WORKERS must be a number"))
            .unwrap_or(defaults.workers);
        let poll_interval = std::env::var("PIPELINE_POLL_INTERVAL_MS")
            .map(|v| {
                Duration::from_millis(
                    v.parse().expect("PIPELINE_POLL_INTERVAL_MS must be a number"),
                )
            })
            .unwrap_or(defaults.poll_interval);
        Self {
            workers,
            poll_interval,
        }
    }
}

/// Polling worker pool over a [`WorkQueue`].
pub struct PipelineRunner {
    queue: Arc<dyn WorkQueue>,
    processor: Arc<JobProcessor>,
    config: RunnerConfig,
}

impl PipelineRunner {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        processor: Arc<JobProcessor>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            config,
        }
    }

    /// Run the worker pool until `cancel` fires, then wait for in-flight
    /// jobs to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            workers = self.config.workers,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Pipeline runner starting"
        );

        let mut workers = JoinSet::new();
        for worker in 0..self.config.workers {
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let cancel = cancel.clone();
            let poll_interval = self.config.poll_interval;
            workers.spawn(async move {
                worker_loop(worker, queue, processor, cancel, poll_interval).await;
            });
        }
        while workers.join_next().await.is_some() {}

        tracing::info!("Pipeline runner stopped");
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<dyn WorkQueue>,
    processor: Arc<JobProcessor>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(worker, "Worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                drain(worker, queue.as_ref(), processor.as_ref()).await;
            }
        }
    }
}

/// Claim and process jobs until the queue has nothing ready.
async fn drain(worker: usize, queue: &dyn WorkQueue, processor: &JobProcessor) {
    loop {
        let delivery = match queue.claim().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(worker, error = %e, "Failed to claim job");
                break;
            }
        };

        let job_id = delivery.payload.job_id.clone();
        match processor.handle(&delivery).await {
            Ok(()) => {
                if let Err(e) = queue.complete(&job_id).await {
                    tracing::error!(worker, job_id = %job_id, error = %e, "Failed to complete job");
                }
            }
            Err(e) => {
                if let Err(qe) = queue.fail(&job_id, &e.to_string()).await {
                    tracing::error!(worker, job_id = %job_id, error = %qe, "Failed to report job failure");
                }
            }
        }
    }
}

//! Durable work queue seam.
//!
//! The queue provides at-least-once delivery with attempt counting and
//! backoff; its internal delivery mechanics (locking, leader election,
//! persistence) belong to the implementation. The engine only polls: claim a
//! delivery, run it, then `complete` or `fail` it.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::job::JobPayload;
use crate::retry::{BASE_BACKOFF_SECS, DEFAULT_MAX_ATTEMPTS};

/// Retry parameters attached to a job at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Delivery attempts before the job is parked as dead.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub base_backoff: Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_secs(BASE_BACKOFF_SECS),
        }
    }
}

/// A claimed job delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: JobPayload,
    /// 1-based delivery attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
}

/// At-least-once durable work queue.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a job. Errors must propagate to the caller — a submission
    /// that silently vanishes would stall the project lane.
    async fn enqueue(
        &self,
        payload: JobPayload,
        opts: EnqueueOptions,
    ) -> Result<(), PipelineError>;

    /// Remove still-pending jobs with the given logical key, returning how
    /// many were removed. In-flight deliveries are not affected.
    async fn remove(&self, job_key: &str) -> Result<u64, PipelineError>;

    /// Claim the next due delivery, if any. The claimed job stays invisible
    /// to other workers until completed or failed.
    async fn claim(&self) -> Result<Option<Delivery>, PipelineError>;

    /// Acknowledge a delivery as done; the job leaves the queue.
    async fn complete(&self, job_id: &str) -> Result<(), PipelineError>;

    /// Report a failed attempt. While attempts remain the queue reschedules
    /// the job after its backoff delay; otherwise it parks the job as dead,
    /// retaining `error`.
    async fn fail(&self, job_id: &str, error: &str) -> Result<(), PipelineError>;
}

//! Row model for the `pipeline_jobs` durable queue table.

use sqlx::FromRow;

use fabula_core::queue::Delivery;
use fabula_core::types::{DbId, Timestamp};
use fabula_core::{JobPayload, PipelineError};

/// Queue row status: waiting for its `available_at` to pass.
pub const JOB_PENDING: &str = "pending";

/// Queue row status: claimed by a worker, invisible to others.
pub const JOB_RUNNING: &str = "running";

/// Queue row status: attempts exhausted; kept for operator inspection.
pub const JOB_DEAD: &str = "dead";

/// A row from `pipeline_jobs`.
#[derive(Debug, Clone, FromRow)]
pub struct QueuedJobRow {
    pub id: DbId,
    pub job_id: String,
    pub job_key: String,
    pub payload: serde_json::Value,
    pub status: String,
    /// Completed delivery attempts (incremented on claim).
    pub attempt: i32,
    pub max_attempts: i32,
    pub base_backoff_secs: i64,
    pub available_at: Timestamp,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl QueuedJobRow {
    /// Decode a claimed row into a delivery handed to the processor.
    pub fn into_delivery(self) -> Result<Delivery, PipelineError> {
        let payload: JobPayload = serde_json::from_value(self.payload)
            .map_err(|e| PipelineError::Queue(format!("corrupt payload for {}: {e}", self.job_id)))?;
        Ok(Delivery {
            payload,
            attempt: self.attempt.max(0) as u32,
            max_attempts: self.max_attempts.max(0) as u32,
        })
    }
}

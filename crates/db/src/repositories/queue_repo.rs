//! Postgres-backed durable work queue over the `pipeline_jobs` table.
//!
//! At-least-once delivery: claiming uses `SELECT FOR UPDATE SKIP LOCKED` to
//! prevent double-dispatch across workers, `available_at` gates exponential
//! backoff between attempts, and a crashed worker's claim is recovered by the
//! operator re-running the stage (see `Orchestrator::restart_from`).

use async_trait::async_trait;
use sqlx::PgPool;

use fabula_core::queue::{Delivery, EnqueueOptions, WorkQueue};
use fabula_core::retry::backoff_delay;
use fabula_core::{JobPayload, PipelineError};

use crate::models::queued_job::{QueuedJobRow, JOB_DEAD, JOB_PENDING, JOB_RUNNING};

/// Column list for `pipeline_jobs` queries.
const COLUMNS: &str = "\
    id, job_id, job_key, payload, status, attempt, max_attempts, \
    base_backoff_secs, available_at, last_error, created_at, updated_at";

/// Provides queue operations over `pipeline_jobs`.
pub struct QueueRepo;

impl QueueRepo {
    /// Insert a new pending job, immediately available.
    pub async fn enqueue(
        pool: &PgPool,
        job_id: &str,
        job_key: &str,
        payload: &serde_json::Value,
        max_attempts: u32,
        base_backoff_secs: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO pipeline_jobs \
                 (job_id, job_key, payload, status, attempt, max_attempts, \
                  base_backoff_secs, available_at) \
             VALUES ($1, $2, $3, $4, 0, $5, $6, NOW())",
        )
        .bind(job_id)
        .bind(job_key)
        .bind(payload)
        .bind(JOB_PENDING)
        .bind(max_attempts as i32)
        .bind(base_backoff_secs as i64)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete still-pending jobs with the given logical key.
    pub async fn remove_pending(pool: &PgPool, job_key: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pipeline_jobs WHERE job_key = $1 AND status = $2",
        )
        .bind(job_key)
        .bind(JOB_PENDING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Atomically claim the next due pending job.
    ///
    /// Increments `attempt` as part of the claim, so the returned row
    /// carries the 1-based attempt number of the delivery being made.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<QueuedJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE pipeline_jobs \
             SET status = $1, attempt = attempt + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM pipeline_jobs \
                 WHERE status = $2 AND available_at <= NOW() \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueuedJobRow>(&query)
            .bind(JOB_RUNNING)
            .bind(JOB_PENDING)
            .fetch_optional(pool)
            .await
    }

    /// Remove a completed job.
    pub async fn complete(pool: &PgPool, job_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM pipeline_jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Reschedule a failed job with its backoff delay, or park it as dead
    /// once attempts are exhausted.
    pub async fn fail(pool: &PgPool, job_id: &str, error: &str) -> Result<(), sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pipeline_jobs WHERE job_id = $1");
        let Some(row) = sqlx::query_as::<_, QueuedJobRow>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await?
        else {
            return Ok(());
        };

        if row.attempt >= row.max_attempts {
            sqlx::query(
                "UPDATE pipeline_jobs \
                 SET status = $2, last_error = $3, updated_at = NOW() \
                 WHERE job_id = $1",
            )
            .bind(job_id)
            .bind(JOB_DEAD)
            .bind(error)
            .execute(pool)
            .await?;
            tracing::warn!(job_id, error, "Job exhausted its attempts");
            return Ok(());
        }

        let delay = backoff_delay(
            row.attempt.max(0) as u32,
            std::time::Duration::from_secs(row.base_backoff_secs.max(0) as u64),
        );
        sqlx::query(
            "UPDATE pipeline_jobs \
             SET status = $2, last_error = $3, \
                 available_at = NOW() + make_interval(secs => $4), \
                 updated_at = NOW() \
             WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(JOB_PENDING)
        .bind(error)
        .bind(delay.as_secs() as f64)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// [`WorkQueue`] backed by [`QueueRepo`].
pub struct PgWorkQueue {
    pool: PgPool,
}

impl PgWorkQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn enqueue(
        &self,
        payload: JobPayload,
        opts: EnqueueOptions,
    ) -> Result<(), PipelineError> {
        let body = serde_json::to_value(&payload)
            .map_err(|e| PipelineError::Queue(format!("unserializable payload: {e}")))?;
        QueueRepo::enqueue(
            &self.pool,
            &payload.job_id,
            &payload.job_key(),
            &body,
            opts.max_attempts,
            opts.base_backoff.as_secs(),
        )
        .await
        .map_err(PipelineError::queue)
    }

    async fn remove(&self, job_key: &str) -> Result<u64, PipelineError> {
        QueueRepo::remove_pending(&self.pool, job_key)
            .await
            .map_err(PipelineError::queue)
    }

    async fn claim(&self) -> Result<Option<Delivery>, PipelineError> {
        let row = QueueRepo::claim_next(&self.pool)
            .await
            .map_err(PipelineError::queue)?;
        row.map(QueuedJobRow::into_delivery).transpose()
    }

    async fn complete(&self, job_id: &str) -> Result<(), PipelineError> {
        QueueRepo::complete(&self.pool, job_id)
            .await
            .map_err(PipelineError::queue)
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<(), PipelineError> {
        QueueRepo::fail(&self.pool, job_id, error)
            .await
            .map_err(PipelineError::queue)
    }
}

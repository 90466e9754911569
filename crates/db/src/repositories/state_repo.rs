//! Repository for the `pipeline_state` table.
//!
//! One row per project. `set_status` upserts; `complete` is a compare-and-set
//! so the terminal completion event can be emitted exactly once even when the
//! final stage is redelivered.

use async_trait::async_trait;
use sqlx::PgPool;

use fabula_core::status::{PipelineStatus, ProjectPipelineState};
use fabula_core::step::PipelineStep;
use fabula_core::types::DbId;
use fabula_core::{PipelineError, StateStore};

use crate::models::pipeline_state::PipelineStateRow;

/// Column list for `pipeline_state` queries.
const COLUMNS: &str = "project_id, current_step, status, last_error, updated_at";

/// Provides CRUD operations for per-project pipeline state.
pub struct StateRepo;

impl StateRepo {
    /// Fetch a project's state row, if it has one.
    pub async fn find(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Option<PipelineStateRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pipeline_state WHERE project_id = $1");
        sqlx::query_as::<_, PipelineStateRow>(&query)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Upsert the state row with a new current step and status.
    pub async fn set_status(
        pool: &PgPool,
        project_id: DbId,
        step: PipelineStep,
        status: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO pipeline_state (project_id, current_step, status, updated_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (project_id) DO UPDATE \
             SET current_step = $2, status = $3, updated_at = NOW()",
        )
        .bind(project_id)
        .bind(step.as_str())
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition to `completed` unless already completed.
    ///
    /// Returns `true` when this call performed the transition.
    pub async fn complete(pool: &PgPool, project_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pipeline_state \
             SET status = 'completed', updated_at = NOW() \
             WHERE project_id = $1 AND status <> 'completed'",
        )
        .bind(project_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition to `failed`, retaining the last error text.
    pub async fn record_failure(
        pool: &PgPool,
        project_id: DbId,
        step: PipelineStep,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO pipeline_state (project_id, current_step, status, last_error, updated_at) \
             VALUES ($1, $2, 'failed', $3, NOW()) \
             ON CONFLICT (project_id) DO UPDATE \
             SET current_step = $2, status = 'failed', last_error = $3, updated_at = NOW()",
        )
        .bind(project_id)
        .bind(step.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// [`StateStore`] backed by [`StateRepo`].
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn get(&self, project_id: DbId) -> Result<Option<ProjectPipelineState>, PipelineError> {
        let row = StateRepo::find(&self.pool, project_id)
            .await
            .map_err(PipelineError::storage)?;
        row.map(PipelineStateRow::decode).transpose()
    }

    async fn set_status(
        &self,
        project_id: DbId,
        step: PipelineStep,
        status: PipelineStatus,
    ) -> Result<(), PipelineError> {
        StateRepo::set_status(&self.pool, project_id, step, &status.encode())
            .await
            .map_err(PipelineError::storage)
    }

    async fn complete(&self, project_id: DbId) -> Result<bool, PipelineError> {
        StateRepo::complete(&self.pool, project_id)
            .await
            .map_err(PipelineError::storage)
    }

    async fn record_failure(
        &self,
        project_id: DbId,
        step: PipelineStep,
        error: &str,
    ) -> Result<(), PipelineError> {
        StateRepo::record_failure(&self.pool, project_id, step, error)
            .await
            .map_err(PipelineError::storage)
    }
}

//! Persisted state and artifact storage seams.
//!
//! One `ProjectPipelineState` row per project is the engine's only required
//! persistence; artifact rows live with the generation services and the
//! engine only ever deletes them (pre-execution clearing and restarts).

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::status::{PipelineStatus, ProjectPipelineState};
use crate::step::{ArtifactKind, PipelineStep};
use crate::types::DbId;

/// Store for the per-project pipeline state row.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch a project's pipeline state, if it has entered the pipeline.
    async fn get(&self, project_id: DbId) -> Result<Option<ProjectPipelineState>, PipelineError>;

    /// Upsert the state row with a new current step and status. Only the job
    /// processor calls this with processing / review values.
    async fn set_status(
        &self,
        project_id: DbId,
        step: PipelineStep,
        status: PipelineStatus,
    ) -> Result<(), PipelineError>;

    /// Transition to `completed` if not already completed. Returns whether
    /// the transition happened, so the terminal completion event can be
    /// emitted exactly once even under redelivery.
    async fn complete(&self, project_id: DbId) -> Result<bool, PipelineError>;

    /// Transition to `failed` and retain the last error text.
    async fn record_failure(
        &self,
        project_id: DbId,
        step: PipelineStep,
        error: &str,
    ) -> Result<(), PipelineError>;
}

/// Deletion-only access to stage-owned artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Delete every artifact of `kind` for the project; returns rows removed.
    async fn delete(&self, project_id: DbId, kind: ArtifactKind) -> Result<u64, PipelineError>;

    /// Delete one shot's artifacts of `kind`; returns rows removed. Only
    /// meaningful for shot-scoped kinds.
    async fn delete_for_shot(
        &self,
        shot_id: DbId,
        kind: ArtifactKind,
    ) -> Result<u64, PipelineError>;
}

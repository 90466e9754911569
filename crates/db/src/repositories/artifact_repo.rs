//! Deletion-only repository for stage-owned artifacts.
//!
//! The engine never creates artifact rows — generation services do — but it
//! must delete them before a stage (re)executes so redelivery starts from a
//! clean slate. Which tables a stage owns, and their referential deletion
//! order, comes from `PipelineStep::owned_artifacts`; this repo only maps
//! each [`ArtifactKind`] to its table.

use async_trait::async_trait;
use sqlx::PgPool;

use fabula_core::step::{ArtifactKind, ArtifactScope};
use fabula_core::types::DbId;
use fabula_core::{ArtifactStore, PipelineError};

/// Deletes artifact rows by kind.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Table holding rows of the given kind. Exhaustive on purpose: adding a
    /// kind will not compile until it is mapped here.
    fn table(kind: ArtifactKind) -> &'static str {
        match kind {
            ArtifactKind::CharacterImage => "character_images",
            ArtifactKind::Character => "characters",
            ArtifactKind::Episode => "episodes",
            ArtifactKind::Shot => "shots",
            ArtifactKind::ShotImage => "shot_images",
            ArtifactKind::ShotVideo => "shot_videos",
            ArtifactKind::FinalVideo => "final_videos",
        }
    }

    /// Delete every row of `kind` for the project. Returns rows removed.
    pub async fn delete_for_project(
        pool: &PgPool,
        project_id: DbId,
        kind: ArtifactKind,
    ) -> Result<u64, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE project_id = $1", Self::table(kind));
        let result = sqlx::query(&query).bind(project_id).execute(pool).await?;
        let removed = result.rows_affected();
        if removed > 0 {
            tracing::debug!(project_id, kind = ?kind, removed, "Cleared stage artifacts");
        }
        Ok(removed)
    }

    /// Delete one shot's rows of `kind`. Returns rows removed.
    pub async fn delete_for_shot(
        pool: &PgPool,
        shot_id: DbId,
        kind: ArtifactKind,
    ) -> Result<u64, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE shot_id = $1", Self::table(kind));
        let result = sqlx::query(&query).bind(shot_id).execute(pool).await?;
        Ok(result.rows_affected())
    }
}

/// [`ArtifactStore`] backed by [`ArtifactRepo`].
pub struct PgArtifactStore {
    pool: PgPool,
}

impl PgArtifactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn delete(&self, project_id: DbId, kind: ArtifactKind) -> Result<u64, PipelineError> {
        ArtifactRepo::delete_for_project(&self.pool, project_id, kind)
            .await
            .map_err(PipelineError::storage)
    }

    async fn delete_for_shot(
        &self,
        shot_id: DbId,
        kind: ArtifactKind,
    ) -> Result<u64, PipelineError> {
        if kind.scope() != ArtifactScope::Shot {
            return Err(PipelineError::Validation(format!(
                "artifact kind {kind:?} is not shot-scoped"
            )));
        }
        ArtifactRepo::delete_for_shot(&self.pool, shot_id, kind)
            .await
            .map_err(PipelineError::storage)
    }
}

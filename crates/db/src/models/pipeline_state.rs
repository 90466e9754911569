//! Row model for the `pipeline_state` table.

use sqlx::FromRow;

use fabula_core::status::{PipelineStatus, ProjectPipelineState};
use fabula_core::step::PipelineStep;
use fabula_core::types::{DbId, Timestamp};
use fabula_core::PipelineError;

/// A row from `pipeline_state`, with status and step still in their raw
/// text encodings.
#[derive(Debug, Clone, FromRow)]
pub struct PipelineStateRow {
    pub project_id: DbId,
    pub current_step: Option<String>,
    pub status: String,
    pub last_error: Option<String>,
    pub updated_at: Timestamp,
}

impl PipelineStateRow {
    /// Decode the raw row into the domain state.
    ///
    /// Fails with `Storage` if the row carries an encoding this build does
    /// not know, which indicates a schema/app version mismatch.
    pub fn decode(self) -> Result<ProjectPipelineState, PipelineError> {
        let status = PipelineStatus::parse(&self.status).ok_or_else(|| {
            PipelineError::Storage(format!(
                "unknown status '{}' for project {}",
                self.status, self.project_id
            ))
        })?;
        let current_step = match self.current_step {
            Some(raw) => Some(PipelineStep::parse(&raw).ok_or_else(|| {
                PipelineError::Storage(format!(
                    "unknown step '{raw}' for project {}",
                    self.project_id
                ))
            })?),
            None => None,
        };
        Ok(ProjectPipelineState {
            project_id: self.project_id,
            current_step,
            status,
            last_error: self.last_error,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_maps_raw_encodings() {
        let row = PipelineStateRow {
            project_id: 4,
            current_step: Some("storyboard".into()),
            status: "storyboard_review".into(),
            last_error: None,
            updated_at: chrono::Utc::now(),
        };
        let state = row.decode().unwrap();
        assert_eq!(state.current_step, Some(PipelineStep::Storyboarding));
        assert_eq!(
            state.status,
            PipelineStatus::Review(PipelineStep::Storyboarding)
        );
    }

    #[test]
    fn decode_rejects_unknown_status() {
        let row = PipelineStateRow {
            project_id: 4,
            current_step: None,
            status: "paused".into(),
            last_error: None,
            updated_at: chrono::Utc::now(),
        };
        assert!(row.decode().is_err());
    }
}
